//! Book repository contract and its SQLite implementation.
//!
//! The repository is the only writer of the `books` table. It stores what it
//! is given; input validation belongs to the caller. Absence is reported as a
//! value (`None` / [`DeleteOutcome::NotFound`]), every store failure as a
//! [`StoreError`].

use std::time::Duration;

use async_trait::async_trait;
use bookshelf_db::{Store, StoreError};
use rusqlite::{params, Connection, Row};

use super::models::{Book, BookId, BookInput, DeleteOutcome};
use super::search::{search_books, SearchQuery};

/// Table definition the repository relies on.
pub const BOOKS_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS books (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    title     TEXT    NOT NULL DEFAULT '',
    author    TEXT    NOT NULL DEFAULT '',
    isbn      TEXT    NOT NULL DEFAULT '',
    genre     TEXT    NOT NULL DEFAULT '',
    available INTEGER NOT NULL DEFAULT 0 CHECK (available IN (0, 1))
)";

pub(crate) const BOOK_COLUMNS: &str = "id, title, author, isbn, genre, available";

/// Catalog operations.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Insert a book and return it with its assigned id.
    async fn create(&self, input: BookInput) -> Result<Book, StoreError>;

    /// Every book, ordered by id ascending.
    async fn list_all(&self) -> Result<Vec<Book>, StoreError>;

    async fn get_by_id(&self, id: BookId) -> Result<Option<Book>, StoreError>;

    /// Replace every mutable field of the book with `input`.
    async fn update(&self, id: BookId, input: BookInput) -> Result<Option<Book>, StoreError>;

    async fn delete_by_id(&self, id: BookId) -> Result<DeleteOutcome, StoreError>;

    /// Books whose title, author or genre contains the query, ignoring case.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Book>, StoreError>;
}

/// SQLite-backed book repository.
#[derive(Debug, Clone)]
pub struct SqliteBookRepository {
    store: Store,
    timeout: Option<Duration>,
}

impl SqliteBookRepository {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Bound every operation by `timeout` instead of the store default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let timeout = self.timeout.unwrap_or_else(|| self.store.timeout());
        let result = self.store.run_with_timeout(operation, timeout, f).await;

        if let Err(err) = &result {
            tracing::warn!(
                operation,
                error = %err,
                transient = err.is_transient(),
                "book store operation failed"
            );
        }
        result
    }
}

#[async_trait]
impl BookRepository for SqliteBookRepository {
    async fn create(&self, input: BookInput) -> Result<Book, StoreError> {
        let book = self
            .run("create_book", move |conn| {
                let sql = format!(
                    "INSERT INTO books (title, author, isbn, genre, available)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     RETURNING {BOOK_COLUMNS}"
                );
                let book = conn.query_row(
                    &sql,
                    params![
                        input.title,
                        input.author,
                        input.isbn,
                        input.genre,
                        input.available
                    ],
                    book_from_row,
                )?;
                Ok(book)
            })
            .await?;

        tracing::debug!(id = %book.id, "book created");
        Ok(book)
    }

    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        let books = self
            .run("list_books", |conn| {
                let sql = format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY id ASC");
                let mut stmt = conn.prepare(&sql)?;
                let books = stmt
                    .query_map([], book_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(books)
            })
            .await?;

        tracing::debug!(count = books.len(), "books listed");
        Ok(books)
    }

    async fn get_by_id(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        self.run("get_book", move |conn| {
            let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![id.get()], book_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            single_row(id, rows)
        })
        .await
    }

    async fn update(&self, id: BookId, input: BookInput) -> Result<Option<Book>, StoreError> {
        let updated = self
            .run("update_book", move |conn| {
                let tx = conn.transaction()?;
                let rows = {
                    let sql = format!(
                        "UPDATE books
                         SET title = ?1, author = ?2, isbn = ?3, genre = ?4, available = ?5
                         WHERE id = ?6
                         RETURNING {BOOK_COLUMNS}"
                    );
                    let mut stmt = tx.prepare(&sql)?;
                    let rows = stmt
                        .query_map(
                            params![
                                input.title,
                                input.author,
                                input.isbn,
                                input.genre,
                                input.available,
                                id.get()
                            ],
                            book_from_row,
                        )?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                };
                // An error here drops `tx`, rolling the update back.
                let book = single_row(id, rows)?;
                tx.commit()?;
                Ok(book)
            })
            .await?;

        tracing::debug!(%id, found = updated.is_some(), "book update finished");
        Ok(updated)
    }

    async fn delete_by_id(&self, id: BookId) -> Result<DeleteOutcome, StoreError> {
        let outcome = self
            .run("delete_book", move |conn| {
                let tx = conn.transaction()?;
                let deleted = tx.execute("DELETE FROM books WHERE id = ?1", params![id.get()])?;
                let outcome = match deleted {
                    0 => DeleteOutcome::NotFound,
                    1 => DeleteOutcome::Deleted,
                    n => {
                        return Err(StoreError::consistency(format!(
                            "delete of book {id} matched {n} rows"
                        )))
                    }
                };
                tx.commit()?;
                Ok(outcome)
            })
            .await?;

        tracing::debug!(%id, ?outcome, "book delete finished");
        Ok(outcome)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Book>, StoreError> {
        let owned = query.clone();
        let books = self
            .run("search_books", move |conn| Ok(search_books(conn, &owned)?))
            .await?;

        tracing::debug!(query = %query.text, count = books.len(), "books searched");
        Ok(books)
    }
}

pub(crate) fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: BookId::new(row.get(0)?),
        title: row.get(1)?,
        author: row.get(2)?,
        isbn: row.get(3)?,
        genre: row.get(4)?,
        available: row.get(5)?,
    })
}

/// Ids are unique; more than one row for an id means the table is corrupt.
fn single_row(id: BookId, mut rows: Vec<Book>) -> Result<Option<Book>, StoreError> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        n => Err(StoreError::consistency(format!(
            "expected at most one book with id {id}, found {n}"
        ))),
    }
}
