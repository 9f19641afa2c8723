//! Case-insensitive substring search over title, author and genre.
//!
//! The query is matched literally: `%`, `_` and the escape character itself
//! are escaped before the text reaches `LIKE`. Both sides go through the
//! store's Unicode `casefold` function, so "émile" finds "Émile". An empty
//! query matches every book. Results come back in id order, like the full
//! listing.

use bookshelf_db::CASEFOLD_FUNCTION;
use rusqlite::{params, Connection};

use super::models::Book;
use super::repository::{book_from_row, BOOK_COLUMNS};

const LIKE_ESCAPE: char = '\\';

/// Free-text catalog query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Matched as-is: not trimmed, not tokenized.
    pub text: String,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// `LIKE` pattern matching the text anywhere in a column.
    pub fn like_pattern(&self) -> String {
        format!("%{}%", escape_like(&self.text))
    }
}

/// Escape `LIKE` metacharacters so `text` only ever matches itself.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

pub(crate) fn search_books(
    conn: &Connection,
    query: &SearchQuery,
) -> Result<Vec<Book>, rusqlite::Error> {
    let fold = CASEFOLD_FUNCTION;
    let sql = format!(
        r"SELECT {BOOK_COLUMNS}
          FROM books
          WHERE {fold}(title) LIKE {fold}(?1) ESCAPE '\'
             OR {fold}(author) LIKE {fold}(?1) ESCAPE '\'
             OR {fold}(genre) LIKE {fold}(?1) ESCAPE '\'
          ORDER BY id ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let books = stmt
        .query_map(params![query.like_pattern()], book_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(books)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_wrapped_in_wildcards() {
        assert_eq!(SearchQuery::new("moby").like_pattern(), "%moby%");
    }

    #[test]
    fn empty_query_matches_everything() {
        assert_eq!(SearchQuery::default().like_pattern(), "%%");
    }

    #[test]
    fn metacharacters_are_escaped() {
        assert_eq!(escape_like("100%"), r"100\%");
        assert_eq!(escape_like("snake_case"), r"snake\_case");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
    }

    #[test]
    fn whitespace_is_preserved() {
        assert_eq!(SearchQuery::new(" an ").like_pattern(), "% an %");
    }
}
