use std::fmt;
use std::str::FromStr;

use bookshelf_db::StoreError;
use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a book. Never reused, never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(i64);

impl BookId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Coerce the string form of an id (as it arrives in a URL path) to an
    /// integer id. Surrounding whitespace is tolerated; anything else that is
    /// not an integer is a store coercion error, not a missing book.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        raw.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| StoreError::coercion(raw))
    }
}

impl FromStr for BookId {
    type Err = StoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    /// Free text; uniqueness is not enforced.
    pub isbn: String,
    pub genre: String,
    pub available: bool,
}

/// Every mutable field of a book. Used for both create and full-replace update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInput {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub genre: String,
    pub available: bool,
}

impl BookInput {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            ..Self::default()
        }
    }

    pub fn isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = isbn.into();
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    pub fn available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }
}

/// Result of deleting by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}
