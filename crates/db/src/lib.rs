//! SQLite store for bookshelf.
//!
//! The [`Store`] is handed to repositories at construction time. It owns an
//! `r2d2` pool; each operation runs on the blocking thread pool with its own
//! connection and a timeout, and failures surface as [`StoreError`].

pub mod error;
pub mod store;

pub use error::{StoreError, StoreErrorKind};
pub use store::{ConnectionPool, Store, StoreConfig, CASEFOLD_FUNCTION};
