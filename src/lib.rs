//! Bookshelf application library
//!
//! Catalog modules, bootstrap helpers, and project utilities.

pub mod app;
pub mod modules;
pub mod utils;

/// Re-export commonly used types
pub use modules::*;
