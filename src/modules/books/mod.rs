//! Book catalog: listing, editing and searching books.

pub mod form;
pub mod models;
pub mod repository;
pub mod routes;
pub mod search;
pub mod views;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::{InitCtx, Module};

pub use models::{Book, BookId, BookInput, DeleteOutcome};
pub use repository::{BookRepository, SqliteBookRepository, BOOKS_SCHEMA};
pub use search::SearchQuery;

/// Catalog module, mounted at the site root
pub struct BooksModule;

impl BooksModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    fn mount_path(&self) -> String {
        "/".to_string()
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        let repository = SqliteBookRepository::new(ctx.store.clone());
        routes::router(Arc::new(repository))
    }

    fn schema(&self) -> Vec<&'static str> {
        vec![BOOKS_SCHEMA]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(BooksModule::new())
}
