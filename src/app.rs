//! Process bootstrap shared by the server binary and the CLI.

use anyhow::Context;
use bookshelf_db::Store;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules::{self, books::SqliteBookRepository};

/// Registry holding every module this application ships
pub fn build_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);
    registry
}

/// Open the configured store and make sure it answers
pub async fn open_store(settings: &Settings) -> anyhow::Result<Store> {
    let store = Store::open(&settings.database.store_config())
        .context("failed to open the book store")?;
    store.ping().await.context("book store is not reachable")?;
    Ok(store)
}

/// Repository over the configured store with the schema in place, for
/// one-shot commands that do not start the HTTP server.
pub async fn open_catalog(settings: &Settings) -> anyhow::Result<SqliteBookRepository> {
    let store = open_store(settings).await?;
    build_registry().apply_schema(&store).await?;
    Ok(SqliteBookRepository::new(store))
}

/// Run the full server lifecycle until a shutdown signal arrives
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.path.display(),
        "bookshelf bootstrap starting"
    );

    let store = open_store(settings).await?;
    let registry = build_registry();
    let ctx = InitCtx {
        settings,
        store: &store,
    };

    registry.init_modules(&ctx).await?;
    registry.apply_schema(&store).await?;
    registry.start_modules(&ctx).await?;

    tracing::info!("bookshelf bootstrap complete");

    let served = bookshelf_http::start_server(
        &registry,
        settings,
        &store,
        bookshelf_http::shutdown_signal(),
    )
    .await;

    registry.stop_modules().await?;
    served
}
