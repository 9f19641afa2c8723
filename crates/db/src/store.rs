use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, InterruptHandle};

use crate::error::StoreError;

/// Connection pool over SQLite connections.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

/// Name of the Unicode-aware lower-casing SQL function every connection gets.
pub const CASEFOLD_FUNCTION: &str = "casefold";

/// Parameters for opening a file-backed [`Store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub pool_size: u32,
    /// Upper bound for a single operation, including connection checkout.
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/bookshelf.sqlite"),
            pool_size: 8,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Owned handle to the relational store.
///
/// Cloning is cheap and shares the pool. Every operation checks out one
/// connection for its own duration and returns it on drop, whatever the
/// outcome.
#[derive(Clone)]
pub struct Store {
    pool: ConnectionPool,
    timeout: Duration,
}

impl Store {
    /// Open (or create) the SQLite file described by `config`.
    pub fn open(config: &StoreConfig) -> anyhow::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create data directory {}", parent.display())
                })?;
            }
        }

        let manager = SqliteConnectionManager::file(&config.path).with_init(configure_connection);
        tracing::info!(
            target: "bookshelf-db",
            path = %config.path.display(),
            pool_size = config.pool_size,
            "opening SQLite store"
        );
        Self::from_manager(manager, config.pool_size, config.timeout)
    }

    /// Private in-memory database. The pool holds a single connection so that
    /// every operation sees the same data.
    pub fn in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(configure_connection);
        Self::from_manager(manager, 1, DEFAULT_TIMEOUT)
    }

    fn from_manager(
        manager: SqliteConnectionManager,
        pool_size: u32,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(timeout)
            .build(manager)
            .context("failed to build SQLite connection pool")?;

        Ok(Self { pool, timeout })
    }

    /// Default per-operation timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `f` against a pooled connection, bounded by the default timeout.
    pub async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        self.run_with_timeout(operation, self.timeout, f).await
    }

    /// Run `f` against a pooled connection, bounded by `timeout`.
    ///
    /// The bound covers the wait for a pooled connection as well as the work.
    /// On expiry the statement in flight is interrupted and work that has not
    /// started yet is skipped. Interruption is best effort: once the last
    /// statement has finished, a pending commit can still land after the
    /// caller got `Timeout`.
    pub async fn run_with_timeout<T, F>(
        &self,
        operation: &'static str,
        timeout: Duration,
        f: F,
    ) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let guard = Arc::new(InterruptGuard::default());

        let task = {
            let pool = self.pool.clone();
            let guard = Arc::clone(&guard);
            tokio::task::spawn_blocking(move || {
                let mut conn = checkout(&pool, operation, timeout)?;
                if !guard.arm(conn.get_interrupt_handle()) {
                    return Err(StoreError::Aborted(format!(
                        "{operation} abandoned before it started"
                    )));
                }
                let result = f(&mut conn);
                guard.disarm();
                result
            })
        };

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(StoreError::Aborted(join_error.to_string())),
            Err(_) => {
                guard.abandon();
                tracing::warn!(
                    target: "bookshelf-db",
                    operation,
                    timeout_ms = timeout.as_millis() as u64,
                    "store operation timed out"
                );
                Err(StoreError::Timeout {
                    operation,
                    after: timeout,
                })
            }
        }
    }

    /// Execute idempotent DDL statements in one transaction.
    pub async fn apply_schema(&self, statements: Vec<&'static str>) -> Result<(), StoreError> {
        let count = statements.len();
        self.run("apply_schema", move |conn| {
            let tx = conn.transaction()?;
            for statement in statements {
                tx.execute_batch(statement)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?;

        tracing::info!(target: "bookshelf-db", statements = count, "schema applied");
        Ok(())
    }

    /// Round-trip a trivial query to prove the store is reachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.run("ping", |conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.pool.state();
        f.debug_struct("Store")
            .field("connections", &state.connections)
            .field("idle_connections", &state.idle_connections)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Hand-off between a blocking store task and the caller awaiting it.
#[derive(Default)]
struct InterruptGuard {
    abandoned: AtomicBool,
    handle: Mutex<Option<InterruptHandle>>,
}

impl InterruptGuard {
    /// Register the connection's interrupt handle. Returns `false` when the
    /// caller already gave up.
    fn arm(&self, handle: InterruptHandle) -> bool {
        let mut slot = match self.handle.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.abandoned.load(Ordering::SeqCst) {
            return false;
        }
        *slot = Some(handle);
        true
    }

    fn disarm(&self) {
        let mut slot = match self.handle.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.take();
    }

    fn abandon(&self) {
        let slot = match self.handle.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.abandoned.store(true, Ordering::SeqCst);
        if let Some(handle) = slot.as_ref() {
            handle.interrupt();
        }
    }
}

/// Check a connection out of the pool within `timeout`.
///
/// r2d2 reports every failed checkout the same way. A pool that is at its
/// size limit was only ever waiting on busy connections, which is a timeout;
/// anything else means connections could not be opened.
fn checkout(
    pool: &ConnectionPool,
    operation: &'static str,
    timeout: Duration,
) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
    pool.get_timeout(timeout).map_err(|err| {
        if pool.state().connections >= pool.max_size() {
            StoreError::Timeout {
                operation,
                after: timeout,
            }
        } else {
            StoreError::Unavailable(err)
        }
    })
}

fn configure_connection(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    // SQLite's own LIKE and lower() only fold ASCII.
    conn.create_scalar_function(
        CASEFOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text = ctx.get::<Option<String>>(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreErrorKind;

    #[tokio::test]
    async fn in_memory_store_answers_ping() {
        let store = Store::in_memory().unwrap();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn schema_is_visible_to_later_operations() {
        let store = Store::in_memory().unwrap();
        store
            .apply_schema(vec![
                "CREATE TABLE IF NOT EXISTS shelf (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            ])
            .await
            .unwrap();
        // Applying twice is harmless.
        store
            .apply_schema(vec![
                "CREATE TABLE IF NOT EXISTS shelf (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            ])
            .await
            .unwrap();

        let count = store
            .run("count", |conn| {
                conn.execute("INSERT INTO shelf (name) VALUES ('north')", [])?;
                Ok(conn.query_row("SELECT COUNT(*) FROM shelf", [], |row| {
                    row.get::<_, i64>(0)
                })?)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn slow_operation_times_out() {
        let store = Store::in_memory().unwrap();
        let err = store
            .run_with_timeout("slow", Duration::from_millis(20), |_conn| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), StoreErrorKind::Timeout);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn waiting_on_a_busy_pool_is_a_timeout() {
        let store = Store::in_memory().unwrap();
        let holder = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .run_with_timeout("hold", Duration::from_secs(2), |_conn| {
                        std::thread::sleep(Duration::from_millis(300));
                        Ok(())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = store
            .run_with_timeout("ping", Duration::from_millis(50), |_conn| Ok(()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Timeout);

        holder.await.unwrap().unwrap();
    }

    #[test]
    fn checkout_from_an_exhausted_pool_is_a_timeout() {
        let store = Store::in_memory().unwrap();
        let _held = store.pool.get().unwrap();

        let err = checkout(&store.pool, "list_books", Duration::from_millis(20))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            StoreError::Timeout {
                operation: "list_books",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn casefold_lowercases_beyond_ascii() {
        let store = Store::in_memory().unwrap();
        let folded = store
            .run("casefold", |conn| {
                Ok(conn.query_row("SELECT casefold('ÉMILE Über'), casefold(NULL)", [], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
                })?)
            })
            .await
            .unwrap();

        assert_eq!(folded, ("émile über".to_string(), None));
    }

    #[tokio::test]
    async fn connection_is_released_after_a_failed_operation() {
        let store = Store::in_memory().unwrap();
        let err = store
            .run("broken", |conn| {
                conn.execute("INSERT INTO missing_table VALUES (1)", [])?;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Query);

        // The single pooled connection must be available again.
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn open_creates_parent_directory() {
        let dir = std::env::temp_dir().join(format!("bookshelf-db-{}", std::process::id()));
        let config = StoreConfig {
            path: dir.join("nested").join("catalog.sqlite"),
            pool_size: 2,
            timeout: Duration::from_secs(1),
        };

        let store = Store::open(&config).unwrap();
        store.ping().await.unwrap();
        assert!(config.path.exists());

        drop(store);
        let _ = fs::remove_dir_all(dir);
    }
}
