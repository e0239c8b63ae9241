mod from_row;
pub mod queries;
mod schema;

pub use from_row::{FromRow, query_all, query_one};
pub use schema::{init_audit_db, init_db};

use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rand::Rng;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::config::{Config, Economy};
use crate::error::{AppError, Result};
use crate::redemption::RedemptionPolicy;

pub type DbPool = Pool<SqliteConnectionManager>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_TX_ATTEMPTS: u32 = 4;
const BACKOFF_BASE_MS: u64 = 20;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub audit: DbPool,
    pub base_url: String,
    pub audit_log_enabled: bool,
    pub economy: Economy,
    pub redemption_policy: RedemptionPolicy,
}

impl AppState {
    pub fn new(config: &Config, db: DbPool, audit: DbPool) -> Self {
        Self {
            db,
            audit,
            base_url: config.base_url.clone(),
            audit_log_enabled: config.audit_log_enabled,
            economy: config.economy,
            redemption_policy: config.redemption_policy(),
        }
    }

    /// Audit connection for writes that follow an already-committed change.
    /// Unavailability is logged instead of failing the request.
    pub fn audit_conn(&self) -> Option<PooledConnection<SqliteConnectionManager>> {
        self.audit
            .get()
            .inspect_err(|e| tracing::warn!("Audit database unavailable: {}", e))
            .ok()
    }
}

fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Create a pool over a file-backed SQLite database in WAL mode.
pub fn create_pool(path: &str, max_size: u32) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(configure_connection);
    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| AppError::Internal(format!("Failed to create pool for {}: {}", path, e)))
}

fn is_busy(err: &AppError) -> bool {
    matches!(err, AppError::Unavailable(_))
}

/// Jittered pause between attempts. On a multi-threaded tokio worker the
/// sleep goes through `block_in_place` so other tasks move to another worker;
/// a current-thread runtime cannot do that and simply sleeps.
fn backoff(attempt: u32) {
    let base = BACKOFF_BASE_MS << attempt.min(4);
    let jitter = rand::thread_rng().gen_range(0..=base);
    let pause = Duration::from_millis(base + jitter);

    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| std::thread::sleep(pause));
        }
        _ => std::thread::sleep(pause),
    }
}

/// Run `f` inside a `BEGIN IMMEDIATE` transaction and commit on success.
///
/// IMMEDIATE takes SQLite's write lock at transaction start, so every
/// read-check-write sequence inside `f` is serialized against all other
/// writers. If the lock cannot be obtained within the busy timeout the whole
/// transaction is retried with jittered backoff; after the last attempt the
/// caller gets `AppError::Unavailable`, which is always safe to retry.
///
/// Any error returned by `f` rolls the transaction back.
pub fn write_tx<T, F>(conn: &mut Connection, mut f: F) -> Result<T>
where
    F: FnMut(&Transaction<'_>) -> Result<T>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(AppError::from)
            .and_then(|tx| {
                let value = f(&tx)?;
                tx.commit()?;
                Ok(value)
            });

        match result {
            Err(err) if is_busy(&err) && attempt < MAX_TX_ATTEMPTS => {
                tracing::debug!("Write transaction busy (attempt {}), retrying", attempt);
                backoff(attempt);
            }
            Err(err) if is_busy(&err) => {
                tracing::warn!("Write transaction gave up after {} attempts", attempt);
                return Err(err);
            }
            other => return other,
        }
    }
}
