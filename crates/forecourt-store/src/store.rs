//! # Transaction Store
//!
//! Connection pool management and the SQLite-backed implementation of the
//! engine's [`TransactionStore`] trait.
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled: readers don't block
//! the recorder's writes, and the snapshot queries the reconciler runs
//! never stall a transaction insert.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use forecourt_core::FuelingTransaction;
use forecourt_engine::{PersistenceError, TransactionStore};

use crate::error::{StoreError, StoreResult};

/// Schema, applied idempotently at startup. One table: the durable record
/// of completed fuelings, keyed by the record uuid (the station-scoped
/// counter in `transaction_id` is NOT unique across restarts).
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS fueling_transactions (
    id              TEXT PRIMARY KEY,
    transaction_id  INTEGER NOT NULL,
    pump            INTEGER NOT NULL,
    nozzle          INTEGER NOT NULL,
    volume          REAL NOT NULL,
    amount          REAL NOT NULL,
    price           REAL NOT NULL,
    completed_at    TEXT NOT NULL,
    synced          INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_fueling_transactions_synced
    ON fueling_transactions (synced, completed_at);
"#;

// =============================================================================
// Configuration
// =============================================================================

/// Store configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = StoreConfig::new("/var/lib/forecourt/forecourt.db")
///     .max_connections(5);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    pub min_connections: u32,

    /// Connection timeout duration.
    pub connect_timeout: Duration,
}

impl StoreConfig {
    /// Creates a configuration for the given path. The file is created on
    /// first connect if it does not exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// In-memory database configuration (for testing).
    pub fn in_memory() -> Self {
        StoreConfig {
            database_path: PathBuf::from(":memory:"),
            // In-memory requires a single connection, a second one would
            // see an unrelated empty database.
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// SQLite Store
// =============================================================================

/// SQLite-backed transaction store.
#[derive(Debug, Clone)]
pub struct SqliteTransactionStore {
    pool: SqlitePool,
}

impl SqliteTransactionStore {
    /// Opens (or creates) the database and applies the schema.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening transaction store"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let store = SqliteTransactionStore { pool };
        store.init_schema().await?;

        info!(
            max_connections = config.max_connections,
            "Transaction store ready"
        );
        Ok(store)
    }

    /// Applies the schema. Idempotent, safe to run at every startup.
    async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Returns a reference to the connection pool, for queries the store
    /// methods don't cover.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the connection pool. Called on application shutdown.
    pub async fn close(&self) {
        info!("Closing transaction store");
        self.pool.close().await;
    }

    /// Checks that the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Inserts a completed transaction record.
    pub async fn insert_record(&self, record: &FuelingTransaction) -> StoreResult<()> {
        debug!(
            pump = record.pump,
            transaction_id = record.transaction_id,
            "Inserting transaction record"
        );

        sqlx::query(
            r#"
            INSERT INTO fueling_transactions (
                id, transaction_id, pump, nozzle,
                volume, amount, price, completed_at, synced
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.transaction_id)
        .bind(record.pump as i64)
        .bind(record.nozzle as i64)
        .bind(record.volume)
        .bind(record.amount)
        .bind(record.price)
        .bind(record.completed_at.to_rfc3339())
        .bind(record.synced)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Marks a record as synced with the remote side.
    pub async fn mark_record_synced(&self, id: Uuid) -> StoreResult<()> {
        debug!(id = %id, "Marking record synced");

        sqlx::query("UPDATE fueling_transactions SET synced = 1 WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Returns all unsynced records, oldest completion first.
    pub async fn unsynced_records(&self) -> StoreResult<Vec<FuelingTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, transaction_id, pump, nozzle,
                   volume, amount, price, completed_at, synced
            FROM fueling_transactions
            WHERE synced = 0
            ORDER BY completed_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_record).collect()
    }

    /// Returns the most recently completed records, newest first.
    pub async fn recent_records(&self, limit: u32) -> StoreResult<Vec<FuelingTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, transaction_id, pump, nozzle,
                   volume, amount, price, completed_at, synced
            FROM fueling_transactions
            ORDER BY completed_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_record).collect()
    }
}

/// Decodes one row into a domain record.
fn decode_record(row: &SqliteRow) -> StoreResult<FuelingTransaction> {
    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| StoreError::CorruptRecord(format!("bad record id '{id}': {e}")))?;

    let completed_at: String = row.try_get("completed_at")?;
    let completed_at = DateTime::parse_from_rfc3339(&completed_at)
        .map_err(|e| StoreError::CorruptRecord(format!("bad timestamp '{completed_at}': {e}")))?
        .with_timezone(&Utc);

    Ok(FuelingTransaction {
        id,
        transaction_id: row.try_get("transaction_id")?,
        pump: row.try_get::<i64, _>("pump")? as u32,
        nozzle: row.try_get::<i64, _>("nozzle")? as u32,
        volume: row.try_get("volume")?,
        amount: row.try_get("amount")?,
        price: row.try_get("price")?,
        completed_at,
        synced: row.try_get("synced")?,
    })
}

// =============================================================================
// TransactionStore Trait Implementation
// =============================================================================

#[async_trait]
impl TransactionStore for SqliteTransactionStore {
    async fn insert(&self, record: &FuelingTransaction) -> Result<(), PersistenceError> {
        self.insert_record(record).await.map_err(PersistenceError::from)
    }

    async fn mark_synced(&self, id: Uuid) -> Result<(), PersistenceError> {
        self.mark_record_synced(id).await.map_err(PersistenceError::from)
    }

    async fn unsynced(&self) -> Result<Vec<FuelingTransaction>, PersistenceError> {
        self.unsynced_records().await.map_err(PersistenceError::from)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use forecourt_core::{Pump, PumpState};

    async fn memory_store() -> SqliteTransactionStore {
        SqliteTransactionStore::open(StoreConfig::in_memory())
            .await
            .unwrap()
    }

    fn record(transaction_id: i64, completed_at: DateTime<Utc>) -> FuelingTransaction {
        let mut pump = Pump::new(1);
        pump.status = PumpState::EndOfTransaction;
        pump.nozzle = 1;
        pump.price = 1.65;
        pump.volume = 30.303030303030305;
        pump.amount = pump.volume * pump.price;
        pump.transaction_id = transaction_id;
        FuelingTransaction::from_pump(&pump, completed_at)
    }

    #[tokio::test]
    async fn test_open_in_memory_and_health_check() {
        let store = memory_store().await;
        assert!(store.health_check().await);
    }

    #[tokio::test]
    async fn test_insert_and_round_trip() {
        let store = memory_store().await;
        let original = record(1, Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap());
        store.insert_record(&original).await.unwrap();

        let loaded = store.unsynced_records().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], original);
        // Stored values are the unrounded ones.
        assert_eq!(loaded[0].amount, loaded[0].volume * loaded[0].price);
    }

    #[tokio::test]
    async fn test_mark_synced_removes_from_unsynced() {
        let store = memory_store().await;
        let rec = record(1, Utc::now());
        store.insert_record(&rec).await.unwrap();

        store.mark_record_synced(rec.id).await.unwrap();
        assert!(store.unsynced_records().await.unwrap().is_empty());

        let all = store.recent_records(10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].synced);
    }

    #[tokio::test]
    async fn test_unsynced_ordered_oldest_first() {
        let store = memory_store().await;
        let older = record(1, Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap());
        let newer = record(2, Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap());
        store.insert_record(&newer).await.unwrap();
        store.insert_record(&older).await.unwrap();

        let unsynced = store.unsynced_records().await.unwrap();
        assert_eq!(unsynced[0].transaction_id, 1);
        assert_eq!(unsynced[1].transaction_id, 2);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = memory_store().await;
        let rec = record(1, Utc::now());
        store.insert_record(&rec).await.unwrap();

        let err = store.insert_record(&rec).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateRecord(_)));
    }

    #[tokio::test]
    async fn test_trait_object_usable() {
        let store: std::sync::Arc<dyn TransactionStore> =
            std::sync::Arc::new(memory_store().await);
        let rec = record(1, Utc::now());

        store.insert(&rec).await.unwrap();
        store.mark_synced(rec.id).await.unwrap();
        assert!(store.unsynced().await.unwrap().is_empty());
    }
}
