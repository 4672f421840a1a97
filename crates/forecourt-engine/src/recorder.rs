//! # Transaction Recorder
//!
//! Fire-and-forget persistence of completed fueling transactions.
//!
//! ## Decoupling Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Transaction Recorder                                │
//! │                                                                         │
//! │  Engine ──try_send──► bounded channel ──► Recorder ──► TransactionStore│
//! │                                           (own task)    (trait object)  │
//! │                                                                         │
//! │  • The engine NEVER waits on a write: try_send on completion, the      │
//! │    recorder awaits the store on its own task                           │
//! │  • Store failures are logged and swallowed; the engine's state and     │
//! │    the completion event are unaffected either way                      │
//! │  • Records are inserted unsynced; a later reconciliation pass flips    │
//! │    the flag (mark_synced), not this component                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The store itself lives behind [`TransactionStore`] so this crate carries
//! no database dependency; forecourt-store provides the SQLite-backed
//! implementation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use forecourt_core::FuelingTransaction;

use crate::error::PersistenceError;

// =============================================================================
// Store Trait
// =============================================================================

/// Durable storage for completed fueling transactions.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Inserts a completed transaction record.
    async fn insert(&self, record: &FuelingTransaction) -> Result<(), PersistenceError>;

    /// Marks a previously stored record as synced with the remote side.
    async fn mark_synced(&self, id: Uuid) -> Result<(), PersistenceError>;

    /// Returns all records not yet synced, oldest first.
    async fn unsynced(&self) -> Result<Vec<FuelingTransaction>, PersistenceError>;
}

// =============================================================================
// Recorder
// =============================================================================

/// Handle for stopping a running recorder task.
#[derive(Clone)]
pub struct RecorderHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl RecorderHandle {
    /// Stops the recorder task. Records already handed off but not yet
    /// written are drained before the task exits.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Consumes completed transactions from the engine and writes them to the
/// store, one task removed from the simulation clock.
pub struct TransactionRecorder {
    store: Arc<dyn TransactionStore>,
}

impl TransactionRecorder {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        TransactionRecorder { store }
    }

    /// Spawns the recorder task. Returns the sender the engine hands
    /// completed transactions to, plus a shutdown handle.
    pub fn spawn(
        store: Arc<dyn TransactionStore>,
        capacity: usize,
    ) -> (mpsc::Sender<FuelingTransaction>, RecorderHandle) {
        let (record_tx, record_rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let recorder = TransactionRecorder::new(store);
        tokio::spawn(recorder.run(record_rx, shutdown_rx));

        (record_tx, RecorderHandle { shutdown_tx })
    }

    /// Recorder loop: write each record as it arrives, log failures, keep
    /// going. On shutdown the channel is drained first.
    async fn run(
        self,
        mut record_rx: mpsc::Receiver<FuelingTransaction>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        info!("Transaction recorder starting");

        loop {
            tokio::select! {
                Some(record) = record_rx.recv() => {
                    self.write(record).await;
                }

                _ = shutdown_rx.recv() => {
                    // Drain what the engine already handed off.
                    record_rx.close();
                    while let Some(record) = record_rx.recv().await {
                        self.write(record).await;
                    }
                    info!("Transaction recorder shutting down");
                    break;
                }
            }
        }
    }

    async fn write(&self, record: FuelingTransaction) {
        if let Err(err) = self.store.insert(&record).await {
            // Fire-and-forget: the transaction stays valid in the live
            // model and its completion event was already published. An
            // operator-level reconciliation pass finds the gap later.
            error!(
                pump = record.pump,
                transaction_id = record.transaction_id,
                error = %err,
                "Failed to record transaction"
            );
            return;
        }

        // Persistence succeeded: the record is now synced.
        if let Err(err) = self.store.mark_synced(record.id).await {
            error!(id = %record.id, error = %err, "Failed to mark record synced");
            return;
        }

        debug!(
            pump = record.pump,
            transaction_id = record.transaction_id,
            amount = record.display_amount(),
            "Transaction recorded"
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use forecourt_core::{Pump, PumpState};
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    /// In-memory store; `failing` makes every insert error.
    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<Vec<FuelingTransaction>>,
        failing: bool,
    }

    #[async_trait]
    impl TransactionStore for MemoryStore {
        async fn insert(&self, record: &FuelingTransaction) -> Result<(), PersistenceError> {
            if self.failing {
                return Err(PersistenceError("store unavailable".into()));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn mark_synced(&self, id: Uuid) -> Result<(), PersistenceError> {
            let mut records = self.records.lock().unwrap();
            for record in records.iter_mut() {
                if record.id == id {
                    record.synced = true;
                }
            }
            Ok(())
        }

        async fn unsynced(&self) -> Result<Vec<FuelingTransaction>, PersistenceError> {
            let records = self.records.lock().unwrap();
            Ok(records.iter().filter(|r| !r.synced).cloned().collect())
        }
    }

    fn sample_record(transaction_id: i64) -> FuelingTransaction {
        let mut pump = Pump::new(1);
        pump.status = PumpState::EndOfTransaction;
        pump.nozzle = 1;
        pump.price = 1.65;
        pump.volume = 30.0;
        pump.amount = 30.0 * 1.65;
        pump.transaction_id = transaction_id;
        FuelingTransaction::from_pump(&pump, Utc::now())
    }

    #[tokio::test]
    async fn test_records_written_then_marked_synced() {
        let store = Arc::new(MemoryStore::default());
        let (tx, handle) = TransactionRecorder::spawn(store.clone(), 8);

        let record = sample_record(1);
        assert!(!record.synced); // false at hand-off time
        tx.send(record).await.unwrap();
        tx.send(sample_record(2)).await.unwrap();
        sleep(Duration::from_millis(50)).await;

        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.synced));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_store_failure_does_not_kill_recorder() {
        let store = Arc::new(MemoryStore {
            failing: true,
            ..MemoryStore::default()
        });
        let (tx, handle) = TransactionRecorder::spawn(store.clone(), 8);

        tx.send(sample_record(1)).await.unwrap();
        sleep(Duration::from_millis(50)).await;

        // The loop survived the failed insert and still accepts records.
        assert!(tx.send(sample_record(2)).await.is_ok());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_pending_records() {
        let store = Arc::new(MemoryStore::default());
        let (tx, handle) = TransactionRecorder::spawn(store.clone(), 8);

        for id in 1..=5 {
            tx.send(sample_record(id)).await.unwrap();
        }
        handle.shutdown().await;
        sleep(Duration::from_millis(50)).await;

        assert_eq!(store.records.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_mark_synced_flips_flag() {
        let store = MemoryStore::default();
        let record = sample_record(7);
        let id = record.id;
        store.insert(&record).await.unwrap();

        store.mark_synced(id).await.unwrap();
        assert!(store.unsynced().await.unwrap().is_empty());
    }
}
