//! # Forecourt Daemon
//!
//! Station-side daemon wiring the forecourt together: simulation engine,
//! transaction recorder over SQLite, and the feed hub serving the pull and
//! push edges.
//!
//! ## Invocation
//! ```text
//! forecourtd [config.toml] [database.db]
//! ```
//! Both arguments are optional; a missing config falls back to the default
//! two-pump station, and the database defaults to `./forecourt.db`.
//! Log filtering follows `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use forecourt_engine::{
    EventDistributor, ForecourtConfig, ForecourtEngine, TransactionRecorder,
};
use forecourt_feed::{FeedHub, HubConfig};
use forecourt_store::{SqliteTransactionStore, StoreConfig};

/// Completed transactions the recorder may have in flight at once.
const RECORDER_QUEUE_DEPTH: usize = 64;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting forecourt daemon");

    // Load station configuration
    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let db_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("forecourt.db"));

    let config = ForecourtConfig::load_or_default(config_path.as_deref())?;
    config.validate()?;
    info!(
        pumps = config.pumps.len(),
        tanks = config.tanks.len(),
        tick_ms = config.tick_interval_ms,
        "Station configuration ready"
    );

    // Transaction store and recorder
    let store = SqliteTransactionStore::open(StoreConfig::new(&db_path)).await?;
    let (record_tx, recorder) =
        TransactionRecorder::spawn(Arc::new(store.clone()), RECORDER_QUEUE_DEPTH);

    // Engine and event fan-out
    let distributor = EventDistributor::default();
    let engine = ForecourtEngine::spawn(config, distributor.clone(), Some(record_tx));

    // Feed hub (pull + push edges)
    let hub = FeedHub::new(HubConfig::default(), engine.clone(), distributor)
        .start()
        .await?;
    info!(addr = %hub.addr(), "Forecourt running");

    shutdown_signal().await;

    // Teardown: stop accepting clients, stop the clock, drain the
    // recorder, close the store.
    hub.shutdown().await?;
    engine.shutdown().await?;
    recorder.shutdown().await;
    store.close().await;

    info!("Forecourt daemon shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
