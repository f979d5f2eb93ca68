use std::sync::Arc;

use chrono::Local;
use tracing::{error, info, warn};

use slotd::config::Config;
use slotd::observability;
use slotd::store::Store;
use slotd::sweeper;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    observability::init(config.metrics_port);

    let store = match Store::open(config) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(error = %err, "failed to open reservation store");
            std::process::exit(1);
        }
    };

    if let Ok(mode) = std::env::var("SLOTD_SEED") {
        seed(&store, &mode).await;
    }

    let sweeper = tokio::spawn(sweeper::run(store.clone()));
    info!("slotd running");

    shutdown_signal().await;
    info!("shutdown signal received");

    sweeper.abort();
    if let Err(err) = store.shutdown(Local::now().naive_local()).await {
        error!(error = %err, "final sweep failed");
    }
}

async fn seed(store: &Store, mode: &str) {
    let now = Local::now().naive_local();
    let result = match mode {
        "basic" => store.seed_test_data(now, true).await,
        "large" => store.seed_large_test_data(now, 30, 4, true).await,
        other => {
            warn!(mode = other, "unknown SLOTD_SEED mode, expected basic or large");
            return;
        }
    };
    match result {
        Ok(records) => info!(count = records.len(), mode, "test data seeded"),
        Err(err) => error!(error = %err, mode, "seeding failed"),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
