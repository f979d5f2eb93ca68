//! Background task that periodically moves expired reservations to the
//! closed set, so read paths rarely see stale records even when nobody is
//! calling the engine.

use std::sync::Arc;

use chrono::Local;
use tracing::{debug, error};

use crate::store::Store;

pub async fn run(store: Arc<Store>) {
    let interval = store.config().sweep_interval;
    let mut ticker = tokio::time::interval(interval);
    // The immediate first tick would race store startup; skip it.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let now = Local::now().naive_local();
        match store.close_expired(now).await {
            Ok(0) => {}
            Ok(swept) => debug!(swept, "sweeper closed expired reservations"),
            Err(err) => error!(error = %err, "sweeper pass failed"),
        }
    }
}
