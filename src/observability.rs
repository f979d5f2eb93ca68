//! Metric names and the Prometheus exporter bootstrap.

use std::net::{Ipv4Addr, SocketAddr};

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

pub const COMMITS_TOTAL: &str = "slotd_commits_total";
pub const CONFLICTS_TOTAL: &str = "slotd_conflicts_total";
pub const WRITE_RETRIES_TOTAL: &str = "slotd_write_retries_total";
pub const RECOVERIES_TOTAL: &str = "slotd_recoveries_total";
pub const SWEPT_TOTAL: &str = "slotd_swept_reservations_total";
pub const ACTIVE_RESERVATIONS: &str = "slotd_active_reservations";

/// Install the Prometheus scrape endpoint when a port is configured.
/// Metrics macros elsewhere degrade to no-ops when no recorder is installed,
/// so a missing port only disables the endpoint, never the call sites.
pub fn init(port: Option<u16>) {
    let Some(port) = port else {
        info!("metrics exporter disabled (no port configured)");
        return;
    };
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => info!(%addr, "prometheus exporter listening"),
        Err(err) => warn!(%addr, error = %err, "failed to install prometheus exporter"),
    }
}
