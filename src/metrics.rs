//! Metrics initialization for Prometheus exporter, and metric names.

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsSettings;
use crate::error::Result;

/// Candidate resolvers probed for EDNS client-subnet support.
pub const RESOLVERS_PROBED: &str = "harrier_resolvers_probed_total";

/// Resolvers admitted into the pool after probing.
pub const RESOLVERS_ADMITTED: &str = "harrier_resolvers_admitted_total";

/// ASN records loaded into the cache at startup.
pub const ASN_RECORDS_LOADED: &str = "harrier_asn_records_loaded_total";

/// Data sources registered with the registry actor.
pub const SOURCES_REGISTERED: &str = "harrier_sources_registered_total";

/// Feed fetches that fell back to the on-disk cache or failed outright.
pub const FEED_FETCH_FAILURES: &str = "harrier_feed_fetch_failures_total";

/// Initialize the metrics system based on configuration.
///
/// When metrics are enabled, this starts an HTTP server that exposes
/// a `/metrics` endpoint for Prometheus to scrape.
///
/// When metrics are disabled, this is a no-op. The `metrics` crate
/// handles unregistered metrics gracefully (they become no-ops).
pub fn init(settings: &MetricsSettings) -> Result<()> {
    if !settings.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(settings.listen)
        .install()?;

    Ok(())
}
