//! Prometheus metrics collection for snatchd.
//!
//! Tracks announce throughput, pipeline outcomes, and IRC session health.
//! Served on the API router's `/metrics` endpoint.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Once;

lazy_static! {
    /// Global Prometheus registry for all metrics.
    pub static ref REGISTRY: Registry = Registry::new();

    // ========================================================================
    // Counters (monotonic increasing)
    // ========================================================================

    /// Announce lines successfully parsed into releases.
    pub static ref ANNOUNCES_PARSED: IntCounter = IntCounter::new(
        "snatchd_announces_parsed_total",
        "Announce lines parsed into releases"
    ).unwrap();

    /// Announce lines that matched a rule but produced an unusable release.
    pub static ref ANNOUNCES_INVALID: IntCounter = IntCounter::new(
        "snatchd_announces_invalid_total",
        "Announce lines dropped as invalid"
    ).unwrap();

    /// Releases pushed to a download client.
    pub static ref RELEASES_PUSH_APPROVED: IntCounter = IntCounter::new(
        "snatchd_releases_push_approved_total",
        "Releases pushed to a download client"
    ).unwrap();

    /// Releases rejected by every filter.
    pub static ref RELEASES_FILTER_REJECTED: IntCounter = IntCounter::new(
        "snatchd_releases_filter_rejected_total",
        "Releases rejected by filters"
    ).unwrap();

    /// Push attempts that ended in an error status.
    pub static ref RELEASES_PUSH_ERRORS: IntCounter = IntCounter::new(
        "snatchd_releases_push_errors_total",
        "Release pushes that failed"
    ).unwrap();

    /// IRC reconnect attempts across all handlers.
    pub static ref IRC_RECONNECTS: IntCounter = IntCounter::new(
        "snatchd_irc_reconnects_total",
        "IRC reconnect attempts"
    ).unwrap();

    // ========================================================================
    // Gauges (can increase/decrease)
    // ========================================================================

    /// Handlers currently connected and registered.
    pub static ref IRC_CONNECTED_HANDLERS: IntGauge = IntGauge::new(
        "snatchd_irc_connected_handlers",
        "Connected IRC handlers"
    ).unwrap();
}

static INIT: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Safe to call more than once; registration happens on the first call.
pub fn init() {
    INIT.call_once(|| {
        REGISTRY.register(Box::new(ANNOUNCES_PARSED.clone())).unwrap();
        REGISTRY.register(Box::new(ANNOUNCES_INVALID.clone())).unwrap();
        REGISTRY
            .register(Box::new(RELEASES_PUSH_APPROVED.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(RELEASES_FILTER_REJECTED.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(RELEASES_PUSH_ERRORS.clone()))
            .unwrap();
        REGISTRY.register(Box::new(IRC_RECONNECTS.clone())).unwrap();
        REGISTRY
            .register(Box::new(IRC_CONNECTED_HANDLERS.clone()))
            .unwrap();
    });
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
