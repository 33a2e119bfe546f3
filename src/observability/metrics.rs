//! Metrics collection.
//!
//! # Metrics
//! - `tinker_exchanges_total` (counter): response-phase outcomes by `outcome`
//! - `tinker_registrations_total` (counter): registration attempts by `result`
//! - `tinker_routes` (gauge): registered routes
//! - `tinker_pending_requests` (gauge): requests awaiting their response
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; with no recorder installed the
//!   calls are no-ops
//! - No exporter is started here; an embedding host may install one

pub fn record_exchange(outcome: &'static str) {
    metrics::counter!("tinker_exchanges_total", "outcome" => outcome).increment(1);
}

pub fn record_registration(result: &'static str) {
    metrics::counter!("tinker_registrations_total", "result" => result).increment(1);
}

pub fn record_route_count(count: usize) {
    metrics::gauge!("tinker_routes").set(count as f64);
}

pub fn record_pending_count(count: usize) {
    metrics::gauge!("tinker_pending_requests").set(count as f64);
}
