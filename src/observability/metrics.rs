//! Responder metrics.
//!
//! # Metrics
//! - `sni_responder_handshakes_total` (counter): answered connections by
//!   outcome (`matched`, `unmatched`, `failed`)
//! - `sni_responder_listener_starts_total` (counter): listener starts by
//!   outcome (`ready`, `in_use`, `cannot_bind`, `timeout`, `exited`)
//!
//! Recording goes through the `metrics` facade; installing an exporter is
//! up to the embedding application. Without one every call is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};

const HANDSHAKES_TOTAL: &str = "sni_responder_handshakes_total";
const LISTENER_STARTS_TOTAL: &str = "sni_responder_listener_starts_total";

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn recording on or off for this process.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn record_handshake(outcome: &'static str) {
    if is_enabled() {
        metrics::counter!(HANDSHAKES_TOTAL, "outcome" => outcome).increment(1);
    }
}

pub fn record_listener_start(outcome: &'static str) {
    if is_enabled() {
        metrics::counter!(LISTENER_STARTS_TOTAL, "outcome" => outcome).increment(1);
    }
}
