//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! authenticator, launcher, listener process:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (handshake and listener-start counters)
//! ```
//!
//! # Design Decisions
//! - Structured fields (port, child_pid, connection_id) on every event
//! - Metrics are cheap counters; exporters belong to the embedding binary

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
