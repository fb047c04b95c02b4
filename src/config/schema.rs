//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the responder.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResponderConfig {
    /// Validation listener settings.
    pub listener: ListenerConfig,

    /// Startup, teardown and per-connection timeouts.
    pub timeouts: TimeoutConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Validation listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// IPv4 address to bind (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Port the CA connects to for validation.
    pub port: u16,

    /// listen(2) backlog.
    pub backlog: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 443,
            backlog: 1,
        }
    }
}

impl ListenerConfig {
    /// Socket address for `port` on the configured bind address.
    ///
    /// Falls back to 0.0.0.0 if the address does not parse; validation
    /// rejects such configs before they get here.
    pub fn socket_addr(&self, port: u16) -> SocketAddr {
        let ip = self
            .bind_address
            .parse::<Ipv4Addr>()
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        SocketAddr::V4(SocketAddrV4::new(ip, port))
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long `perform` waits for the listener to report in, in seconds.
    pub startup_secs: u64,

    /// Grace period after requesting teardown, in seconds.
    pub teardown_grace_secs: u64,

    /// Per-connection limit for receiving a ClientHello, in seconds.
    pub handshake_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            startup_secs: 5,
            teardown_grace_secs: 1,
            handshake_secs: 10,
        }
    }
}

impl TimeoutConfig {
    pub fn startup(&self) -> Duration {
        Duration::from_secs(self.startup_secs)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_secs(self.teardown_grace_secs)
    }

    pub fn handshake(&self) -> Duration {
        Duration::from_secs(self.handshake_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default tracing filter when RUST_LOG is unset.
    pub log_filter: String,

    /// Record handshake and startup counters through the `metrics` facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "sni_responder=info".to_string(),
            metrics_enabled: true,
        }
    }
}
