//! Crate-wide error type.

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::lifecycle::control::ControlError;
use crate::net::listener::BindError;
use crate::tls::TlsError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("Control channel error: {0}")]
    Control(#[from] ControlError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Certificate generation failed: {0}")]
    Certificate(#[from] rcgen::Error),

    #[error("Invalid signing key: {0}")]
    Key(String),

    /// `cleanup` was called for a challenge that `perform` never registered.
    #[error("No validation certificate registered for {hostname}; perform() was not called for this challenge")]
    Validation { hostname: String },
}

pub type Result<T> = std::result::Result<T, Error>;
