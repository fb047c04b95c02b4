//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResponderConfig (validated, immutable)
//!     → copied into the authenticator and, at fork, into the listener process
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no reload while a listener is running
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ListenerConfig, ObservabilityConfig, ResponderConfig, TimeoutConfig};
