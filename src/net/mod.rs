//! Network layer subsystem (listener process side).
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, backlog 1, accept)
//!     → connection.rs (read ClientHello, write reply flight)
//!     → sni.rs (server name → certificate or default context)
//!     → handler.rs (serve loop, teardown on control message)
//!
//! Connection States:
//!     Accepted → Answering → Closed
//! ```
//!
//! # Design Decisions
//! - One connection at a time; the CA connects sequentially
//! - A failed or stalled connection never stops the listener
//! - Teardown is driven by the control channel, not by signals

pub mod connection;
pub mod handler;
pub mod listener;
pub mod sni;

pub use handler::{run_child, serve, ServeExit};
pub use listener::{BindError, ValidationListener};
pub use sni::{HandshakeContext, SniResolver};
