//! Standalone TLS-SNI domain validation responder.
//!
//! Answers TLS-SNI challenges by running a short-lived listener on the
//! validation port. The listener reads the CA's ClientHello, looks up the
//! requested `<nonce>.acme.invalid` name and replies with just enough of a
//! TLS 1.2 handshake to hand over the matching self-signed certificate.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller
//!     │ perform / cleanup
//!     ▼
//! ┌──────────────────────┐   Ready / InUse / CannotBind   ┌────────────────────────┐
//! │ authenticator        │◀───────────────────────────────│ listener process       │
//! │  challenge::Registry │   Teardown ─────────────────▶  │  net::handler::serve   │
//! │  lifecycle::launcher │   TeardownComplete ◀────────── │  net::connection       │
//! └──────────┬───────────┘        (lifecycle::control)    │  tls codec             │
//!            │ fork (lifecycle::process)                   └───────────┬────────────┘
//!            └─────────────────────────────────────────────────────────┘
//!                                                         CA ──TCP──▶ validation port
//! ```

// Core
pub mod authenticator;
pub mod challenge;
pub mod tls;

// Listener process
pub mod lifecycle;
pub mod net;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod observability;

pub use authenticator::StandaloneAuthenticator;
pub use challenge::{Challenge, ChallengeOutcome, ChallengeResponse, SigningKey, TlsSniChallenge};
pub use config::ResponderConfig;
pub use error::{Error, Result};
