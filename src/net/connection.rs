//! Per-connection partial handshake.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Read the ClientHello and pick the context for its server name
//! - Write the certificate flight, or an alert for unknown names
//!
//! The exchange stops after ServerHelloDone; no keys are ever negotiated.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::net::sni::{HandshakeContext, SniResolver};
use crate::tls::{
    build_alert, build_certificate_message, build_server_hello, build_server_hello_done,
    parse_client_hello, read_record, AlertDescription, TlsError,
};

/// Relaxed ordering is enough: IDs only need to be unique.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// How a completed exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Certificate flight sent for a registered name.
    Delivered { hostname: String },
    /// Name not registered; an `unrecognized_name` alert was sent.
    Unmatched { hostname: String },
}

impl HandshakeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeOutcome::Delivered { .. } => "matched",
            HandshakeOutcome::Unmatched { .. } => "unmatched",
        }
    }
}

/// Run the partial handshake on one connection.
pub async fn respond<S, R>(
    stream: &mut S,
    resolver: &SniResolver,
    rng: &mut R,
    id: ConnectionId,
) -> Result<HandshakeOutcome, TlsError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
    R: RngCore + ?Sized,
{
    let record = read_record(stream).await?;
    let hello = parse_client_hello(&record)?;

    tracing::debug!(
        connection_id = %id,
        server_name = %hello.server_name,
        "ClientHello received"
    );

    let outcome = match resolver.resolve(&hello.server_name) {
        HandshakeContext::Matched {
            hostname,
            certificate,
        } => {
            let mut flight = build_server_hello(rng, &hello.session_id)?;
            flight.extend_from_slice(&build_certificate_message(certificate.der())?);
            flight.extend_from_slice(&build_server_hello_done());
            stream.write_all(&flight).await?;

            HandshakeOutcome::Delivered {
                hostname: hostname.to_string(),
            }
        }
        HandshakeContext::Default => {
            stream
                .write_all(&build_alert(AlertDescription::UnrecognizedName))
                .await?;

            HandshakeOutcome::Unmatched {
                hostname: hello.server_name.clone(),
            }
        }
    };
    stream.flush().await?;

    tracing::info!(
        connection_id = %id,
        server_name = %hello.server_name,
        outcome = outcome.as_str(),
        "Validation handshake answered"
    );

    Ok(outcome)
}
