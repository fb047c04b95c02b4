//! Hand-built TLS 1.2 wire format subset.
//!
//! # Data Flow
//! ```text
//! Accepted TCP stream
//!     → record.rs (read exactly one record)
//!     → client_hello.rs (walk ClientHello, extract SNI host_name)
//!     → server.rs (ServerHello + Certificate + ServerHelloDone, or Alert)
//!     → written back to the peer in one flight
//! ```
//!
//! # Design Decisions
//! - Not a TLS stack: no key exchange, no Finished, no application data
//! - All length prefixes are computed from the encoded payload
//! - The responder always selects the same cipher suite

pub mod client_hello;
pub mod codec;
pub mod record;
pub mod server;

use thiserror::Error;

pub use client_hello::{parse_client_hello, ClientHello};
pub use codec::{pack2, pack3, unpack2, unpack3};
pub use record::read_record;
pub use server::{
    build_alert, build_certificate_message, build_server_hello, build_server_hello_done,
    AlertDescription, SELECTED_CIPHER_SUITE,
};

/// Record content type for handshake messages.
pub const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
/// Record content type for alerts.
pub const CONTENT_TYPE_ALERT: u8 = 0x15;

pub const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
pub const HANDSHAKE_SERVER_HELLO: u8 = 0x02;
pub const HANDSHAKE_CERTIFICATE: u8 = 0x0B;
pub const HANDSHAKE_SERVER_HELLO_DONE: u8 = 0x0E;

/// Protocol version written on every record the responder emits (TLS 1.2).
pub const TLS12: [u8; 2] = [0x03, 0x03];

/// server_name extension type (RFC 6066).
pub const EXT_SERVER_NAME: u16 = 0x0000;

/// Largest plaintext fragment carried by a single record.
pub const MAX_FRAGMENT_LEN: usize = 1 << 14;

/// Errors produced while reading or writing TLS messages.
#[derive(Debug, Error)]
pub enum TlsError {
    /// A length field points past the end of its enclosing structure.
    #[error("Truncated TLS message: {what}")]
    Truncated { what: &'static str },

    #[error("Unexpected TLS record type 0x{0:02x}")]
    UnexpectedRecordType(u8),

    #[error("Unsupported TLS record version 0x{0:04x}")]
    UnsupportedVersion(u16),

    #[error("Unexpected handshake message type 0x{0:02x}")]
    UnexpectedHandshakeType(u8),

    /// ClientHello carried no server_name extension or no host_name entry.
    #[error("ClientHello has no server_name extension")]
    MissingServerName,

    #[error("ClientHello server_name is not a valid ASCII hostname")]
    InvalidServerName,

    #[error("Value {value} does not fit in {width} bytes")]
    ValueOutOfRange { value: u64, width: usize },

    #[error("Session id of {0} bytes exceeds the 255 byte limit")]
    SessionIdTooLong(usize),

    #[error("TLS record of {0} bytes exceeds the protocol limit")]
    RecordTooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
