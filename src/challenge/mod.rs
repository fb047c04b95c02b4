//! Validation challenges and the certificates that answer them.
//!
//! # Responsibilities
//! - Model the challenge variants handed in by the ACME client
//! - Derive the `<nonce>.acme.invalid` hostname a CA will ask for via SNI
//! - Issue one self-signed certificate per challenge (`issuer.rs`)
//! - Hold issued certificates by hostname until the listener forks (`registry.rs`)
//!
//! # Design Decisions
//! - Only `Challenge::TlsSni` is handled; every other variant passes through
//! - The issuer is a trait so the proof-of-possession extension can be
//!   supplied by the surrounding client

pub mod issuer;
pub mod key;
pub mod registry;

use serde::Serialize;

pub use issuer::{CertificateIssuer, SelfSignedIssuer};
pub use key::SigningKey;
pub use registry::{CertificateRecord, Registry};

/// Challenge type name this responder advertises.
pub const CHALLENGE_TYPE: &str = "tls-sni";

/// Suffix appended to a challenge nonce to form the validation hostname.
pub const VALIDATION_DOMAIN_SUFFIX: &str = "acme.invalid";

/// A TLS-SNI challenge: prove control of `domain` by serving a certificate
/// for `<nonce>.acme.invalid` on the validation port.
#[derive(Debug, Clone, PartialEq)]
pub struct TlsSniChallenge {
    /// Domain being validated.
    pub domain: String,
    /// Shared secret from the CA, echoed back in the response.
    pub secret: String,
    /// Per-challenge nonce the validation hostname is derived from.
    pub nonce: String,
    /// Key the validation certificate is signed with.
    pub key: SigningKey,
}

impl TlsSniChallenge {
    pub fn new(
        domain: impl Into<String>,
        secret: impl Into<String>,
        nonce: impl Into<String>,
        key: SigningKey,
    ) -> Self {
        Self {
            domain: domain.into(),
            secret: secret.into(),
            nonce: nonce.into(),
            key,
        }
    }

    /// The SNI name the CA will request, e.g. `abcdef.acme.invalid`.
    pub fn validation_hostname(&self) -> String {
        validation_hostname(&self.nonce)
    }
}

/// Derive the validation hostname for a nonce.
pub fn validation_hostname(nonce: &str) -> String {
    format!("{}.{}", nonce.to_ascii_lowercase(), VALIDATION_DOMAIN_SUFFIX)
}

/// A challenge as handed in by the ACME client.
#[derive(Debug, Clone, PartialEq)]
pub enum Challenge {
    TlsSni(TlsSniChallenge),
    /// Any challenge type this responder does not answer.
    Other { kind: String },
}

impl Challenge {
    pub fn as_tls_sni(&self) -> Option<&TlsSniChallenge> {
        match self {
            Challenge::TlsSni(challenge) => Some(challenge),
            Challenge::Other { .. } => None,
        }
    }
}

impl From<TlsSniChallenge> for Challenge {
    fn from(challenge: TlsSniChallenge) -> Self {
        Challenge::TlsSni(challenge)
    }
}

/// Response payload handed back to the ACME client once the listener is up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub s: String,
}

impl ChallengeResponse {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            kind: CHALLENGE_TYPE,
            s: secret.into(),
        }
    }
}

/// Per-challenge result of `perform`, aligned with the input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// Listener is serving this challenge's certificate.
    Responded(ChallengeResponse),
    /// Challenge is ours but the listener could not be started.
    ListenerFailed,
    /// Challenge type is not handled by this responder.
    NotHandled,
}

impl ChallengeOutcome {
    pub fn is_responded(&self) -> bool {
        matches!(self, ChallengeOutcome::Responded(_))
    }

    pub fn response(&self) -> Option<&ChallengeResponse> {
        match self {
            ChallengeOutcome::Responded(response) => Some(response),
            _ => None,
        }
    }
}
