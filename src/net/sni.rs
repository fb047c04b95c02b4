//! Certificate selection by requested server name.

use crate::challenge::{CertificateRecord, Registry};

/// What the listener answers for a given server name.
#[derive(Debug)]
pub enum HandshakeContext<'a> {
    /// Name is registered: present its certificate.
    Matched {
        hostname: &'a str,
        certificate: &'a CertificateRecord,
    },
    /// Unknown name: keep the default context, which only alerts.
    Default,
}

/// Picks the handshake context for each connection.
///
/// Owns the registry copied into the listener process at fork.
#[derive(Debug, Clone)]
pub struct SniResolver {
    registry: Registry,
}

impl SniResolver {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn resolve<'a>(&'a self, hostname: &'a str) -> HandshakeContext<'a> {
        match self.registry.get(hostname) {
            Some(certificate) => HandshakeContext::Matched {
                hostname,
                certificate,
            },
            None => {
                tracing::debug!(hostname, "No certificate registered for server name");
                HandshakeContext::Default
            }
        }
    }
}
