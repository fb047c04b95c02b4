//! Validation certificate issuance.

use rcgen::{CertificateParams, DnType, KeyPair};

use super::registry::CertificateRecord;
use super::TlsSniChallenge;
use crate::error::Result;

/// Produces the certificate presented for a challenge's validation hostname.
pub trait CertificateIssuer {
    fn issue(&self, challenge: &TlsSniChallenge) -> Result<CertificateRecord>;
}

/// Self-signed certificate naming the domain and the validation hostname,
/// signed with the challenge key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfSignedIssuer;

impl CertificateIssuer for SelfSignedIssuer {
    fn issue(&self, challenge: &TlsSniChallenge) -> Result<CertificateRecord> {
        let key_pair = KeyPair::from_pem(challenge.key.pem())?;

        let mut params = CertificateParams::new(vec![
            challenge.domain.clone(),
            challenge.validation_hostname(),
        ])?;
        params
            .distinguished_name
            .push(DnType::CommonName, challenge.domain.clone());

        let cert = params.self_signed(&key_pair)?;
        tracing::debug!(
            domain = %challenge.domain,
            hostname = %challenge.validation_hostname(),
            der_len = cert.der().len(),
            "Issued validation certificate"
        );

        Ok(CertificateRecord::new(cert.der().to_vec()))
    }
}
