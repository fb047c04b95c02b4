//! Signing key material shared by every validation certificate in a batch.

use std::fmt;
use std::path::Path;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// PEM-encoded private key. The buffer is wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey {
    pem: String,
}

impl SigningKey {
    /// Wrap PEM text after checking it holds a private key.
    pub fn from_pem(pem: impl Into<String>) -> Result<Self> {
        let pem = pem.into();
        match rustls_pemfile::private_key(&mut pem.as_bytes()) {
            Ok(Some(_)) => Ok(Self { pem }),
            Ok(None) => Err(Error::Key("no private key found in PEM input".into())),
            Err(e) => Err(Error::Key(format!("unreadable PEM input: {}", e))),
        }
    }

    pub fn from_pem_file(path: &Path) -> Result<Self> {
        let pem = std::fs::read_to_string(path).map_err(|e| {
            Error::Key(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_pem(pem)
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey").finish_non_exhaustive()
    }
}
