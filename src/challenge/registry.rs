//! Hostname → certificate registry.
//!
//! Filled by `perform` before the listener forks. The child receives its own
//! copy and only reads from it, so no locking is involved.

use std::collections::HashMap;

/// DER bytes of one validation certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    der: Vec<u8>,
}

impl CertificateRecord {
    pub fn new(der: Vec<u8>) -> Self {
        Self { der }
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

/// Certificates keyed by validation hostname (lowercased).
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, CertificateRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a certificate, replacing any previous one for the hostname.
    pub fn insert(&mut self, hostname: &str, record: CertificateRecord) {
        self.entries.insert(hostname.to_ascii_lowercase(), record);
    }

    pub fn get(&self, hostname: &str) -> Option<&CertificateRecord> {
        self.entries.get(&hostname.to_ascii_lowercase())
    }

    pub fn contains(&self, hostname: &str) -> bool {
        self.entries.contains_key(&hostname.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered hostnames in sorted order.
    pub fn hostnames(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut registry = Registry::new();
        registry.insert("FooNonce.acme.invalid", CertificateRecord::new(vec![1, 2, 3]));

        assert!(registry.contains("foononce.acme.invalid"));
        assert_eq!(
            registry.get("FOONONCE.ACME.INVALID").map(CertificateRecord::der),
            Some(&[1u8, 2, 3][..])
        );
        assert!(!registry.contains("barnonce.acme.invalid"));
    }

    #[test]
    fn insert_replaces_existing_entry() {
        let mut registry = Registry::new();
        registry.insert("a.acme.invalid", CertificateRecord::new(vec![1]));
        registry.insert("a.acme.invalid", CertificateRecord::new(vec![2]));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a.acme.invalid").unwrap().der(), &[2]);
    }

    #[test]
    fn hostnames_are_sorted() {
        let mut registry = Registry::new();
        registry.insert("b.acme.invalid", CertificateRecord::new(vec![]));
        registry.insert("a.acme.invalid", CertificateRecord::new(vec![]));
        assert_eq!(registry.hostnames(), vec!["a.acme.invalid", "b.acme.invalid"]);
    }
}
