use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto;
use crate::error::Error;
use crate::types::certificate::Certificate;

/// What a trust anchor is trusted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPurpose {
    /// Trusted in every role.
    General,
    Ca,
    Timestamp,
    Ocsp,
    Crl,
}

/// A trust anchor and the purposes it is trusted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedCertificate {
    pub certificate: Certificate,
    pub purposes: BTreeSet<TrustPurpose>,
}

/// Trust anchors indexed by subject name.
///
/// One multi-map holds every anchor; each entry carries its purpose set, so a
/// certificate trusted for several purposes is stored once. Populated before a
/// validation run and only read during it.
#[derive(Debug, Clone, Default)]
pub struct TrustedCertificatesStore {
    by_subject: HashMap<String, Vec<TrustedCertificate>>,
}

impl TrustedCertificatesStore {
    pub fn new() -> Self {
        Self {
            by_subject: HashMap::new(),
        }
    }

    /// Trust `certificates` for `purpose`. Adding an already known certificate
    /// extends its purpose set.
    pub fn add_trusted<'a, I>(&mut self, purpose: TrustPurpose, certificates: I)
    where
        I: IntoIterator<Item = &'a Certificate>,
    {
        for cert in certificates {
            let entries = self.by_subject.entry(cert.subject.clone()).or_default();
            match entries.iter_mut().find(|e| &e.certificate == cert) {
                Some(entry) => {
                    entry.purposes.insert(purpose);
                }
                None => entries.push(TrustedCertificate {
                    certificate: cert.clone(),
                    purposes: BTreeSet::from([purpose]),
                }),
            }
            debug!(subject = %cert.subject, ?purpose, "trust anchor added");
        }
    }

    pub fn add_generally_trusted<'a, I>(&mut self, certificates: I)
    where
        I: IntoIterator<Item = &'a Certificate>,
    {
        self.add_trusted(TrustPurpose::General, certificates);
    }

    fn entry_for(&self, cert: &Certificate) -> Option<&TrustedCertificate> {
        self.by_subject
            .get(&cert.subject)?
            .iter()
            .find(|e| &e.certificate == cert)
    }

    /// Whether `cert` is trusted for exactly `purpose`.
    pub fn is_trusted_for(&self, purpose: TrustPurpose, cert: &Certificate) -> bool {
        self.entry_for(cert)
            .map_or(false, |e| e.purposes.contains(&purpose))
    }

    /// Whether `cert` is generally trusted.
    pub fn is_generally_trusted(&self, cert: &Certificate) -> bool {
        self.is_trusted_for(TrustPurpose::General, cert)
    }

    /// Purposes `cert` is trusted for; empty when unknown.
    pub fn purposes_for(&self, cert: &Certificate) -> BTreeSet<TrustPurpose> {
        self.entry_for(cert)
            .map(|e| e.purposes.clone())
            .unwrap_or_default()
    }

    /// Certificates with `subject` trusted for `purpose`.
    pub fn certificates_trusted_for(
        &self,
        purpose: TrustPurpose,
        subject: &str,
    ) -> Vec<&Certificate> {
        self.by_subject
            .get(subject)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.purposes.contains(&purpose))
                    .map(|e| &e.certificate)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every anchor with `subject`, whatever it is trusted for.
    pub fn all_known_certificates(&self, subject: &str) -> Vec<&Certificate> {
        self.by_subject
            .get(subject)
            .map(|entries| entries.iter().map(|e| &e.certificate).collect())
            .unwrap_or_default()
    }

    /// Every anchor in the store.
    pub fn all_certificates(&self) -> impl Iterator<Item = &Certificate> {
        self.by_subject
            .values()
            .flat_map(|entries| entries.iter().map(|e| &e.certificate))
    }

    pub fn len(&self) -> usize {
        self.by_subject.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_subject.is_empty()
    }

    /// Serialize the store to JSON. Entries are ordered by subject then serial.
    pub fn to_json(&self) -> Result<String, Error> {
        let mut entries: Vec<&TrustedCertificate> = self.by_subject.values().flatten().collect();
        entries.sort_by(|a, b| {
            (&a.certificate.subject, &a.certificate.serial_number)
                .cmp(&(&b.certificate.subject, &b.certificate.serial_number))
        });
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    /// Deserialize the store from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first malformed entry. No partial
    /// store is returned.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let entries: Vec<TrustedCertificate> = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Malformed trust store: {}", e)))?;
        let mut store = Self::new();
        for (index, entry) in entries.into_iter().enumerate() {
            validate_entry(&entry)
                .map_err(|msg| Error::Config(format!("Trust store entry {}: {}", index, msg)))?;
            for purpose in &entry.purposes {
                store.add_trusted(*purpose, [&entry.certificate]);
            }
        }
        Ok(store)
    }

    /// Write the store to `path` as JSON.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a store previously written with [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

fn validate_entry(entry: &TrustedCertificate) -> Result<(), String> {
    let cert = &entry.certificate;
    if cert.subject.trim().is_empty() {
        return Err("empty subject".to_string());
    }
    if entry.purposes.is_empty() {
        return Err(format!("'{}' has no trust purpose", cert.subject));
    }
    if cert.not_before > cert.not_after {
        return Err(format!("'{}' has an inverted validity period", cert.subject));
    }
    crypto::validate_public_key(&cert.public_key_pem)
        .map_err(|e| format!("'{}' has an unusable public key: {}", cert.subject, e))
}
