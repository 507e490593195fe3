use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonicalize::to_be_signed;
use crate::crypto;
use crate::error::Error;

/// An already-parsed certificate. Never mutated once obtained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Certificate {
    pub serial_number: String,
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub public_key_pem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_key_id: Option<String>,
    #[serde(default)]
    pub is_ca: bool,
    #[serde(default)]
    pub key_usage: Vec<KeyUsage>,
    #[serde(default)]
    pub extended_key_usage: Vec<ExtendedKeyUsage>,
    /// Authority information access, caIssuers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_issuers_url: Option<String>,
    /// Authority information access, OCSP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocsp_url: Option<String>,
    #[serde(default)]
    pub crl_urls: Vec<String>,
    /// id-pkix-ocsp-nocheck.
    #[serde(default)]
    pub ocsp_no_check: bool,
    /// Issuer signature over the canonical to-be-signed bytes.
    #[serde(default)]
    pub signature: String,
}

/// Issuer name plus serial number, unique per issuing CA.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CertificateId {
    pub issuer: String,
    pub serial_number: String,
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.issuer, self.serial_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyUsage {
    DigitalSignature,
    NonRepudiation,
    KeyEncipherment,
    DataEncipherment,
    KeyAgreement,
    KeyCertSign,
    CrlSign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtendedKeyUsage {
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    TimeStamping,
    OcspSigning,
    DocumentSigning,
}

impl Certificate {
    pub fn id(&self) -> CertificateId {
        CertificateId {
            issuer: self.issuer.clone(),
            serial_number: self.serial_number.clone(),
        }
    }

    /// Subject and issuer names are equal.
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    pub fn is_valid_at(&self, time: DateTime<Utc>) -> bool {
        self.not_before <= time && time <= self.not_after
    }

    pub fn has_key_usage(&self, usage: KeyUsage) -> bool {
        self.key_usage.contains(&usage)
    }

    pub fn has_extended_key_usage(&self, usage: ExtendedKeyUsage) -> bool {
        self.extended_key_usage.contains(&usage)
    }

    /// Canonical bytes covered by the issuer signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be encoded.
    pub fn to_be_signed(&self) -> Result<Vec<u8>, Error> {
        to_be_signed(self)
    }

    /// Whether `issuer`'s key produced this certificate's signature.
    pub fn is_signed_by(&self, issuer: &Certificate) -> bool {
        match self.to_be_signed() {
            Ok(tbs) => crypto::signature_matches(&issuer.public_key_pem, &tbs, &self.signature),
            Err(_) => false,
        }
    }

    /// SHA-1 hash of the public key, as used by OCSP.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be parsed.
    pub fn key_hash(&self) -> Result<String, Error> {
        Ok(crypto::key_hash(&self.public_key_pem)?)
    }

    /// AKI/SKI pairing. Absent identifiers never rule a candidate out.
    pub fn key_identifier_matches(&self, candidate_issuer: &Certificate) -> bool {
        match (&self.authority_key_id, &candidate_issuer.subject_key_id) {
            (Some(aki), Some(ski)) => aki.eq_ignore_ascii_case(ski),
            _ => true,
        }
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (serial {})", self.subject, self.serial_number)
    }
}
