use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::certificate::Certificate;
use crate::canonicalize::to_be_signed;
use crate::crypto;
use crate::error::Error;

/// Identifies the certificate an OCSP single response speaks about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CertId {
    pub issuer_name: String,
    pub issuer_key_hash: String,
    pub serial_number: String,
}

impl CertId {
    /// Build the id for `cert` as issued by `issuer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the issuer key cannot be parsed.
    pub fn new(cert: &Certificate, issuer: &Certificate) -> Result<Self, Error> {
        Ok(Self {
            issuer_name: issuer.subject.clone(),
            issuer_key_hash: issuer.key_hash()?,
            serial_number: cert.serial_number.clone(),
        })
    }

    /// GET-style request location at `responder_url`.
    pub fn request_url(&self, responder_url: &str) -> String {
        format!(
            "{}/{}/{}",
            responder_url.trim_end_matches('/'),
            self.serial_number,
            self.issuer_key_hash
        )
    }
}

/// Status carried by one OCSP single response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CertStatus {
    Good,
    Revoked {
        revocation_time: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<RevocationReason>,
    },
    Unknown,
}

/// How an OCSP response names its signer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponderId {
    ByName(String),
    /// SHA-1 hash of the responder's public key, hex encoded.
    ByKey(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SingleResponse {
    pub cert_id: CertId,
    pub cert_status: CertStatus,
    pub this_update: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_update: Option<DateTime<Utc>>,
}

/// A basic OCSP response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OcspResponse {
    pub responder_id: ResponderId,
    pub produced_at: DateTime<Utc>,
    pub responses: Vec<SingleResponse>,
    /// Certificates shipped with the response, typically the responder's.
    #[serde(default)]
    pub certs: Vec<Certificate>,
    #[serde(default)]
    pub signature: String,
}

impl OcspResponse {
    /// # Errors
    ///
    /// Returns an error if the response cannot be encoded.
    pub fn to_be_signed(&self) -> Result<Vec<u8>, Error> {
        to_be_signed(self)
    }

    pub fn is_signed_by(&self, signer: &Certificate) -> bool {
        match self.to_be_signed() {
            Ok(tbs) => crypto::signature_matches(&signer.public_key_pem, &tbs, &self.signature),
            Err(_) => false,
        }
    }

    /// The single response about `cert_id`, if any.
    pub fn find_response(&self, cert_id: &CertId) -> Option<&SingleResponse> {
        self.responses.iter().find(|r| &r.cert_id == cert_id)
    }

    /// Whether any single response speaks about `serial` from `issuer_name`.
    pub fn covers(&self, issuer_name: &str, serial: &str) -> bool {
        self.responses
            .iter()
            .any(|r| r.cert_id.issuer_name == issuer_name && r.cert_id.serial_number == serial)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevokedCertificate {
    pub serial_number: String,
    pub revocation_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RevocationReason>,
}

/// A certificate revocation list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Crl {
    pub issuer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_key_id: Option<String>,
    pub this_update: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked: Vec<RevokedCertificate>,
    #[serde(default)]
    pub signature: String,
}

impl Crl {
    /// # Errors
    ///
    /// Returns an error if the CRL cannot be encoded.
    pub fn to_be_signed(&self) -> Result<Vec<u8>, Error> {
        to_be_signed(self)
    }

    pub fn is_signed_by(&self, signer: &Certificate) -> bool {
        match self.to_be_signed() {
            Ok(tbs) => crypto::signature_matches(&signer.public_key_pem, &tbs, &self.signature),
            Err(_) => false,
        }
    }

    pub fn find_revoked(&self, serial: &str) -> Option<&RevokedCertificate> {
        self.revoked.iter().find(|r| r.serial_number == serial)
    }
}

/// Reason for certificate revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    PrivilegeWithdrawn,
}
