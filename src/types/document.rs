use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bundle::ValidationData;
use super::certificate::Certificate;
use crate::canonicalize::to_be_signed;
use crate::crypto;
use crate::error::Error;

/// One incremental revision of a document, as handed over by the
/// document source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRevision {
    pub number: u32,
    /// Signature fields present in this revision, including ones carried over
    /// from earlier revisions.
    #[serde(default)]
    pub signatures: Vec<SignatureContainer>,
    /// Document-level LTV data added by this revision.
    #[serde(default)]
    pub validation_data: ValidationData,
}

/// A signature field with everything needed to verify it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureContainer {
    pub field_name: String,
    /// Bytes covered by the signature's byte range.
    pub covered_bytes: Vec<u8>,
    /// Opaque cryptographic envelope, interpreted by the integrity verifier.
    pub envelope: Vec<u8>,
    #[serde(default)]
    pub validation_data: ValidationData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_signing_time: Option<DateTime<Utc>>,
}

/// Envelope layout understood by
/// [`EcdsaIntegrityVerifier`](crate::signature::EcdsaIntegrityVerifier).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureEnvelope {
    pub signing_certificate: Certificate,
    /// Base64 DER ECDSA signature over the covered bytes.
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<TimestampToken>,
}

impl SignatureEnvelope {
    /// # Errors
    ///
    /// Returns an error if the envelope cannot be encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    /// # Errors
    ///
    /// Returns an error if `bytes` is not an encoded envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Signature timestamp token issued by a timestamp authority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimestampToken {
    pub time: DateTime<Utc>,
    pub tsa_certificate: Certificate,
    /// SHA-256 of the timestamped signature value, hex encoded.
    pub message_imprint: String,
    #[serde(default)]
    pub signature: String,
}

impl TimestampToken {
    /// # Errors
    ///
    /// Returns an error if the token cannot be encoded.
    pub fn to_be_signed(&self) -> Result<Vec<u8>, Error> {
        to_be_signed(self)
    }

    /// Signed by its TSA and bound to `signature_value`.
    pub fn covers(&self, signature_value: &str) -> bool {
        if self.message_imprint != crypto::sha256_hex(signature_value.as_bytes()) {
            return false;
        }
        match self.to_be_signed() {
            Ok(tbs) => crypto::signature_matches(
                &self.tsa_certificate.public_key_pem,
                &tbs,
                &self.signature,
            ),
            Err(_) => false,
        }
    }
}
