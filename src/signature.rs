//! Document-level signature validation.
//!
//! [`SignatureValidator`] walks a document's revisions from newest to oldest
//! and validates each signature field once: cryptographic integrity through
//! an [`IntegrityVerifier`], then the signing certificate's chain at the
//! signature's time basis.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::builder::ValidatorChainBuilder;
use crate::context::{CertificateSource, TimeBasedContext, ValidationContext, ValidatorContext};
use crate::crypto;
use crate::error::Error;
use crate::report::{ReportItem, ReportItemStatus, ValidationReport, ValidationResult};
use crate::types::bundle::ValidationData;
use crate::types::certificate::Certificate;
use crate::types::document::{
    DocumentRevision, SignatureContainer, SignatureEnvelope, TimestampToken,
};

const CHECK: &str = "Signature check";

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Yields the revisions of one document.
pub trait DocumentSource {
    /// # Errors
    ///
    /// Returns an error if the document cannot be read.
    fn revisions(&self) -> Result<Vec<DocumentRevision>, Error>;
}

impl DocumentSource for [DocumentRevision] {
    fn revisions(&self) -> Result<Vec<DocumentRevision>, Error> {
        Ok(self.to_vec())
    }
}

impl DocumentSource for Vec<DocumentRevision> {
    fn revisions(&self) -> Result<Vec<DocumentRevision>, Error> {
        Ok(self.clone())
    }
}

/// Outcome of the cryptographic integrity check of one signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityResult {
    pub valid: bool,
    pub signing_certificate: Option<Certificate>,
    pub timestamp: Option<TimestampToken>,
    /// Why the check failed.
    pub message: Option<String>,
}

impl IntegrityResult {
    pub fn verified(signing_certificate: Certificate, timestamp: Option<TimestampToken>) -> Self {
        Self {
            valid: true,
            signing_certificate: Some(signing_certificate),
            timestamp,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            signing_certificate: None,
            timestamp: None,
            message: Some(message.into()),
        }
    }
}

/// Checks that `envelope` signs `covered_bytes` and extracts the signer.
pub trait IntegrityVerifier: Send + Sync {
    fn verify_integrity(&self, covered_bytes: &[u8], envelope: &[u8]) -> IntegrityResult;
}

/// Verifies JSON [`SignatureEnvelope`]s carrying ECDSA P-256 signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaIntegrityVerifier;

impl IntegrityVerifier for EcdsaIntegrityVerifier {
    fn verify_integrity(&self, covered_bytes: &[u8], envelope: &[u8]) -> IntegrityResult {
        let envelope = match SignatureEnvelope::from_bytes(envelope) {
            Ok(envelope) => envelope,
            Err(e) => {
                return IntegrityResult::failed(format!("undecodable signature envelope: {}", e))
            }
        };

        if !crypto::signature_matches(
            &envelope.signing_certificate.public_key_pem,
            covered_bytes,
            &envelope.signature,
        ) {
            return IntegrityResult {
                signing_certificate: Some(envelope.signing_certificate),
                ..IntegrityResult::failed("signature does not match the covered bytes")
            };
        }

        if let Some(ref token) = envelope.timestamp {
            if !token.covers(&envelope.signature) {
                return IntegrityResult {
                    signing_certificate: Some(envelope.signing_certificate),
                    ..IntegrityResult::failed("timestamp token does not cover the signature")
                };
            }
        }

        IntegrityResult::verified(envelope.signing_certificate, envelope.timestamp)
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Instant a signature is validated at, and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "time", rename_all = "snake_case")]
pub enum TimeBasis {
    /// Time of a trusted signature timestamp.
    Timestamp(DateTime<Utc>),
    /// Signing time claimed by the signer.
    SigningTime(DateTime<Utc>),
    /// Validation time.
    Current(DateTime<Utc>),
}

impl TimeBasis {
    pub fn time(&self) -> DateTime<Utc> {
        match *self {
            TimeBasis::Timestamp(t) | TimeBasis::SigningTime(t) | TimeBasis::Current(t) => t,
        }
    }

    pub fn time_based(&self) -> TimeBasedContext {
        match self {
            TimeBasis::Current(_) => TimeBasedContext::Present,
            _ => TimeBasedContext::Historical,
        }
    }
}

impl fmt::Display for TimeBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeBasis::Timestamp(t) => write!(f, "timestamp {}", t),
            TimeBasis::SigningTime(t) => write!(f, "claimed signing time {}", t),
            TimeBasis::Current(t) => write!(f, "current time {}", t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureReport {
    pub field_name: String,
    /// Revision that introduced the signature.
    pub revision: u32,
    pub time_basis: TimeBasis,
    pub integrity_valid: bool,
    pub report: ValidationReport,
}

impl SignatureReport {
    pub fn result(&self) -> ValidationResult {
        if !self.integrity_valid {
            return ValidationResult::Invalid;
        }
        self.report.result()
    }
}

/// Per-signature reports, newest signature first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub signatures: Vec<SignatureReport>,
}

impl DocumentReport {
    /// INVALID if any signature failed integrity, else the worst signature
    /// verdict.
    pub fn result(&self) -> ValidationResult {
        if self.signatures.iter().any(|s| !s.integrity_valid) {
            return ValidationResult::Invalid;
        }
        self.signatures
            .iter()
            .map(SignatureReport::result)
            .max()
            .unwrap_or(ValidationResult::Valid)
    }

    pub fn signature(&self, field_name: &str) -> Option<&SignatureReport> {
        self.signatures.iter().find(|s| s.field_name == field_name)
    }

    /// All findings merged in signature order.
    pub fn report(&self) -> ValidationReport {
        let mut merged = ValidationReport::new();
        for signature in &self.signatures {
            merged.merge(signature.report.clone());
        }
        merged
    }
}

// ---------------------------------------------------------------------------
// SignatureValidator
// ---------------------------------------------------------------------------

enum RevisionState {
    Checking(usize),
    PreviousRevision(usize),
    Done,
}

pub struct SignatureValidator<'a> {
    builder: &'a ValidatorChainBuilder,
}

impl<'a> SignatureValidator<'a> {
    pub fn new(builder: &'a ValidatorChainBuilder) -> Self {
        Self { builder }
    }

    /// Validate every signature of the document `source` yields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Document`] when the source fails or yields no
    /// revision. Validation findings are never errors.
    pub fn validate_document<S: DocumentSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<DocumentReport, Error> {
        let mut revisions = source.revisions().map_err(|e| match e {
            Error::Document(msg) => Error::Document(msg),
            other => Error::Document(other.to_string()),
        })?;
        if revisions.is_empty() {
            return Err(Error::Document("document has no revisions".to_string()));
        }
        revisions.sort_by(|a, b| b.number.cmp(&a.number));

        let mut document_data = ValidationData::new();
        let mut introduced: HashMap<&str, u32> = HashMap::new();
        for revision in &revisions {
            document_data.extend(&revision.validation_data);
            for container in &revision.signatures {
                introduced.insert(container.field_name.as_str(), revision.number);
            }
        }

        let mut processed: HashSet<&str> = HashSet::new();
        let mut proof_of_existence = self.builder.now();
        let mut signatures = Vec::new();
        let mut state = RevisionState::Checking(0);

        loop {
            state = match state {
                RevisionState::Checking(index) => {
                    let current = &revisions[index];
                    let mut pending: Vec<(&SignatureContainer, u32)> = current
                        .signatures
                        .iter()
                        .filter(|c| processed.insert(c.field_name.as_str()))
                        .map(|c| {
                            let revision = introduced
                                .get(c.field_name.as_str())
                                .copied()
                                .unwrap_or(current.number);
                            (c, revision)
                        })
                        .collect();
                    pending.sort_by(|a, b| b.1.cmp(&a.1));

                    let mut group: Option<u32> = None;
                    let mut group_poe: Option<DateTime<Utc>> = None;
                    for (container, revision) in pending {
                        if group != Some(revision) {
                            if let Some(t) = group_poe.take() {
                                proof_of_existence = t;
                            }
                            group = Some(revision);
                        }
                        let (report, trusted_timestamp) = self.validate_signature(
                            container,
                            revision,
                            &document_data,
                            proof_of_existence,
                        );
                        if let Some(t) = trusted_timestamp {
                            group_poe = Some(group_poe.map_or(t, |g| g.min(t)));
                        }
                        signatures.push(report);
                    }
                    if let Some(t) = group_poe {
                        proof_of_existence = t;
                    }
                    RevisionState::PreviousRevision(index)
                }
                RevisionState::PreviousRevision(index) if index + 1 < revisions.len() => {
                    RevisionState::Checking(index + 1)
                }
                RevisionState::PreviousRevision(_) => RevisionState::Done,
                RevisionState::Done => break,
            };
        }

        let report = DocumentReport { signatures };
        debug!(
            signatures = report.signatures.len(),
            result = %report.result(),
            "document validated"
        );
        Ok(report)
    }

    /// Validate one signature. Also returns the time of its timestamp when
    /// the timestamp is trusted.
    fn validate_signature(
        &self,
        container: &SignatureContainer,
        revision: u32,
        document_data: &ValidationData,
        proof_of_existence: DateTime<Utc>,
    ) -> (SignatureReport, Option<DateTime<Utc>>) {
        let now = self.builder.now();
        let mut report = ValidationReport::new();
        let ctx = ValidationContext::new(
            ValidatorContext::SignatureValidator,
            CertificateSource::SignerCert,
            TimeBasedContext::Present,
        );

        let integrity = self
            .builder
            .integrity_verifier()
            .verify_integrity(&container.covered_bytes, &container.envelope);
        let signer = match (integrity.valid, integrity.signing_certificate) {
            (true, Some(signer)) => signer,
            (_, signer) => {
                let message = integrity
                    .message
                    .unwrap_or_else(|| "no signing certificate".to_string());
                let message = format!(
                    "{}: integrity check failed: {}",
                    container.field_name, message
                );
                match signer {
                    Some(ref cert) => report.invalid(CHECK, cert, message),
                    None => report.add(ReportItem::new(CHECK, message, ReportItemStatus::Invalid)),
                }
                return (
                    SignatureReport {
                        field_name: container.field_name.clone(),
                        revision,
                        time_basis: TimeBasis::Current(now),
                        integrity_valid: false,
                        report,
                    },
                    None,
                );
            }
        };

        let mut data = container.validation_data.clone();
        data.extend(document_data);
        let chain = self.builder.build_certificate_chain_validator(&data);

        let mut trusted_timestamp = None;
        if let Some(token) = integrity.timestamp {
            let time_based = if proof_of_existence < now {
                TimeBasedContext::Historical
            } else {
                TimeBasedContext::Present
            };
            let tsa_report = chain.validate(
                ctx.with_source(CertificateSource::Timestamp)
                    .with_time_based(time_based),
                &token.tsa_certificate,
                proof_of_existence,
            );
            if tsa_report.is_valid() {
                report.merge(tsa_report);
                report.info(
                    CHECK,
                    &signer,
                    format!("{}: signature timestamped at {}", container.field_name, token.time),
                );
                trusted_timestamp = Some(token.time);
            } else {
                report.merge_downgraded(tsa_report);
                report.indeterminate(
                    CHECK,
                    &token.tsa_certificate,
                    format!(
                        "{}: signature timestamp is not trusted, \
                         falling back to the claimed signing time",
                        container.field_name
                    ),
                );
            }
        }

        let time_basis = match (trusted_timestamp, container.claimed_signing_time) {
            (Some(t), _) => TimeBasis::Timestamp(t),
            (None, Some(t)) => TimeBasis::SigningTime(t),
            (None, None) => TimeBasis::Current(now),
        };
        debug!(field = %container.field_name, %time_basis, "validating signing certificate");

        report.merge(chain.validate(
            ctx.with_time_based(time_basis.time_based()),
            &signer,
            time_basis.time(),
        ));

        (
            SignatureReport {
                field_name: container.field_name.clone(),
                revision,
                time_basis,
                integrity_valid: true,
                report,
            },
            trusted_timestamp,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, TestPki};
    use crate::trust_store::{TrustPurpose, TrustedCertificatesStore};

    fn ltv_data(pki: &TestPki, times: &[DateTime<Utc>]) -> ValidationData {
        let mut data = ValidationData::new();
        data.certificates.push(pki.intermediate.clone());
        for t in times {
            data.ocsp_responses.push(pki.ocsp_good(&pki.leaf, *t));
            data.crls.push(pki.crl_empty(&pki.root, *t));
        }
        data
    }

    fn revision(number: u32, signatures: Vec<SignatureContainer>) -> DocumentRevision {
        DocumentRevision {
            number,
            signatures,
            validation_data: ValidationData::new(),
        }
    }

    #[test]
    fn test_revision_ordering_keeps_own_time_basis() {
        let pki = TestPki::new();
        let mut sig1 = pki.signature_container(
            "Sig1",
            b"revision one",
            Some(at(2025, 1, 15)),
            Some(at(2025, 2, 1)),
        );
        sig1.validation_data = ltv_data(&pki, &[at(2025, 2, 1)]);
        let mut sig2 = pki.signature_container(
            "Sig2",
            b"revision one and two",
            Some(at(2025, 5, 1)),
            Some(at(2025, 5, 2)),
        );
        sig2.validation_data = ltv_data(&pki, &[at(2025, 5, 2)]);

        let document = vec![
            revision(1, vec![sig1.clone()]),
            revision(2, vec![sig1, sig2]),
        ];
        let builder = pki.builder();
        let report = builder
            .build_signature_validator()
            .validate_document(&document)
            .unwrap();

        let fields: Vec<&str> = report
            .signatures
            .iter()
            .map(|s| s.field_name.as_str())
            .collect();
        assert_eq!(fields, vec!["Sig2", "Sig1"]);

        let first = report.signature("Sig1").unwrap();
        assert_eq!(first.revision, 1);
        assert_eq!(first.time_basis, TimeBasis::Timestamp(at(2025, 2, 1)));
        let second = report.signature("Sig2").unwrap();
        assert_eq!(second.revision, 2);
        assert_eq!(second.time_basis, TimeBasis::Timestamp(at(2025, 5, 2)));

        assert_eq!(report.result(), ValidationResult::Valid, "{}", report.report());
    }

    #[test]
    fn test_claimed_signing_time_used_without_timestamp() {
        let pki = TestPki::new();
        let mut sig = pki.signature_container("Sig1", b"content", Some(at(2025, 3, 1)), None);
        sig.validation_data = ltv_data(&pki, &[at(2025, 3, 1)]);
        let builder = pki.builder();

        let report = builder
            .build_signature_validator()
            .validate_document(&vec![revision(1, vec![sig])])
            .unwrap();
        let sig = report.signature("Sig1").unwrap();
        assert_eq!(sig.time_basis, TimeBasis::SigningTime(at(2025, 3, 1)));
        assert_eq!(sig.time_basis.time_based(), TimeBasedContext::Historical);
        assert!(sig.report.is_valid(), "{}", sig.report);
    }

    #[test]
    fn test_current_time_without_any_time_claim() {
        let pki = TestPki::new();
        let sig = pki.signature_container("Sig1", b"content", None, None);
        let mut rev = revision(1, vec![sig]);
        rev.validation_data = ltv_data(&pki, &[at(2025, 5, 30)]);
        let builder = pki.builder();

        let report = builder
            .build_signature_validator()
            .validate_document(&vec![rev])
            .unwrap();
        let sig = report.signature("Sig1").unwrap();
        assert_eq!(sig.time_basis, TimeBasis::Current(at(2025, 6, 1)));
        assert!(sig.report.is_valid(), "{}", sig.report);
    }

    #[test]
    fn test_untrusted_timestamp_falls_back_to_signing_time() {
        let pki = TestPki::new();
        let mut sig = pki.signature_container(
            "Sig1",
            b"content",
            Some(at(2025, 3, 1)),
            Some(at(2025, 3, 2)),
        );
        sig.validation_data = ltv_data(&pki, &[at(2025, 3, 1)]);
        let mut store = TrustedCertificatesStore::new();
        store.add_trusted(TrustPurpose::Ca, [&pki.root]);
        let builder = pki.builder().with_trust_store(store);

        let report = builder
            .build_signature_validator()
            .validate_document(&vec![revision(1, vec![sig])])
            .unwrap();
        let sig = report.signature("Sig1").unwrap();
        assert_eq!(sig.time_basis, TimeBasis::SigningTime(at(2025, 3, 1)));
        assert!(sig.report.mentions("timestamp is not trusted"));
        assert_eq!(report.result(), ValidationResult::Indeterminate);
    }

    #[test]
    fn test_integrity_failure_is_invalid() {
        let pki = TestPki::new();
        let mut sig = pki.signature_container("Sig1", b"original", Some(at(2025, 3, 1)), None);
        sig.covered_bytes = b"tampered".to_vec();
        let mut good = pki.signature_container("Sig0", b"older", Some(at(2025, 3, 1)), None);
        good.validation_data = ltv_data(&pki, &[at(2025, 3, 1)]);
        let builder = pki.builder();

        let report = builder
            .build_signature_validator()
            .validate_document(&vec![revision(1, vec![good]), revision(2, vec![sig])])
            .unwrap();
        assert_eq!(report.signatures.len(), 2);
        assert!(!report.signature("Sig1").unwrap().integrity_valid);
        assert!(report.signature("Sig0").unwrap().report.is_valid());
        assert_eq!(report.result(), ValidationResult::Invalid);
        assert!(report.report().mentions("integrity check failed"));
    }

    #[test]
    fn test_garbage_envelope_is_invalid() {
        let pki = TestPki::new();
        let mut sig = pki.signature_container("Sig1", b"content", None, None);
        sig.envelope = b"\x30\x80garbage".to_vec();
        let builder = pki.builder();

        let report = builder
            .build_signature_validator()
            .validate_document(&vec![revision(1, vec![sig])])
            .unwrap();
        assert_eq!(report.result(), ValidationResult::Invalid);
        assert!(report.report().mentions("undecodable"));
    }

    #[test]
    fn test_document_without_revisions_is_error() {
        let builder = ValidatorChainBuilder::new();
        let empty: Vec<DocumentRevision> = Vec::new();
        assert!(matches!(
            builder.build_signature_validator().validate_document(&empty),
            Err(Error::Document(_))
        ));
    }

    #[test]
    fn test_source_failure_is_error() {
        struct Truncated;
        impl DocumentSource for Truncated {
            fn revisions(&self) -> Result<Vec<DocumentRevision>, Error> {
                Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "truncated",
                )))
            }
        }
        let builder = ValidatorChainBuilder::new();
        match builder.build_signature_validator().validate_document(&Truncated) {
            Err(Error::Document(msg)) => assert!(msg.contains("truncated")),
            other => panic!("expected document error, got {:?}", other),
        }
    }

    #[test]
    fn test_unsigned_document_is_valid() {
        let builder = ValidatorChainBuilder::new();
        let report = builder
            .build_signature_validator()
            .validate_document(&vec![revision(1, vec![])])
            .unwrap();
        assert!(report.signatures.is_empty());
        assert_eq!(report.result(), ValidationResult::Valid);
    }

    #[test]
    fn test_time_basis_serde() {
        let json = serde_json::to_string(&TimeBasis::SigningTime(at(2025, 3, 1))).unwrap();
        assert!(json.contains(r#""kind":"signing_time""#));
    }
}
