//! # sigtrust
//!
//! Trust-chain and revocation validation for signed documents.
//!
//! Given a document's signatures, a store of trust anchors and whatever
//! long-term validation material the document carries, sigtrust decides for
//! every signature whether its signing certificate chains to a trusted
//! anchor and was not revoked at the relevant time. Findings are collected
//! in a structured [`ValidationReport`] with a VALID, INDETERMINATE or
//! INVALID verdict.
//!
//! ## Features
//!
//! - **Chain building**: issuers from the trust store, embedded certificates
//!   or the caIssuers URL, with cycle detection
//! - **Revocation**: OCSP with CRL fallback, responder and CRL issuer
//!   authorization, freshness windows
//! - **Policy**: per (validator, certificate role, time basis) properties
//! - **Documents**: revision-aware validation with timestamp-based
//!   proof of existence
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sigtrust::{DocumentRevision, TrustedCertificatesStore, ValidatorChainBuilder};
//!
//! # fn run(anchors: &str, revisions: Vec<DocumentRevision>) -> Result<(), sigtrust::Error> {
//! let store = TrustedCertificatesStore::from_json(anchors)?;
//! let builder = ValidatorChainBuilder::new().with_trust_store(store);
//!
//! let report = builder.build_signature_validator().validate_document(&revisions)?;
//! for signature in &report.signatures {
//!     println!("{}: {}", signature.field_name, signature.result());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Validation findings never surface as errors; they end up in the report.
//! [`Error`] is reserved for malformed configuration and document sources
//! that fail outright.

pub mod builder;
pub mod canonicalize;
pub mod chain;
pub mod context;
pub mod crypto;
pub mod error;
pub mod issuer;
pub mod properties;
pub mod report;
pub mod retriever;
pub mod revocation;
pub mod signature;
pub mod trust_store;
pub mod types;

#[cfg(test)]
mod test_support;

pub use builder::ValidatorChainBuilder;
pub use chain::{CertificateChainValidator, ChainValidation};
pub use context::{CertificateSource, TimeBasedContext, ValidationContext, ValidatorContext};
pub use error::Error;
pub use properties::{
    ContextSelector, OnlineFetching, RevocationSources, SignatureValidationProperties,
};
pub use report::{ReportItem, ReportItemStatus, ValidationReport, ValidationResult};
pub use retriever::{InMemoryRetriever, Retriever};
pub use revocation::{RevocationDataValidator, RevocationStatus};
pub use signature::{
    DocumentReport, DocumentSource, EcdsaIntegrityVerifier, IntegrityVerifier, SignatureReport,
    SignatureValidator, TimeBasis,
};
pub use trust_store::{TrustPurpose, TrustedCertificatesStore};
pub use types::{Certificate, DocumentRevision, SignatureContainer, ValidationData};
