//! Plain data consumed by the validators. Everything here is already
//! parsed; decoding DER or document containers is the host's concern.

pub mod bundle;
pub mod certificate;
pub mod document;
pub mod revocation;

pub use bundle::ValidationData;
pub use certificate::{Certificate, CertificateId, ExtendedKeyUsage, KeyUsage};
pub use document::{DocumentRevision, SignatureContainer, SignatureEnvelope, TimestampToken};
pub use revocation::{
    CertId, CertStatus, Crl, OcspResponse, ResponderId, RevocationReason, RevokedCertificate,
    SingleResponse,
};
