//! The (validator, certificate role, time basis) triple used as the policy
//! lookup key. Contexts are `Copy` and passed down by value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::trust_store::TrustPurpose;

/// Which validator performs the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidatorContext {
    SignatureValidator,
    CertificateChainValidator,
    RevocationDataValidator,
    OcspValidator,
    CrlValidator,
}

/// The role the certificate under check plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateSource {
    SignerCert,
    CertIssuer,
    OcspIssuer,
    CrlIssuer,
    Timestamp,
}

impl CertificateSource {
    /// Trust-store purpose that makes a certificate in this role a trust anchor.
    pub fn trust_purpose(self) -> Option<TrustPurpose> {
        match self {
            CertificateSource::SignerCert => None,
            CertificateSource::CertIssuer => Some(TrustPurpose::Ca),
            CertificateSource::OcspIssuer => Some(TrustPurpose::Ocsp),
            CertificateSource::CrlIssuer => Some(TrustPurpose::Crl),
            CertificateSource::Timestamp => Some(TrustPurpose::Timestamp),
        }
    }
}

/// Whether the check is about the present or a point in the past.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeBasedContext {
    Present,
    Historical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationContext {
    pub validator: ValidatorContext,
    pub source: CertificateSource,
    pub time_based: TimeBasedContext,
}

impl ValidationContext {
    pub fn new(
        validator: ValidatorContext,
        source: CertificateSource,
        time_based: TimeBasedContext,
    ) -> Self {
        Self {
            validator,
            source,
            time_based,
        }
    }

    pub fn with_validator(self, validator: ValidatorContext) -> Self {
        Self { validator, ..self }
    }

    pub fn with_source(self, source: CertificateSource) -> Self {
        Self { source, ..self }
    }

    pub fn with_time_based(self, time_based: TimeBasedContext) -> Self {
        Self { time_based, ..self }
    }
}

impl fmt::Display for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}/{:?}", self.validator, self.source, self.time_based)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_helpers_leave_original() {
        let ctx = ValidationContext::new(
            ValidatorContext::SignatureValidator,
            CertificateSource::SignerCert,
            TimeBasedContext::Present,
        );
        let issuer_ctx = ctx
            .with_validator(ValidatorContext::CertificateChainValidator)
            .with_source(CertificateSource::CertIssuer);
        assert_eq!(ctx.source, CertificateSource::SignerCert);
        assert_eq!(issuer_ctx.source, CertificateSource::CertIssuer);
        assert_eq!(issuer_ctx.time_based, TimeBasedContext::Present);
        assert_eq!(
            issuer_ctx.with_time_based(TimeBasedContext::Historical).time_based,
            TimeBasedContext::Historical
        );
    }

    #[test]
    fn test_trust_purpose_per_role() {
        assert_eq!(CertificateSource::SignerCert.trust_purpose(), None);
        assert_eq!(
            CertificateSource::OcspIssuer.trust_purpose(),
            Some(TrustPurpose::Ocsp)
        );
        assert_eq!(
            CertificateSource::Timestamp.trust_purpose(),
            Some(TrustPurpose::Timestamp)
        );
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&CertificateSource::CrlIssuer).unwrap(),
            "\"CRL_ISSUER\""
        );
        assert_eq!(
            serde_json::to_string(&ValidatorContext::OcspValidator).unwrap(),
            "\"OCSP_VALIDATOR\""
        );
    }
}
