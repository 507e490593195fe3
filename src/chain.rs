//! Certificate chain walk.
//!
//! The walk is a loop over [`WalkState`]. Each hop checks trust, validity,
//! required extensions and the issuer signature, then revocation of the
//! current certificate, and moves to the issuer in the CA-issuer role. A set
//! of visited certificate ids rejects cycles.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::builder::ValidatorChainBuilder;
use crate::context::{CertificateSource, ValidationContext, ValidatorContext};
use crate::issuer::IssuingCertificateRetriever;
use crate::report::{ValidationReport, ValidationResult};
use crate::revocation::{RevocationDataValidator, RevocationStatus};
use crate::trust_store::TrustPurpose;
use crate::types::bundle::ValidationData;
use crate::types::certificate::{Certificate, CertificateId, ExtendedKeyUsage, KeyUsage};

const CHECK: &str = "Certificate check";

/// Outcome of one chain walk.
#[derive(Debug, Clone)]
pub struct ChainValidation {
    pub report: ValidationReport,
    /// Certificates visited, leaf first.
    pub path: Vec<Certificate>,
    /// The walk ended at a trust anchor.
    pub trusted: bool,
}

enum WalkState {
    Resolving,
    CheckingRevocation(Certificate),
    Trusted,
    Untrusted,
}

pub struct CertificateChainValidator<'a> {
    builder: &'a ValidatorChainBuilder,
    data: &'a ValidationData,
}

/// Extension `cert` lacks for `source`, if any.
fn missing_extension(cert: &Certificate, source: CertificateSource) -> Option<&'static str> {
    match source {
        CertificateSource::CertIssuer if !cert.is_ca => Some("CA basic constraint"),
        CertificateSource::CertIssuer if !cert.has_key_usage(KeyUsage::KeyCertSign) => {
            Some("keyCertSign key usage")
        }
        CertificateSource::CrlIssuer if !cert.has_key_usage(KeyUsage::CrlSign) => {
            Some("cRLSign key usage")
        }
        CertificateSource::OcspIssuer
            if !cert.has_extended_key_usage(ExtendedKeyUsage::OcspSigning) =>
        {
            Some("OCSPSigning extended key usage")
        }
        CertificateSource::Timestamp
            if !cert.has_extended_key_usage(ExtendedKeyUsage::TimeStamping) =>
        {
            Some("timeStamping extended key usage")
        }
        _ => None,
    }
}

impl<'a> CertificateChainValidator<'a> {
    pub fn new(builder: &'a ValidatorChainBuilder, data: &'a ValidationData) -> Self {
        Self { builder, data }
    }

    /// Validate `cert` in the role given by `ctx` at `check_time`.
    pub fn validate(
        &self,
        ctx: ValidationContext,
        cert: &Certificate,
        check_time: DateTime<Utc>,
    ) -> ValidationReport {
        self.validate_with_path(ctx, cert, check_time).report
    }

    /// Like [`validate`](Self::validate), also returning the walked path.
    pub fn validate_with_path(
        &self,
        ctx: ValidationContext,
        cert: &Certificate,
        check_time: DateTime<Utc>,
    ) -> ChainValidation {
        self.walk(ctx, cert, check_time, BTreeSet::new())
    }

    /// Validate an evidence signer inside an enclosing walk that already
    /// visited `visited`.
    pub(crate) fn validate_from(
        &self,
        ctx: ValidationContext,
        cert: &Certificate,
        check_time: DateTime<Utc>,
        visited: BTreeSet<CertificateId>,
    ) -> ValidationReport {
        self.walk(ctx, cert, check_time, visited).report
    }

    fn stop_validation(&self, ctx: &ValidationContext, report: &ValidationReport) -> bool {
        !self.builder.properties().continue_after_failure(ctx)
            && report.result() != ValidationResult::Valid
    }

    fn walk(
        &self,
        ctx: ValidationContext,
        cert: &Certificate,
        check_time: DateTime<Utc>,
        mut visited: BTreeSet<CertificateId>,
    ) -> ChainValidation {
        let properties = self.builder.properties();
        let store = self.builder.trust_store();
        let issuers = self.builder.issuer_retriever();

        let mut ctx = ctx.with_validator(ValidatorContext::CertificateChainValidator);
        let mut report = ValidationReport::new();
        let mut path: Vec<Certificate> = Vec::new();
        let mut current = cert.clone();
        let mut state = WalkState::Resolving;

        loop {
            state = match state {
                WalkState::Resolving => {
                    path.push(current.clone());
                    if !visited.insert(current.id()) {
                        report.invalid(
                            CHECK,
                            &current,
                            format!("circular certificate chain through {}", current),
                        );
                        state = WalkState::Untrusted;
                        continue;
                    }

                    let purposes = store.purposes_for(&current);
                    let trusted_here = purposes.contains(&TrustPurpose::General)
                        || ctx
                            .source
                            .trust_purpose()
                            .map_or(false, |p| purposes.contains(&p));

                    if trusted_here {
                        if properties.check_trust_anchor_expiry(&ctx)
                            && !current.is_valid_at(check_time)
                        {
                            report.invalid(
                                CHECK,
                                &current,
                                format!(
                                    "trusted certificate is not valid at {} (valid {} to {})",
                                    check_time, current.not_before, current.not_after
                                ),
                            );
                            WalkState::Untrusted
                        } else {
                            report.info(CHECK, &current, "trusted certificate, no further checks");
                            WalkState::Trusted
                        }
                    } else {
                        if !purposes.is_empty() {
                            report.info(
                                CHECK,
                                &current,
                                format!("trusted for {:?}, not in this context", purposes),
                            );
                        }
                        self.resolve(&mut report, ctx, &current, check_time, &visited, &issuers)
                    }
                }
                WalkState::CheckingRevocation(issuer) => {
                    let status = RevocationDataValidator::new(self.builder, self.data).validate(
                        &mut report,
                        ctx,
                        &current,
                        &issuer,
                        check_time,
                        &visited,
                    );
                    if status == RevocationStatus::Revoked || self.stop_validation(&ctx, &report) {
                        WalkState::Untrusted
                    } else {
                        current = issuer;
                        ctx = ctx.with_source(CertificateSource::CertIssuer);
                        WalkState::Resolving
                    }
                }
                WalkState::Trusted => {
                    debug!(certificate = %cert, anchor = %current, "chain ends at trust anchor");
                    return ChainValidation {
                        report,
                        path,
                        trusted: true,
                    };
                }
                WalkState::Untrusted => {
                    debug!(
                        certificate = %cert,
                        at = %current,
                        result = %report.result(),
                        "chain walk stopped"
                    );
                    return ChainValidation {
                        report,
                        path,
                        trusted: false,
                    };
                }
            };
        }
    }

    /// Checks for an untrusted certificate up to issuer resolution.
    fn resolve(
        &self,
        report: &mut ValidationReport,
        ctx: ValidationContext,
        current: &Certificate,
        check_time: DateTime<Utc>,
        visited: &BTreeSet<CertificateId>,
        issuers: &IssuingCertificateRetriever<'_>,
    ) -> WalkState {
        let properties = self.builder.properties();

        if !current.is_valid_at(check_time) {
            report.invalid(
                CHECK,
                current,
                format!(
                    "certificate is not valid at {} (valid {} to {})",
                    check_time, current.not_before, current.not_after
                ),
            );
            if self.stop_validation(&ctx, report) {
                return WalkState::Untrusted;
            }
        }

        if properties.check_required_extensions(&ctx) {
            if let Some(missing) = missing_extension(current, ctx.source) {
                report.invalid(
                    CHECK,
                    current,
                    format!("required {} missing for role {:?}", missing, ctx.source),
                );
                if self.stop_validation(&ctx, report) {
                    return WalkState::Untrusted;
                }
            }
        }

        if current.is_self_issued() {
            report.indeterminate(CHECK, current, "self-issued certificate is not trusted");
            return WalkState::Untrusted;
        }

        let candidates = issuers.retrieve_issuer_candidates(current, self.data);
        if candidates.is_empty() {
            report.indeterminate(CHECK, current, "no trust anchor or issuer found");
            return WalkState::Untrusted;
        }

        match candidates.into_iter().find(|c| current.is_signed_by(c)) {
            None => {
                report.invalid(CHECK, current, "certificate is not signed by issuer");
                WalkState::Untrusted
            }
            Some(issuer) if visited.contains(&issuer.id()) => {
                report.invalid(
                    CHECK,
                    current,
                    format!("circular certificate chain through {}", issuer),
                );
                WalkState::Untrusted
            }
            Some(issuer) => WalkState::CheckingRevocation(issuer),
        }
    }
}
