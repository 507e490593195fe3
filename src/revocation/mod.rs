//! Revocation checking for a single certificate.
//!
//! [`RevocationDataValidator`] consults OCSP first and falls back to CRLs as
//! allowed by [`RevocationSources`](crate::properties::RevocationSources).
//! Each source validator tries embedded and fetched evidence, newest first,
//! until one item is conclusive.

pub mod crl;
pub mod ocsp;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::builder::ValidatorChainBuilder;
use crate::context::{CertificateSource, ValidationContext, ValidatorContext};
use crate::report::{ReportItem, ReportItemStatus, ValidationReport};
use crate::types::bundle::ValidationData;
use crate::types::certificate::{Certificate, CertificateId};

pub use crl::CrlValidator;
pub use ocsp::OcspValidator;

const CHECK: &str = "Revocation data check";

/// Verdict about one certificate's revocation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationStatus {
    /// Not revoked at the check time. Includes revocations dated after it.
    NotRevoked,
    /// Revoked at or before the check time.
    Revoked,
    /// No usable evidence.
    Undetermined,
}

impl RevocationStatus {
    pub fn is_conclusive(self) -> bool {
        self != RevocationStatus::Undetermined
    }
}

/// Evidence item outcome: conclusive status with its findings, or the
/// reasons the item was rejected.
pub(crate) type EvidenceOutcome = Result<(RevocationStatus, ValidationReport), ValidationReport>;

/// Try `evidence` in order and return the first conclusive outcome. Reports of
/// rejected items are collected in `rejected`.
pub(crate) fn first_conclusive<E>(
    evidence: &[E],
    rejected: &mut ValidationReport,
    mut check: impl FnMut(&E) -> EvidenceOutcome,
) -> Option<(RevocationStatus, ValidationReport)> {
    for item in evidence {
        match check(item) {
            Ok(found) => return Some(found),
            Err(report) => rejected.merge(report),
        }
    }
    None
}

/// Close a source search. A conclusive result keeps the rejected attempts as
/// INFO; otherwise they stay as findings next to a final INDETERMINATE.
pub(crate) fn finish_search(
    check: &str,
    cert: &Certificate,
    found: Option<(RevocationStatus, ValidationReport)>,
    rejected: ValidationReport,
    missing: &str,
) -> (RevocationStatus, ValidationReport) {
    let mut report = ValidationReport::new();
    match found {
        Some((status, evidence_report)) => {
            report.merge_as_info(rejected);
            report.merge(evidence_report);
            (status, report)
        }
        None => {
            report.merge(rejected);
            report.indeterminate(check, cert, missing);
            (RevocationStatus::Undetermined, report)
        }
    }
}

/// `produced` lies before the freshness window ending at `check_time`.
pub(crate) fn is_stale(
    produced: DateTime<Utc>,
    check_time: DateTime<Utc>,
    freshness: chrono::Duration,
) -> bool {
    check_time
        .checked_sub_signed(freshness)
        .map_or(false, |earliest| produced < earliest)
}

pub struct RevocationDataValidator<'a> {
    builder: &'a ValidatorChainBuilder,
    data: &'a ValidationData,
}

impl<'a> RevocationDataValidator<'a> {
    pub fn new(builder: &'a ValidatorChainBuilder, data: &'a ValidationData) -> Self {
        Self { builder, data }
    }

    /// Check `cert`, issued by `issuer`, at `check_time`.
    ///
    /// Findings go to `report`. `visited` holds the certificates of the
    /// enclosing chain walk; evidence signers are validated on a copy of it.
    pub fn validate(
        &self,
        report: &mut ValidationReport,
        ctx: ValidationContext,
        cert: &Certificate,
        issuer: &Certificate,
        check_time: DateTime<Utc>,
        visited: &BTreeSet<CertificateId>,
    ) -> RevocationStatus {
        let ctx = ctx.with_validator(ValidatorContext::RevocationDataValidator);

        if ctx.source == CertificateSource::OcspIssuer && cert.ocsp_no_check {
            report.info(
                CHECK,
                cert,
                "OCSP responder certificate carries ocsp-nocheck, revocation not checked",
            );
            return RevocationStatus::NotRevoked;
        }

        let sources = self.builder.properties().revocation_sources(&ctx);
        let mut attempts = ValidationReport::new();

        if sources.allows_ocsp() {
            let (status, ocsp_report) = OcspValidator::new(self.builder, self.data)
                .validate(ctx, cert, issuer, check_time, visited);
            if status.is_conclusive() {
                report.merge(ocsp_report);
                return status;
            }
            attempts.merge(ocsp_report);
            if sources.allows_crl() {
                attempts.add(ReportItem::for_certificate(
                    CHECK,
                    cert,
                    "no usable OCSP response, falling back to CRL",
                    ReportItemStatus::Info,
                ));
            }
        }

        if sources.allows_crl() {
            let (status, crl_report) = CrlValidator::new(self.builder, self.data)
                .validate(ctx, cert, issuer, check_time, visited);
            if status.is_conclusive() {
                report.merge_as_info(attempts);
                report.merge(crl_report);
                return status;
            }
            attempts.merge(crl_report);
        }

        debug!(certificate = %cert, %check_time, "no usable revocation data");
        report.merge(attempts);
        report.indeterminate(CHECK, cert, "no usable revocation data");
        RevocationStatus::Undetermined
    }
}
