use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{finish_search, first_conclusive, is_stale, EvidenceOutcome, RevocationStatus};
use crate::builder::ValidatorChainBuilder;
use crate::chain::CertificateChainValidator;
use crate::context::{CertificateSource, ValidationContext, ValidatorContext};
use crate::properties::OnlineFetching;
use crate::report::ValidationReport;
use crate::retriever::fetch_json;
use crate::types::bundle::ValidationData;
use crate::types::certificate::{Certificate, CertificateId, KeyUsage};
use crate::types::revocation::Crl;

const CHECK: &str = "CRL check";

/// Evaluates CRLs about one certificate.
pub struct CrlValidator<'a> {
    builder: &'a ValidatorChainBuilder,
    data: &'a ValidationData,
}

impl<'a> CrlValidator<'a> {
    pub fn new(builder: &'a ValidatorChainBuilder, data: &'a ValidationData) -> Self {
        Self { builder, data }
    }

    pub fn validate(
        &self,
        ctx: ValidationContext,
        cert: &Certificate,
        issuer: &Certificate,
        check_time: DateTime<Utc>,
        visited: &BTreeSet<CertificateId>,
    ) -> (RevocationStatus, ValidationReport) {
        let ctx = ctx.with_validator(ValidatorContext::CrlValidator);
        let mut rejected = ValidationReport::new();

        let mut embedded: Vec<Crl> = self.data.crls_for(cert).cloned().collect();
        embedded.sort_by(|a, b| b.this_update.cmp(&a.this_update));

        let fetching = self.builder.properties().online_fetching(&ctx);
        let evaluate = |crl: &Crl| self.check_crl(crl, cert, issuer, ctx, check_time, visited);

        let mut found = None;
        if fetching != OnlineFetching::AlwaysFetch {
            found = first_conclusive(&embedded, &mut rejected, evaluate);
        }
        if found.is_none() && fetching != OnlineFetching::NeverFetch {
            let mut candidates = self.fetch_crls(cert, &mut rejected);
            if fetching == OnlineFetching::AlwaysFetch {
                for crl in embedded {
                    if !candidates.contains(&crl) {
                        candidates.push(crl);
                    }
                }
                candidates.sort_by(|a, b| b.this_update.cmp(&a.this_update));
            }
            found = first_conclusive(&candidates, &mut rejected, evaluate);
        }

        finish_search(CHECK, cert, found, rejected, "no usable CRL")
    }

    fn fetch_crls(&self, cert: &Certificate, rejected: &mut ValidationReport) -> Vec<Crl> {
        if cert.crl_urls.is_empty() {
            rejected.indeterminate(CHECK, cert, "certificate names no CRL distribution point");
            return Vec::new();
        }
        let timeout = self.builder.properties().fetch_timeout();
        let mut crls = Vec::new();
        for url in &cert.crl_urls {
            match fetch_json::<Crl>(self.builder.retriever(), url, timeout) {
                Ok(crl) => {
                    debug!(%url, this_update = %crl.this_update, "CRL fetched");
                    crls.push(crl);
                }
                Err(e) => {
                    let failure = if e.is_transient() {
                        "CRL distribution point unreachable"
                    } else {
                        "malformed CRL"
                    };
                    warn!(%url, error = %e, "{}", failure);
                    rejected.indeterminate(CHECK, cert, format!("{} at {}: {}", failure, url, e));
                }
            }
        }
        crls
    }

    fn check_crl(
        &self,
        crl: &Crl,
        cert: &Certificate,
        issuer: &Certificate,
        ctx: ValidationContext,
        check_time: DateTime<Utc>,
        visited: &BTreeSet<CertificateId>,
    ) -> EvidenceOutcome {
        let mut report = ValidationReport::new();

        if crl.issuer != cert.issuer {
            report.indeterminate(
                CHECK,
                cert,
                format!(
                    "CRL issued by {} does not cover certificates of {}",
                    crl.issuer, cert.issuer
                ),
            );
            return Err(report);
        }

        let freshness = self.builder.properties().freshness(&ctx);
        if is_stale(crl.this_update, check_time, freshness) {
            report.indeterminate(
                CHECK,
                cert,
                format!(
                    "CRL issued at {} is outside the freshness window of {}s before {}",
                    crl.this_update,
                    freshness.num_seconds(),
                    check_time
                ),
            );
            return Err(report);
        }

        if !self.crl_issuer_authorized(&mut report, crl, cert, issuer, ctx, visited) {
            return Err(report);
        }

        match crl.find_revoked(&cert.serial_number) {
            Some(entry) if entry.revocation_date <= check_time => {
                report.invalid(
                    CHECK,
                    cert,
                    format!(
                        "revoked at {} ({:?}) according to CRL issued at {}",
                        entry.revocation_date, entry.reason, crl.this_update
                    ),
                );
                Ok((RevocationStatus::Revoked, report))
            }
            Some(entry) => {
                report.info(
                    CHECK,
                    cert,
                    format!(
                        "revoked at {}, after the check time {}",
                        entry.revocation_date, check_time
                    ),
                );
                Ok((RevocationStatus::NotRevoked, report))
            }
            None => {
                report.info(
                    CHECK,
                    cert,
                    format!("not listed on CRL issued at {}", crl.this_update),
                );
                Ok((RevocationStatus::NotRevoked, report))
            }
        }
    }

    fn crl_issuer_authorized(
        &self,
        report: &mut ValidationReport,
        crl: &Crl,
        cert: &Certificate,
        issuer: &Certificate,
        ctx: ValidationContext,
        visited: &BTreeSet<CertificateId>,
    ) -> bool {
        if crl.is_signed_by(issuer) {
            let check_extensions = self.builder.properties().check_required_extensions(&ctx);
            if check_extensions && !issuer.has_key_usage(KeyUsage::CrlSign) {
                report.indeterminate(CHECK, issuer, "issuing CA lacks the cRLSign key usage");
                return false;
            }
            return true;
        }

        let signers = self
            .builder
            .issuer_retriever()
            .retrieve_crl_issuer_certificates(crl, self.data);
        if signers.is_empty() {
            report.indeterminate(CHECK, cert, "CRL signer not found");
            return false;
        }

        for signer in &signers {
            if signer == cert {
                report.indeterminate(CHECK, cert, "CRL is signed by the certificate it covers");
                continue;
            }
            let signer_report = CertificateChainValidator::new(self.builder, self.data)
                .validate_from(
                    ctx.with_source(CertificateSource::CrlIssuer),
                    signer,
                    crl.this_update,
                    visited.clone(),
                );
            let valid = signer_report.is_valid();
            report.merge_downgraded(signer_report);
            if valid {
                return true;
            }
            report.indeterminate(CHECK, signer, "CRL issuer certificate is not trusted");
        }
        false
    }
}
