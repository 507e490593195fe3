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
use crate::trust_store::TrustPurpose;
use crate::types::bundle::ValidationData;
use crate::types::certificate::{Certificate, CertificateId};
use crate::types::revocation::{CertId, CertStatus, OcspResponse};

const CHECK: &str = "OCSP response check";

/// Evaluates OCSP responses about one certificate.
pub struct OcspValidator<'a> {
    builder: &'a ValidatorChainBuilder,
    data: &'a ValidationData,
}

impl<'a> OcspValidator<'a> {
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
        let ctx = ctx.with_validator(ValidatorContext::OcspValidator);
        let mut rejected = ValidationReport::new();

        let cert_id = match CertId::new(cert, issuer) {
            Ok(id) => id,
            Err(e) => {
                rejected.indeterminate(
                    CHECK,
                    cert,
                    format!("cannot build OCSP certificate id: {}", e),
                );
                return finish_search(CHECK, cert, None, rejected, "no usable OCSP response");
            }
        };

        let mut embedded: Vec<OcspResponse> = self.data.ocsp_responses_for(cert).cloned().collect();
        embedded.sort_by(|a, b| b.produced_at.cmp(&a.produced_at));

        let fetching = self.builder.properties().online_fetching(&ctx);
        let evaluate = |response: &OcspResponse| {
            self.check_response(response, cert, issuer, &cert_id, ctx, check_time, visited)
        };

        let mut found = None;
        if fetching != OnlineFetching::AlwaysFetch {
            found = first_conclusive(&embedded, &mut rejected, evaluate);
        }
        if found.is_none() && fetching != OnlineFetching::NeverFetch {
            let mut candidates = self.fetch_response(cert, &cert_id, &mut rejected);
            if fetching == OnlineFetching::AlwaysFetch {
                for response in embedded {
                    if !candidates.contains(&response) {
                        candidates.push(response);
                    }
                }
                candidates.sort_by(|a, b| b.produced_at.cmp(&a.produced_at));
            }
            found = first_conclusive(&candidates, &mut rejected, evaluate);
        }

        finish_search(CHECK, cert, found, rejected, "no usable OCSP response")
    }

    fn fetch_response(
        &self,
        cert: &Certificate,
        cert_id: &CertId,
        rejected: &mut ValidationReport,
    ) -> Vec<OcspResponse> {
        let responder = match &cert.ocsp_url {
            Some(url) => url,
            None => {
                rejected.indeterminate(CHECK, cert, "certificate names no OCSP responder");
                return Vec::new();
            }
        };
        let url = cert_id.request_url(responder);
        let timeout = self.builder.properties().fetch_timeout();
        match fetch_json::<OcspResponse>(self.builder.retriever(), &url, timeout) {
            Ok(response) => {
                debug!(%url, produced_at = %response.produced_at, "OCSP response fetched");
                vec![response]
            }
            Err(e) => {
                let failure = if e.is_transient() {
                    "OCSP responder unreachable"
                } else {
                    "malformed OCSP response"
                };
                warn!(%url, error = %e, "{}", failure);
                rejected.indeterminate(CHECK, cert, format!("{} at {}: {}", failure, url, e));
                Vec::new()
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn check_response(
        &self,
        response: &OcspResponse,
        cert: &Certificate,
        issuer: &Certificate,
        cert_id: &CertId,
        ctx: ValidationContext,
        check_time: DateTime<Utc>,
        visited: &BTreeSet<CertificateId>,
    ) -> EvidenceOutcome {
        let mut report = ValidationReport::new();

        let single = match response.find_response(cert_id) {
            Some(single) => single,
            None => {
                report.indeterminate(CHECK, cert, "OCSP response does not cover the certificate");
                return Err(report);
            }
        };

        let freshness = self.builder.properties().freshness(&ctx);
        if is_stale(response.produced_at, check_time, freshness) {
            report.indeterminate(
                CHECK,
                cert,
                format!(
                    "OCSP response produced at {} is outside the freshness window of {}s before {}",
                    response.produced_at,
                    freshness.num_seconds(),
                    check_time
                ),
            );
            return Err(report);
        }

        if !self.responder_authorized(&mut report, response, cert, issuer, ctx, visited) {
            return Err(report);
        }

        match &single.cert_status {
            CertStatus::Good => {
                report.info(
                    CHECK,
                    cert,
                    format!("good according to OCSP response produced at {}", response.produced_at),
                );
                Ok((RevocationStatus::NotRevoked, report))
            }
            CertStatus::Revoked {
                revocation_time,
                reason,
            } if *revocation_time <= check_time => {
                report.invalid(
                    CHECK,
                    cert,
                    format!("revoked at {} ({:?}) according to OCSP", revocation_time, reason),
                );
                Ok((RevocationStatus::Revoked, report))
            }
            CertStatus::Revoked {
                revocation_time, ..
            } => {
                report.info(
                    CHECK,
                    cert,
                    format!(
                        "revoked at {}, after the check time {}",
                        revocation_time, check_time
                    ),
                );
                Ok((RevocationStatus::NotRevoked, report))
            }
            CertStatus::Unknown => {
                report.indeterminate(CHECK, cert, "OCSP responder does not know the certificate");
                Err(report)
            }
        }
    }

    /// The response is signed by the issuing CA, a trusted responder, or a
    /// responder the CA delegated to whose chain validates at production time.
    fn responder_authorized(
        &self,
        report: &mut ValidationReport,
        response: &OcspResponse,
        cert: &Certificate,
        issuer: &Certificate,
        ctx: ValidationContext,
        visited: &BTreeSet<CertificateId>,
    ) -> bool {
        let responders = self
            .builder
            .issuer_retriever()
            .retrieve_ocsp_responder_certificates(response, Some(issuer), self.data);
        if responders.is_empty() {
            report.indeterminate(CHECK, cert, "OCSP response signer not found");
            return false;
        }

        let store = self.builder.trust_store();
        for responder in &responders {
            if responder == issuer {
                return true;
            }
            if responder == cert {
                report.indeterminate(
                    CHECK,
                    cert,
                    "OCSP response is signed by the certificate it covers",
                );
                continue;
            }
            let trusted = store.is_trusted_for(TrustPurpose::Ocsp, responder)
                || store.is_generally_trusted(responder);
            let delegated = responder.issuer == issuer.subject && responder.is_signed_by(issuer);
            if !trusted && !delegated {
                report.indeterminate(
                    CHECK,
                    responder,
                    "OCSP responder is neither trusted nor authorized by the issuing CA",
                );
                continue;
            }

            let responder_report = CertificateChainValidator::new(self.builder, self.data)
                .validate_from(
                    ctx.with_source(CertificateSource::OcspIssuer),
                    responder,
                    response.produced_at,
                    visited.clone(),
                );
            let valid = responder_report.is_valid();
            report.merge_downgraded(responder_report);
            if valid {
                return true;
            }
            report.indeterminate(CHECK, responder, "OCSP responder certificate is not trusted");
        }
        false
    }
}
