//! Resolution of issuer and evidence-signer certificates.
//!
//! Candidates come from the trust store, from validation data embedded in the
//! document and, for certificate issuers, from the certificate's CA-issuers
//! URL. A failed lookup is a normal "chain incomplete" signal, never an error.

use std::time::Duration;

use tracing::{debug, warn};

use crate::retriever::{fetch_json, Retriever};
use crate::trust_store::TrustedCertificatesStore;
use crate::types::bundle::ValidationData;
use crate::types::certificate::Certificate;
use crate::types::revocation::{Crl, OcspResponse, ResponderId};

pub struct IssuingCertificateRetriever<'a> {
    trust_store: &'a TrustedCertificatesStore,
    retriever: &'a dyn Retriever,
    timeout: Duration,
}

fn push_unique(out: &mut Vec<Certificate>, cert: &Certificate) {
    if !out.contains(cert) {
        out.push(cert.clone());
    }
}

impl<'a> IssuingCertificateRetriever<'a> {
    pub fn new(
        trust_store: &'a TrustedCertificatesStore,
        retriever: &'a dyn Retriever,
        timeout: Duration,
    ) -> Self {
        Self {
            trust_store,
            retriever,
            timeout,
        }
    }

    /// Certificates that may have issued `cert`, trust anchors first.
    ///
    /// The CA-issuers URL is only fetched when no locally known candidate
    /// verifies `cert`'s signature.
    pub fn retrieve_issuer_candidates(
        &self,
        cert: &Certificate,
        data: &ValidationData,
    ) -> Vec<Certificate> {
        let mut candidates = Vec::new();
        for known in self.trust_store.all_known_certificates(&cert.issuer) {
            push_unique(&mut candidates, known);
        }
        for embedded in data.certificates_for_subject(&cert.issuer) {
            push_unique(&mut candidates, embedded);
        }
        candidates.retain(|c| cert.key_identifier_matches(c));

        if !candidates.iter().any(|c| cert.is_signed_by(c)) {
            if let Some(fetched) = self.fetch_ca_issuer(cert) {
                push_unique(&mut candidates, &fetched);
            }
        }
        candidates
    }

    /// The first candidate whose key verifies `cert`'s signature.
    pub fn retrieve_issuer(
        &self,
        cert: &Certificate,
        data: &ValidationData,
    ) -> Option<Certificate> {
        self.retrieve_issuer_candidates(cert, data)
            .into_iter()
            .find(|c| cert.is_signed_by(c))
    }

    fn fetch_ca_issuer(&self, cert: &Certificate) -> Option<Certificate> {
        let url = cert.ca_issuers_url.as_deref()?;
        match fetch_json::<Certificate>(self.retriever, url, self.timeout) {
            Ok(fetched)
                if fetched.subject == cert.issuer && cert.key_identifier_matches(&fetched) =>
            {
                debug!(%url, subject = %fetched.subject, "issuer certificate fetched");
                Some(fetched)
            }
            Ok(fetched) => {
                warn!(
                    %url,
                    subject = %fetched.subject,
                    expected = %cert.issuer,
                    "fetched certificate is not the issuer"
                );
                None
            }
            Err(e) if e.is_transient() => {
                warn!(%url, error = %e, "issuer certificate fetch failed");
                None
            }
            Err(e) => {
                warn!(%url, error = %e, "fetched issuer certificate is malformed");
                None
            }
        }
    }

    /// Certificates that signed `response`.
    ///
    /// Candidates are the certificates shipped in the response, embedded
    /// validation data and the trust store, matched by responder name or key
    /// hash. `issuer` is the issuer of the certificate under check and is
    /// considered too, as the CA may sign its own responses. Empty when no
    /// candidate verifies the signature.
    pub fn retrieve_ocsp_responder_certificates(
        &self,
        response: &OcspResponse,
        issuer: Option<&Certificate>,
        data: &ValidationData,
    ) -> Vec<Certificate> {
        let pool = response
            .certs
            .iter()
            .chain(data.certificates.iter())
            .chain(issuer)
            .chain(self.trust_store.all_certificates());

        let mut responders = Vec::new();
        for candidate in pool {
            let named = match &response.responder_id {
                ResponderId::ByName(name) => &candidate.subject == name,
                ResponderId::ByKey(hash) => candidate
                    .key_hash()
                    .map_or(false, |h| h.eq_ignore_ascii_case(hash)),
            };
            if named && response.is_signed_by(candidate) {
                push_unique(&mut responders, candidate);
            }
        }
        if responders.is_empty() {
            debug!(responder = ?response.responder_id, "no certificate verifies OCSP response");
        }
        responders
    }

    /// Certificates that signed `crl`, from the trust store and embedded data.
    pub fn retrieve_crl_issuer_certificates(
        &self,
        crl: &Crl,
        data: &ValidationData,
    ) -> Vec<Certificate> {
        let pool = self
            .trust_store
            .all_known_certificates(&crl.issuer)
            .into_iter()
            .chain(data.certificates_for_subject(&crl.issuer));

        let mut issuers = Vec::new();
        for candidate in pool {
            let key_matches = match (&crl.authority_key_id, &candidate.subject_key_id) {
                (Some(aki), Some(ski)) => aki.eq_ignore_ascii_case(ski),
                _ => true,
            };
            if key_matches && crl.is_signed_by(candidate) {
                push_unique(&mut issuers, candidate);
            }
        }
        if issuers.is_empty() {
            debug!(issuer = %crl.issuer, "no certificate verifies CRL");
        }
        issuers
    }
}
