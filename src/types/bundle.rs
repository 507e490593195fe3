use serde::{Deserialize, Serialize};

use super::certificate::Certificate;
use super::revocation::{Crl, OcspResponse};

/// Long-term validation material shipped with a document or signature:
/// extra certificates and revocation evidence captured earlier.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationData {
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    #[serde(default)]
    pub ocsp_responses: Vec<OcspResponse>,
    #[serde(default)]
    pub crls: Vec<Crl>,
}

impl ValidationData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty() && self.ocsp_responses.is_empty() && self.crls.is_empty()
    }

    /// Append everything from `other`, skipping exact duplicates.
    pub fn extend(&mut self, other: &ValidationData) {
        for cert in &other.certificates {
            if !self.certificates.contains(cert) {
                self.certificates.push(cert.clone());
            }
        }
        for response in &other.ocsp_responses {
            if !self.ocsp_responses.contains(response) {
                self.ocsp_responses.push(response.clone());
            }
        }
        for crl in &other.crls {
            if !self.crls.contains(crl) {
                self.crls.push(crl.clone());
            }
        }
    }

    /// Embedded certificates with the given subject.
    pub fn certificates_for_subject<'a>(
        &'a self,
        subject: &'a str,
    ) -> impl Iterator<Item = &'a Certificate> + 'a {
        self.certificates.iter().filter(move |c| c.subject == subject)
    }

    /// Embedded OCSP responses that speak about `cert`.
    pub fn ocsp_responses_for<'a>(
        &'a self,
        cert: &'a Certificate,
    ) -> impl Iterator<Item = &'a OcspResponse> + 'a {
        self.ocsp_responses
            .iter()
            .filter(move |r| r.covers(&cert.issuer, &cert.serial_number))
    }

    /// Embedded CRLs issued under `cert`'s issuer name.
    pub fn crls_for<'a>(&'a self, cert: &'a Certificate) -> impl Iterator<Item = &'a Crl> + 'a {
        self.crls.iter().filter(move |crl| crl.issuer == cert.issuer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, TestPki};

    #[test]
    fn test_validation_data_serde_defaults() {
        let data: ValidationData = serde_json::from_str("{}").unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_extend_skips_duplicates() {
        let pki = TestPki::new();
        let mut data = ValidationData::new();
        data.certificates.push(pki.intermediate.clone());

        let mut other = ValidationData::new();
        other.certificates.push(pki.intermediate.clone());
        other.certificates.push(pki.root.clone());
        other.crls.push(pki.crl_empty(&pki.intermediate, at(2025, 1, 1)));

        data.extend(&other);
        data.extend(&other);
        assert_eq!(data.certificates.len(), 2);
        assert_eq!(data.crls.len(), 1);
    }

    #[test]
    fn test_lookup_helpers() {
        let pki = TestPki::new();
        let mut data = ValidationData::new();
        data.certificates.push(pki.intermediate.clone());
        data.ocsp_responses.push(pki.ocsp_good(&pki.leaf, at(2025, 6, 1)));
        data.crls.push(pki.crl_empty(&pki.root, at(2025, 1, 1)));

        assert_eq!(data.certificates_for_subject("CN=Test Intermediate CA").count(), 1);
        assert_eq!(data.ocsp_responses_for(&pki.leaf).count(), 1);
        assert_eq!(data.ocsp_responses_for(&pki.intermediate).count(), 0);
        assert_eq!(data.crls_for(&pki.intermediate).count(), 1);
        assert_eq!(data.crls_for(&pki.leaf).count(), 0);
    }
}
