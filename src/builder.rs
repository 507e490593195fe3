use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::chain::CertificateChainValidator;
use crate::issuer::IssuingCertificateRetriever;
use crate::properties::SignatureValidationProperties;
use crate::retriever::{InMemoryRetriever, Retriever};
use crate::revocation::{CrlValidator, OcspValidator, RevocationDataValidator};
use crate::signature::{EcdsaIntegrityVerifier, IntegrityVerifier, SignatureValidator};
use crate::trust_store::TrustedCertificatesStore;
use crate::types::bundle::ValidationData;

/// Shared configuration for one family of validators.
///
/// Holds the trust store, policy table, network retriever, integrity
/// verifier and an optional fixed clock. Validators borrow the builder, so
/// the trust store stays read-only for the duration of a run.
pub struct ValidatorChainBuilder {
    properties: SignatureValidationProperties,
    trust_store: TrustedCertificatesStore,
    retriever: Arc<dyn Retriever>,
    integrity_verifier: Arc<dyn IntegrityVerifier>,
    current_time: Option<DateTime<Utc>>,
}

impl Default for ValidatorChainBuilder {
    fn default() -> Self {
        Self {
            properties: SignatureValidationProperties::default(),
            trust_store: TrustedCertificatesStore::new(),
            retriever: Arc::new(InMemoryRetriever::new()),
            integrity_verifier: Arc::new(EcdsaIntegrityVerifier),
            current_time: None,
        }
    }
}

impl ValidatorChainBuilder {
    /// Offline defaults: empty trust store, no network, default policy.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties(mut self, properties: SignatureValidationProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_trust_store(mut self, trust_store: TrustedCertificatesStore) -> Self {
        self.trust_store = trust_store;
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_integrity_verifier(mut self, verifier: Arc<dyn IntegrityVerifier>) -> Self {
        self.integrity_verifier = verifier;
        self
    }

    /// Pin "now" to `time` instead of the system clock.
    pub fn with_current_time(mut self, time: DateTime<Utc>) -> Self {
        self.current_time = Some(time);
        self
    }

    pub fn properties(&self) -> &SignatureValidationProperties {
        &self.properties
    }

    pub fn trust_store(&self) -> &TrustedCertificatesStore {
        &self.trust_store
    }

    pub fn retriever(&self) -> &dyn Retriever {
        self.retriever.as_ref()
    }

    pub fn integrity_verifier(&self) -> &dyn IntegrityVerifier {
        self.integrity_verifier.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.current_time.unwrap_or_else(Utc::now)
    }

    pub fn issuer_retriever(&self) -> IssuingCertificateRetriever<'_> {
        IssuingCertificateRetriever::new(
            &self.trust_store,
            self.retriever.as_ref(),
            self.properties.fetch_timeout(),
        )
    }

    pub fn build_certificate_chain_validator<'a>(
        &'a self,
        data: &'a ValidationData,
    ) -> CertificateChainValidator<'a> {
        CertificateChainValidator::new(self, data)
    }

    pub fn build_revocation_data_validator<'a>(
        &'a self,
        data: &'a ValidationData,
    ) -> RevocationDataValidator<'a> {
        RevocationDataValidator::new(self, data)
    }

    pub fn build_ocsp_validator<'a>(&'a self, data: &'a ValidationData) -> OcspValidator<'a> {
        OcspValidator::new(self, data)
    }

    pub fn build_crl_validator<'a>(&'a self, data: &'a ValidationData) -> CrlValidator<'a> {
        CrlValidator::new(self, data)
    }

    pub fn build_signature_validator(&self) -> SignatureValidator<'_> {
        SignatureValidator::new(self)
    }
}
