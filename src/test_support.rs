//! Shared fixtures: a small signing PKI with root, intermediate, document
//! signer, delegated OCSP responder and timestamp authority.

use chrono::{DateTime, TimeZone, Utc};

use crate::builder::ValidatorChainBuilder;
use crate::crypto::{self, KeyPair};
use crate::trust_store::{TrustPurpose, TrustedCertificatesStore};
use crate::types::bundle::ValidationData;
use crate::types::certificate::{Certificate, ExtendedKeyUsage, KeyUsage};
use crate::types::document::{SignatureContainer, SignatureEnvelope, TimestampToken};
use crate::types::revocation::{
    CertId, CertStatus, Crl, OcspResponse, ResponderId, RevocationReason, RevokedCertificate,
    SingleResponse,
};

/// Midnight UTC on the given day.
pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

fn key_id(keys: &KeyPair) -> String {
    crypto::key_hash(&keys.public_key_pem).unwrap()
}

fn template(
    serial: &str,
    subject: &str,
    issuer: &str,
    keys: &KeyPair,
    issuer_keys: &KeyPair,
    validity: (DateTime<Utc>, DateTime<Utc>),
) -> Certificate {
    Certificate {
        serial_number: serial.to_string(),
        subject: subject.to_string(),
        issuer: issuer.to_string(),
        not_before: validity.0,
        not_after: validity.1,
        public_key_pem: keys.public_key_pem.clone(),
        subject_key_id: Some(key_id(keys)),
        authority_key_id: Some(key_id(issuer_keys)),
        is_ca: false,
        key_usage: Vec::new(),
        extended_key_usage: Vec::new(),
        ca_issuers_url: None,
        ocsp_url: None,
        crl_urls: Vec::new(),
        ocsp_no_check: false,
        signature: String::new(),
    }
}

fn sign_cert(mut cert: Certificate, keys: &KeyPair) -> Certificate {
    let tbs = cert.to_be_signed().unwrap();
    cert.signature = crypto::sign_data(&keys.private_key_pem, &tbs).unwrap();
    cert
}

pub struct TestPki {
    pub root: Certificate,
    pub intermediate: Certificate,
    pub leaf: Certificate,
    pub responder: Certificate,
    pub tsa: Certificate,
    pub root_keys: KeyPair,
    pub intermediate_keys: KeyPair,
    pub leaf_keys: KeyPair,
    pub responder_keys: KeyPair,
    pub tsa_keys: KeyPair,
    /// Keys no fixture certificate belongs to.
    pub impostor_keys: KeyPair,
}

impl TestPki {
    pub fn new() -> Self {
        let root_keys = crypto::generate_key_pair().unwrap();
        let intermediate_keys = crypto::generate_key_pair().unwrap();
        let leaf_keys = crypto::generate_key_pair().unwrap();
        let responder_keys = crypto::generate_key_pair().unwrap();
        let tsa_keys = crypto::generate_key_pair().unwrap();
        let impostor_keys = crypto::generate_key_pair().unwrap();

        let root_name = "CN=Test Root CA";
        let intermediate_name = "CN=Test Intermediate CA";

        let mut root = template(
            "01",
            root_name,
            root_name,
            &root_keys,
            &root_keys,
            (at(2020, 1, 1), at(2040, 12, 31)),
        );
        root.is_ca = true;
        root.key_usage = vec![KeyUsage::KeyCertSign, KeyUsage::CrlSign];
        let root = sign_cert(root, &root_keys);

        let mut intermediate = template(
            "02",
            intermediate_name,
            root_name,
            &intermediate_keys,
            &root_keys,
            (at(2020, 1, 1), at(2035, 12, 31)),
        );
        intermediate.is_ca = true;
        intermediate.key_usage = vec![KeyUsage::KeyCertSign, KeyUsage::CrlSign];
        intermediate.ca_issuers_url = Some("http://aia.test/root.json".to_string());
        intermediate.crl_urls = vec!["http://crl.test/root.crl".to_string()];
        let intermediate = sign_cert(intermediate, &root_keys);

        let mut leaf = template(
            "03",
            "CN=Test Signer",
            intermediate_name,
            &leaf_keys,
            &intermediate_keys,
            (at(2024, 1, 1), at(2026, 12, 31)),
        );
        leaf.key_usage = vec![KeyUsage::DigitalSignature, KeyUsage::NonRepudiation];
        leaf.extended_key_usage = vec![ExtendedKeyUsage::DocumentSigning];
        leaf.ca_issuers_url = Some("http://aia.test/intermediate.json".to_string());
        leaf.ocsp_url = Some("http://ocsp.test/intermediate".to_string());
        leaf.crl_urls = vec!["http://crl.test/intermediate.crl".to_string()];
        let leaf = sign_cert(leaf, &intermediate_keys);

        let mut responder = template(
            "04",
            "CN=Test OCSP Responder",
            intermediate_name,
            &responder_keys,
            &intermediate_keys,
            (at(2020, 1, 1), at(2035, 12, 31)),
        );
        responder.key_usage = vec![KeyUsage::DigitalSignature];
        responder.extended_key_usage = vec![ExtendedKeyUsage::OcspSigning];
        responder.ocsp_no_check = true;
        let responder = sign_cert(responder, &intermediate_keys);

        let tsa_name = "CN=Test Timestamp Authority";
        let mut tsa = template(
            "05",
            tsa_name,
            tsa_name,
            &tsa_keys,
            &tsa_keys,
            (at(2020, 1, 1), at(2035, 12, 31)),
        );
        tsa.key_usage = vec![KeyUsage::DigitalSignature];
        tsa.extended_key_usage = vec![ExtendedKeyUsage::TimeStamping];
        let tsa = sign_cert(tsa, &tsa_keys);

        Self {
            root,
            intermediate,
            leaf,
            responder,
            tsa,
            root_keys,
            intermediate_keys,
            leaf_keys,
            responder_keys,
            tsa_keys,
            impostor_keys,
        }
    }

    /// Root trusted as CA, TSA trusted for timestamps, clock at 2025-06-01,
    /// nothing online.
    pub fn builder(&self) -> ValidatorChainBuilder {
        let mut store = TrustedCertificatesStore::new();
        store.add_trusted(TrustPurpose::Ca, [&self.root]);
        store.add_trusted(TrustPurpose::Timestamp, [&self.tsa]);
        ValidatorChainBuilder::new()
            .with_trust_store(store)
            .with_current_time(at(2025, 6, 1))
    }

    /// Re-sign an edited certificate with `keys`.
    pub fn issue(&self, template: Certificate, keys: &KeyPair) -> Certificate {
        sign_cert(template, keys)
    }

    fn issuer_of(&self, cert: &Certificate) -> (&Certificate, &KeyPair) {
        if cert.issuer == self.root.subject {
            (&self.root, &self.root_keys)
        } else if cert.issuer == self.intermediate.subject {
            (&self.intermediate, &self.intermediate_keys)
        } else if cert.issuer == self.tsa.subject {
            (&self.tsa, &self.tsa_keys)
        } else {
            panic!("no fixture issuer for {}", cert.issuer)
        }
    }

    fn ocsp(
        &self,
        cert: &Certificate,
        status: CertStatus,
        produced_at: DateTime<Utc>,
        responder_id: ResponderId,
        certs: Vec<Certificate>,
        keys: &KeyPair,
    ) -> OcspResponse {
        let (issuer, _) = self.issuer_of(cert);
        let mut response = OcspResponse {
            responder_id,
            produced_at,
            responses: vec![SingleResponse {
                cert_id: CertId::new(cert, issuer).unwrap(),
                cert_status: status,
                this_update: produced_at,
                next_update: None,
            }],
            certs,
            signature: String::new(),
        };
        let tbs = response.to_be_signed().unwrap();
        response.signature = crypto::sign_data(&keys.private_key_pem, &tbs).unwrap();
        response
    }

    /// GOOD response signed directly by the issuing CA.
    pub fn ocsp_good(&self, cert: &Certificate, produced_at: DateTime<Utc>) -> OcspResponse {
        self.ocsp_status(cert, CertStatus::Good, produced_at)
    }

    pub fn ocsp_status(
        &self,
        cert: &Certificate,
        status: CertStatus,
        produced_at: DateTime<Utc>,
    ) -> OcspResponse {
        let (issuer, keys) = self.issuer_of(cert);
        let responder_id = ResponderId::ByKey(issuer.key_hash().unwrap());
        self.ocsp(cert, status, produced_at, responder_id, Vec::new(), keys)
    }

    /// GOOD response signed by the delegated responder.
    pub fn ocsp_from_responder(
        &self,
        cert: &Certificate,
        produced_at: DateTime<Utc>,
    ) -> OcspResponse {
        self.ocsp_signed_by(cert, &self.responder, &self.responder_keys, produced_at)
    }

    pub fn ocsp_signed_by(
        &self,
        cert: &Certificate,
        signer: &Certificate,
        keys: &KeyPair,
        produced_at: DateTime<Utc>,
    ) -> OcspResponse {
        self.ocsp(
            cert,
            CertStatus::Good,
            produced_at,
            ResponderId::ByName(signer.subject.clone()),
            vec![signer.clone()],
            keys,
        )
    }

    fn crl(
        &self,
        issuer: &Certificate,
        revoked: Vec<RevokedCertificate>,
        this_update: DateTime<Utc>,
    ) -> Crl {
        let keys = if issuer.subject == self.root.subject {
            &self.root_keys
        } else if issuer.subject == self.intermediate.subject {
            &self.intermediate_keys
        } else {
            panic!("no fixture keys for {}", issuer.subject)
        };
        let crl = Crl {
            issuer: issuer.subject.clone(),
            authority_key_id: issuer.subject_key_id.clone(),
            this_update,
            next_update: None,
            revoked,
            signature: String::new(),
        };
        self.resign_crl(crl, keys)
    }

    /// CRL from `issuer` listing nothing.
    pub fn crl_empty(&self, issuer: &Certificate, this_update: DateTime<Utc>) -> Crl {
        self.crl(issuer, Vec::new(), this_update)
    }

    /// CRL from `cert`'s issuer listing `cert`.
    pub fn crl_revoking(
        &self,
        cert: &Certificate,
        revocation_date: DateTime<Utc>,
        this_update: DateTime<Utc>,
    ) -> Crl {
        let (issuer, _) = self.issuer_of(cert);
        let revoked = vec![RevokedCertificate {
            serial_number: cert.serial_number.clone(),
            revocation_date,
            reason: Some(RevocationReason::KeyCompromise),
        }];
        self.crl(issuer, revoked, this_update)
    }

    pub fn resign_crl(&self, mut crl: Crl, keys: &KeyPair) -> Crl {
        let tbs = crl.to_be_signed().unwrap();
        crl.signature = crypto::sign_data(&keys.private_key_pem, &tbs).unwrap();
        crl
    }

    /// Same names and key identifier as `cert`, but the impostor key, signed
    /// by that key.
    pub fn impostor_of(&self, cert: &Certificate) -> Certificate {
        let mut impostor = cert.clone();
        impostor.public_key_pem = self.impostor_keys.public_key_pem.clone();
        sign_cert(impostor, &self.impostor_keys)
    }

    /// Three CA certificates issuing each other: A by B, B by C, C by A.
    pub fn cycle(&self) -> (Certificate, Certificate, Certificate) {
        let keys: Vec<KeyPair> = (0..3)
            .map(|_| crypto::generate_key_pair().unwrap())
            .collect();
        let names = ["CN=Loop A", "CN=Loop B", "CN=Loop C"];
        let mut certs = Vec::new();
        for i in 0..3 {
            let issuer = (i + 1) % 3;
            let mut cert = template(
                &format!("1{}", i),
                names[i],
                names[issuer],
                &keys[i],
                &keys[issuer],
                (at(2020, 1, 1), at(2040, 12, 31)),
            );
            cert.is_ca = true;
            cert.key_usage = vec![KeyUsage::KeyCertSign];
            certs.push(sign_cert(cert, &keys[issuer]));
        }
        let c = certs.pop().unwrap();
        let b = certs.pop().unwrap();
        let a = certs.pop().unwrap();
        (a, b, c)
    }

    /// Signature field over `covered_bytes` by the leaf, optionally
    /// timestamped by the TSA at `timestamp_time`.
    pub fn signature_container(
        &self,
        field_name: &str,
        covered_bytes: &[u8],
        claimed_signing_time: Option<DateTime<Utc>>,
        timestamp_time: Option<DateTime<Utc>>,
    ) -> SignatureContainer {
        let signature = crypto::sign_data(&self.leaf_keys.private_key_pem, covered_bytes).unwrap();
        let timestamp = timestamp_time.map(|time| {
            let mut token = TimestampToken {
                time,
                tsa_certificate: self.tsa.clone(),
                message_imprint: crypto::sha256_hex(signature.as_bytes()),
                signature: String::new(),
            };
            let tbs = token.to_be_signed().unwrap();
            token.signature = crypto::sign_data(&self.tsa_keys.private_key_pem, &tbs).unwrap();
            token
        });
        let envelope = SignatureEnvelope {
            signing_certificate: self.leaf.clone(),
            signature,
            timestamp,
        };
        SignatureContainer {
            field_name: field_name.to_string(),
            covered_bytes: covered_bytes.to_vec(),
            envelope: envelope.to_bytes().unwrap(),
            validation_data: ValidationData::new(),
            claimed_signing_time,
        }
    }
}
