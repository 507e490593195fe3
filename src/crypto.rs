//! ECDSA P-256 primitives used to check certificate, evidence and envelope
//! signatures.
//!
//! Everything here is the narrow cryptographic surface the validators rely
//! on. Signature algorithm internals never leak past this module.

use base64::{engine::general_purpose, Engine as _};
use p256::{
    ecdsa::{signature::Signer, signature::Verifier, Signature, SigningKey, VerifyingKey},
    pkcs8::{spki, DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey},
    PublicKey, SecretKey,
};
use rand::rngs::OsRng;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::error::Error as StdError;
use std::fmt;

/// Custom error type for cryptographic operations
#[derive(Debug)]
pub enum Error {
    /// ECDSA key generation or operation error
    Ecdsa(String),
    /// PKCS#8 encoding/decoding error
    Pkcs8(p256::pkcs8::Error),
    /// SPKI encoding/decoding error
    Spki(spki::Error),
    /// Base64 encoding/decoding error
    Base64(base64::DecodeError),
    /// Signature verification error
    Signature(String),
    /// Invalid key format
    InvalidKeyFormat,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Ecdsa(e) => write!(f, "ECDSA error: {}", e),
            Error::Pkcs8(e) => write!(f, "PKCS#8 error: {}", e),
            Error::Spki(e) => write!(f, "SPKI error: {}", e),
            Error::Base64(e) => write!(f, "Base64 error: {}", e),
            Error::Signature(e) => write!(f, "Signature error: {}", e),
            Error::InvalidKeyFormat => write!(f, "Invalid key format"),
        }
    }
}

impl StdError for Error {}

impl From<p256::pkcs8::Error> for Error {
    fn from(err: p256::pkcs8::Error) -> Self {
        Error::Pkcs8(err)
    }
}

impl From<spki::Error> for Error {
    fn from(err: spki::Error) -> Self {
        Error::Spki(err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Base64(err)
    }
}

/// Key pair containing private and public keys in PEM format
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub private_key_pem: String,
    pub public_key_pem: String,
}

/// Generate a new ECDSA P-256 key pair in PEM format.
///
/// # Errors
///
/// Returns an error if PEM encoding fails.
pub fn generate_key_pair() -> Result<KeyPair, Error> {
    let secret_key = SecretKey::random(&mut OsRng);
    let public_key = secret_key.public_key();

    let private_key_pem = secret_key
        .to_pkcs8_pem(p256::pkcs8::LineEnding::LF)?
        .to_string();
    let public_key_pem = public_key.to_public_key_pem(p256::pkcs8::LineEnding::LF)?;

    Ok(KeyPair {
        private_key_pem,
        public_key_pem,
    })
}

/// Sign `data` (ECDSA with SHA-256) and return the base64 DER signature.
///
/// # Errors
///
/// Returns an error if the private key is invalid.
pub fn sign_data(private_key_pem: &str, data: &[u8]) -> Result<String, Error> {
    let secret_key = SecretKey::from_pkcs8_pem(private_key_pem)?;
    let signing_key = SigningKey::from(secret_key);
    let signature: Signature = signing_key.sign(data);
    Ok(general_purpose::STANDARD.encode(signature.to_der()))
}

/// Verify a base64 DER signature over `data`.
///
/// Returns `Ok(false)` for a well-formed signature that does not match.
///
/// # Errors
///
/// Returns an error if the public key or the signature encoding is invalid.
pub fn verify_signature(public_key_pem: &str, data: &[u8], signature: &str) -> Result<bool, Error> {
    let public_key = PublicKey::from_public_key_pem(public_key_pem)?;
    let verifying_key = VerifyingKey::from(public_key);

    let signature_bytes = general_purpose::STANDARD.decode(signature)?;
    let signature_obj =
        Signature::from_der(&signature_bytes).map_err(|_| Error::InvalidKeyFormat)?;

    Ok(verifying_key.verify(data, &signature_obj).is_ok())
}

/// Convenience wrapper treating any decoding failure as a non-matching
/// signature.
pub fn signature_matches(public_key_pem: &str, data: &[u8], signature: &str) -> bool {
    verify_signature(public_key_pem, data, signature).unwrap_or(false)
}

/// SHA-1 hash of the DER-encoded public key, hex encoded.
///
/// This is the key hash used by OCSP `CertID`s and by-key responder ids, and
/// also serves as the subject key identifier.
///
/// # Errors
///
/// Returns an error if the public key cannot be parsed.
pub fn key_hash(public_key_pem: &str) -> Result<String, Error> {
    let public_key = PublicKey::from_public_key_pem(public_key_pem)?;
    let der_bytes = public_key.to_public_key_der()?;
    Ok(hex::encode(Sha1::digest(der_bytes.as_bytes())))
}

/// Check that a PEM string holds a usable P-256 public key.
///
/// # Errors
///
/// Returns an error if the key cannot be parsed.
pub fn validate_public_key(public_key_pem: &str) -> Result<(), Error> {
    PublicKey::from_public_key_pem(public_key_pem)?;
    Ok(())
}

/// SHA-256 digest of `data`, hex encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
