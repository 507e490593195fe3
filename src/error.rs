use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("PKCS8 error: {0}")]
    Pkcs8(String),

    #[error("SPKI error: {0}")]
    Spki(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid key format")]
    InvalidKeyFormat,

    /// Malformed trust store or validation properties. Fatal, no partial result.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    /// The document source failed or broke its contract.
    #[error("Document error: {0}")]
    Document(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "fetch")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<crate::crypto::Error> for Error {
    fn from(err: crate::crypto::Error) -> Self {
        match err {
            crate::crypto::Error::Pkcs8(e) => Error::Pkcs8(e.to_string()),
            crate::crypto::Error::Spki(e) => Error::Spki(e.to_string()),
            crate::crypto::Error::Base64(e) => Error::Base64(e),
            crate::crypto::Error::Ecdsa(msg) => Error::Crypto(msg),
            crate::crypto::Error::Signature(msg) => Error::Crypto(msg),
            crate::crypto::Error::InvalidKeyFormat => Error::InvalidKeyFormat,
        }
    }
}

impl From<p256::pkcs8::Error> for Error {
    fn from(err: p256::pkcs8::Error) -> Self {
        Error::Pkcs8(err.to_string())
    }
}

impl From<p256::pkcs8::spki::Error> for Error {
    fn from(err: p256::pkcs8::spki::Error) -> Self {
        Error::Spki(err.to_string())
    }
}

impl Error {
    /// Whether the failure is a network condition that may clear on retry,
    /// as opposed to a payload that does not decode.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Retrieval(_) | Error::Timeout { .. } | Error::Io(_) => true,
            #[cfg(feature = "fetch")]
            Error::Http(_) => true,
            _ => false,
        }
    }
}
