//! Network retrieval abstraction.
//!
//! Validators fetch issuer certificates, OCSP responses and CRLs through a
//! [`Retriever`]. Fetched payloads are the JSON encoding of the parsed types
//! in [`crate::types`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;
use crate::types::certificate::Certificate;
use crate::types::revocation::CertId;

// ---------------------------------------------------------------------------
// Sync retriever trait (always available)
// ---------------------------------------------------------------------------

/// Fetch raw bytes from a URL within `timeout`.
pub trait Retriever: Send + Sync {
    fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, Error>;
}

/// Fetch `url` and decode it as JSON.
pub fn fetch_json<T: DeserializeOwned>(
    retriever: &dyn Retriever,
    url: &str,
    timeout: Duration,
) -> Result<T, Error> {
    let bytes = retriever.fetch_bytes(url, timeout)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Every URL validation of `cert` may fetch: its issuer's location, its CRL
/// distribution points and, when `issuer` is known, the OCSP request.
pub fn certificate_urls(cert: &Certificate, issuer: Option<&Certificate>) -> Vec<String> {
    let mut urls = Vec::new();
    if let Some(url) = &cert.ca_issuers_url {
        urls.push(url.clone());
    }
    if let (Some(responder), Some(issuer)) = (&cert.ocsp_url, issuer) {
        if let Ok(cert_id) = CertId::new(cert, issuer) {
            urls.push(cert_id.request_url(responder));
        }
    }
    urls.extend(cert.crl_urls.iter().cloned());
    urls
}

// ---------------------------------------------------------------------------
// InMemoryRetriever
// ---------------------------------------------------------------------------

/// Serves pre-loaded payloads. Unknown URLs fail like an unreachable host.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRetriever {
    entries: BTreeMap<String, Vec<u8>>,
}

impl InMemoryRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: &str, bytes: Vec<u8>) {
        self.entries.insert(url.to_string(), bytes);
    }

    pub fn insert_json<T: Serialize>(&mut self, url: &str, value: &T) -> Result<(), Error> {
        self.insert(url, serde_json::to_vec(value)?);
        Ok(())
    }

    /// Stored URLs in sorted order.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Retriever for InMemoryRetriever {
    fn fetch_bytes(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, Error> {
        self.entries
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Retrieval(format!("No payload for {}", url)))
    }
}

// ---------------------------------------------------------------------------
// LocalFileRetriever
// ---------------------------------------------------------------------------

/// Reads payloads from a local directory.
///
/// The last path segment of the URL names the file, so
/// `http://crl.example/ca1.crl` is served from `{dir}/ca1.crl`.
pub struct LocalFileRetriever {
    dir: PathBuf,
}

impl LocalFileRetriever {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }
}

impl Retriever for LocalFileRetriever {
    fn fetch_bytes(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, Error> {
        let name = url.trim_end_matches('/').rsplit('/').next().unwrap_or("");
        if name.is_empty() || name == "." || name == ".." || name.contains('\\') {
            return Err(Error::Retrieval(format!("No file name in {}", url)));
        }
        let path = self.dir.join(name);
        std::fs::read(&path)
            .map_err(|e| Error::Retrieval(format!("Cannot read {}: {}", path.display(), e)))
    }
}

// ---------------------------------------------------------------------------
// ChainRetriever
// ---------------------------------------------------------------------------

/// Tries a sequence of retrievers in order until one succeeds.
pub struct ChainRetriever {
    retrievers: Vec<Box<dyn Retriever>>,
}

impl ChainRetriever {
    pub fn new(retrievers: Vec<Box<dyn Retriever>>) -> Self {
        Self { retrievers }
    }
}

impl Retriever for ChainRetriever {
    fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, Error> {
        let mut last_err = Error::Retrieval("No retrievers configured".to_string());
        for retriever in &self.retrievers {
            match retriever.fetch_bytes(url, timeout) {
                Ok(bytes) => return Ok(bytes),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }
}

// ---------------------------------------------------------------------------
// Async retrieval (fetch-gated)
// ---------------------------------------------------------------------------

#[cfg(feature = "fetch")]
/// Async equivalent of [`Retriever`].
///
/// Gated behind the `fetch` feature because it brings in `async-trait`.
#[async_trait::async_trait]
pub trait AsyncRetriever: Send + Sync {
    async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, Error>;
}

#[cfg(feature = "fetch")]
/// Plain HTTP GET. Redirects are refused.
pub struct HttpRetriever {
    client: reqwest::Client,
}

#[cfg(feature = "fetch")]
impl HttpRetriever {
    pub fn new() -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[cfg(feature = "fetch")]
#[async_trait::async_trait]
impl AsyncRetriever for HttpRetriever {
    async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, Error> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    Error::Retrieval(format!("Failed to fetch {}: {}", url, e))
                }
            })?;

        if resp.status().is_redirection() {
            return Err(Error::Retrieval(format!(
                "Redirect detected fetching {} (status {}). Redirects are not allowed.",
                url,
                resp.status()
            )));
        }

        if !resp.status().is_success() {
            return Err(Error::Retrieval(format!(
                "HTTP {} fetching {}",
                resp.status(),
                url
            )));
        }

        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(feature = "fetch")]
/// Fetch `urls` concurrently and capture the results for a synchronous
/// validation run.
///
/// Each URL is fetched once on its own task. Failures and fetches exceeding
/// `timeout` are logged and left out, so validation sees them as unavailable.
/// The returned retriever is keyed by URL and independent of completion order.
pub async fn prefetch<I>(
    retriever: std::sync::Arc<dyn AsyncRetriever>,
    urls: I,
    timeout: Duration,
) -> InMemoryRetriever
where
    I: IntoIterator<Item = String>,
{
    let unique: std::collections::BTreeSet<String> = urls.into_iter().collect();
    let mut tasks = tokio::task::JoinSet::new();
    for url in unique {
        let retriever = std::sync::Arc::clone(&retriever);
        tasks.spawn(async move {
            let result = tokio::time::timeout(timeout, retriever.fetch_bytes(&url, timeout)).await;
            (url, result)
        });
    }

    let mut fetched = InMemoryRetriever::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((url, Ok(Ok(bytes)))) => fetched.insert(&url, bytes),
            Ok((url, Ok(Err(e)))) => tracing::warn!(%url, error = %e, "prefetch failed"),
            Ok((url, Err(_))) => tracing::warn!(%url, ?timeout, "prefetch timed out"),
            Err(e) => tracing::warn!(error = %e, "prefetch task aborted"),
        }
    }
    fetched
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestPki;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn test_in_memory_hit_and_miss() {
        let mut retriever = InMemoryRetriever::new();
        retriever.insert("http://a.test/x", b"payload".to_vec());
        assert_eq!(
            retriever.fetch_bytes("http://a.test/x", TIMEOUT).unwrap(),
            b"payload"
        );
        assert!(matches!(
            retriever.fetch_bytes("http://a.test/y", TIMEOUT),
            Err(Error::Retrieval(_))
        ));
    }

    #[test]
    fn test_fetch_json_decodes_certificate() {
        let pki = TestPki::new();
        let mut retriever = InMemoryRetriever::new();
        retriever
            .insert_json("http://aia.test/root.json", &pki.root)
            .unwrap();
        retriever.insert("http://aia.test/bad.json", b"<html>".to_vec());

        let cert: Certificate =
            fetch_json(&retriever, "http://aia.test/root.json", TIMEOUT).unwrap();
        assert_eq!(cert, pki.root);
        assert!(matches!(
            fetch_json::<Certificate>(&retriever, "http://aia.test/bad.json", TIMEOUT),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_local_file_retriever() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("root.crl"), b"crl bytes").unwrap();
        let retriever = LocalFileRetriever::new(dir.path());

        assert_eq!(
            retriever
                .fetch_bytes("http://crl.test/pki/root.crl", TIMEOUT)
                .unwrap(),
            b"crl bytes"
        );
        assert!(retriever
            .fetch_bytes("http://crl.test/missing.crl", TIMEOUT)
            .is_err());
        assert!(retriever.fetch_bytes("http://crl.test/..", TIMEOUT).is_err());
    }

    #[test]
    fn test_chain_retriever_fallthrough() {
        let empty = InMemoryRetriever::new();
        let mut has_doc = InMemoryRetriever::new();
        has_doc.insert("http://a.test/x", b"second".to_vec());

        let chain = ChainRetriever::new(vec![Box::new(empty), Box::new(has_doc)]);
        assert_eq!(chain.fetch_bytes("http://a.test/x", TIMEOUT).unwrap(), b"second");
        assert!(chain.fetch_bytes("http://a.test/z", TIMEOUT).is_err());

        let none = ChainRetriever::new(vec![]);
        assert!(none.fetch_bytes("http://a.test/x", TIMEOUT).is_err());
    }

    #[test]
    fn test_certificate_urls() {
        let pki = TestPki::new();
        let urls = certificate_urls(&pki.leaf, Some(&pki.intermediate));
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[0], "http://aia.test/intermediate.json");
        assert!(urls[1].starts_with("http://ocsp.test/intermediate/03/"));
        assert_eq!(urls[2], "http://crl.test/intermediate.crl");

        let without_issuer = certificate_urls(&pki.leaf, None);
        assert_eq!(without_issuer.len(), 2);
    }

    #[cfg(feature = "fetch")]
    mod fetch {
        use super::*;
        use std::sync::Arc;

        struct SlowRetriever;

        #[async_trait::async_trait]
        impl AsyncRetriever for SlowRetriever {
            async fn fetch_bytes(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, Error> {
                if url.contains("slow") {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                if url.contains("down") {
                    return Err(Error::Retrieval(format!("connection refused: {}", url)));
                }
                Ok(url.as_bytes().to_vec())
            }
        }

        #[tokio::test]
        async fn test_prefetch_drops_failures_and_timeouts() {
            let urls = vec![
                "http://b.test/ok".to_string(),
                "http://a.test/ok".to_string(),
                "http://slow.test/x".to_string(),
                "http://down.test/x".to_string(),
                "http://a.test/ok".to_string(),
            ];
            let fetched = prefetch(Arc::new(SlowRetriever), urls, Duration::from_millis(50)).await;

            let stored: Vec<&str> = fetched.urls().collect();
            assert_eq!(stored, vec!["http://a.test/ok", "http://b.test/ok"]);
            assert!(fetched.fetch_bytes("http://slow.test/x", TIMEOUT).is_err());
        }

        #[test]
        fn test_http_retriever_builds() {
            assert!(HttpRetriever::new().is_ok());
        }
    }
}
