//! reqwest-backed transport with a swappable cookie jar.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use url::Url;

use crate::config::EnvelopeConfig;
use crate::error::TransportError;
use crate::transport::{Transport, WireRequest, WireResponse};

/// HTTP transport holding the session cookies in reqwest's cookie store.
///
/// Clearing credentials swaps in a freshly built client, which starts with
/// an empty jar; in-flight requests finish on the old one.
pub struct ReqwestTransport {
    base_url: Url,
    connect_timeout: Duration,
    client: ArcSwap<reqwest::Client>,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TransportError::InvalidRequest(format!("Invalid base URL '{}': {}", base_url, e)))?;
        let client = build_client(connect_timeout)?;

        tracing::info!(base_url = %base_url, "HTTP transport initialized");

        Ok(Self {
            base_url,
            connect_timeout,
            client: ArcSwap::from_pointee(client),
        })
    }

    pub fn from_config(config: &EnvelopeConfig) -> Result<Self, TransportError> {
        Self::new(
            &config.api.base_url,
            Duration::from_secs(config.timeouts.connect_secs),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join a request path onto the base URL, keeping any base path prefix.
    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|e| TransportError::InvalidRequest(format!("Invalid request path '{}': {}", path, e)))
    }
}

fn build_client(connect_timeout: Duration) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .cookie_store(true)
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| TransportError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))
}

/// Timeouts carry how long the request had been running when it gave up.
fn classify(error: reqwest::Error, elapsed: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(elapsed.as_millis() as u64)
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        let url = self.url_for(&request.path)?;
        let client: Arc<reqwest::Client> = self.client.load_full();

        let mut builder = client.request(request.method, url).headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| classify(e, started.elapsed()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(e, started.elapsed()))?;

        Ok(WireResponse::new(status, body.to_vec()))
    }

    fn clear_credentials(&self) {
        match build_client(self.connect_timeout) {
            Ok(client) => {
                self.client.store(Arc::new(client));
                tracing::debug!("Session cookies cleared");
            }
            Err(e) => tracing::error!(error = %e, "Failed to reset cookie jar"),
        }
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url.as_str())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join_keeps_base_path() {
        let transport = ReqwestTransport::new("http://localhost:5000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            transport.url_for("/accounts/7").unwrap().as_str(),
            "http://localhost:5000/api/accounts/7"
        );
        assert_eq!(
            transport.url_for("users?page=2").unwrap().as_str(),
            "http://localhost:5000/api/users?page=2"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ReqwestTransport::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) is essentially never listening on loopback.
        let transport = ReqwestTransport::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = transport
            .send(WireRequest::new(reqwest::Method::GET, "/health"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Network(_) | TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_timeout_reports_elapsed_time() {
        // Accepts the connection but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let started = Instant::now();
        let err = client
            .get(format!("http://{}/accounts", addr))
            .send()
            .await
            .unwrap_err();

        match classify(err, started.elapsed()) {
            TransportError::Timeout(ms) => assert!((100..5_000).contains(&ms), "{}", ms),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
