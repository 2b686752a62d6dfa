//! Identity provider reachability probe.
//!
//! Answers "is it safe to redirect the operator to the provider?". A
//! probe never errors: any transport failure, bad status, malformed body
//! or timeout is `false`.
//!
//! The timeout is applied by wrapping the request future in
//! [`tokio::time::timeout`]. When it elapses the future is dropped,
//! which aborts the in-flight request and frees its connection.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Default probe bound.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Health check against the identity provider.
///
/// Concurrent calls are independent; nothing is coalesced or cached.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync + std::fmt::Debug {
    /// Returns `true` only if the provider answered healthily within `timeout`.
    async fn probe(&self, timeout: Duration) -> bool;
}

#[derive(Debug, Deserialize)]
struct Discovery {
    issuer: String,
}

/// Probes the realm's OpenID discovery document.
#[derive(Debug, Clone)]
pub struct HttpReachabilityProbe {
    client: reqwest::Client,
    discovery_url: String,
}

impl HttpReachabilityProbe {
    /// Creates a probe for `realm` at `base_url`.
    #[must_use]
    pub fn new(base_url: &str, realm: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, realm)
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: &str, realm: &str) -> Self {
        Self {
            client,
            discovery_url: format!(
                "{}/realms/{}/.well-known/openid-configuration",
                base_url.trim_end_matches('/'),
                realm
            ),
        }
    }

    #[must_use]
    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    async fn fetch(&self, timeout: Duration) -> Result<Discovery, String> {
        let resp = self
            .client
            .get(&self.discovery_url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        resp.json::<Discovery>().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ReachabilityProbe for HttpReachabilityProbe {
    async fn probe(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.fetch(timeout)).await {
            Ok(Ok(doc)) if !doc.issuer.is_empty() => {
                tracing::debug!(url = %self.discovery_url, issuer = %doc.issuer, "identity provider reachable");
                true
            }
            Ok(Ok(_)) => {
                tracing::debug!(url = %self.discovery_url, "discovery document has empty issuer");
                false
            }
            Ok(Err(e)) => {
                tracing::debug!(url = %self.discovery_url, error = %e, "identity provider probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(url = %self.discovery_url, ?timeout, "identity provider probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DISCOVERY: &str = "/realms/plant/.well-known/openid-configuration";

    async fn server_with(response: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DISCOVERY))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn healthy_provider() {
        let server = server_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issuer": "http://kc/realms/plant"
        })))
        .await;
        let probe = HttpReachabilityProbe::new(&format!("{}/", server.uri()), "plant");
        assert!(probe.probe(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn error_status_is_unreachable() {
        let server = server_with(ResponseTemplate::new(503)).await;
        let probe = HttpReachabilityProbe::new(&server.uri(), "plant");
        assert!(!probe.probe(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn malformed_body_is_unreachable() {
        let server = server_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>")).await;
        let probe = HttpReachabilityProbe::new(&server.uri(), "plant");
        assert!(!probe.probe(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = server_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "issuer": "x" }))
                .set_delay(Duration::from_secs(10)),
        )
        .await;
        let probe = HttpReachabilityProbe::new(&server.uri(), "plant");

        let started = std::time::Instant::now();
        assert!(!probe.probe(Duration::from_millis(200)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let probe = HttpReachabilityProbe::new("http://127.0.0.1:9", "plant");
        assert!(!probe.probe(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn concurrent_probes_are_independent() {
        let server = server_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issuer": "x"
        })))
        .await;
        let probe = HttpReachabilityProbe::new(&server.uri(), "plant");
        let (a, b) = tokio::join!(
            probe.probe(Duration::from_secs(5)),
            probe.probe(Duration::from_secs(5))
        );
        assert!(a && b);
        assert_eq!(server.received_requests().await.map(|r| r.len()), Some(2));
    }
}
