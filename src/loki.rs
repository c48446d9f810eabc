use crate::sink::{LogSink, ShipError};
use crate::stream::PushPayload;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

const PUSH_PATH: &str = "/loki/api/v1/push";
const READY_PATH: &str = "/ready";

/// Configuration for [`LokiSink`].
///
/// The sink talks to Loki over HTTP using the JSON push API.
#[derive(Clone, Debug)]
pub struct LokiConfig {
    /// Base URL without path, e.g. "http://127.0.0.1:3100"
    pub url: String,
    /// Sent as `X-Scope-OrgID` for multi-tenant Loki deployments.
    pub tenant_id: Option<String>,
    /// Per-request timeout. `None` leaves the push unbounded.
    pub timeout: Option<Duration>,
}

impl LokiConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tenant_id: None,
            timeout: None,
        }
    }

    pub fn from_host_port(host: &str, port: u16) -> Self {
        Self::new(format!("http://{}:{}", host, port))
    }
}

/// Loki implementation of [`LogSink`] using the HTTP push API.
#[derive(Clone)]
pub struct LokiSink {
    client: Client,
    config: LokiConfig,
}

impl LokiSink {
    /// Construct a new sink instance using the provided configuration.
    pub fn new(config: LokiConfig) -> Self {
        let client = Client::new();
        Self { client, config }
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), PUSH_PATH)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = match &self.config.tenant_id {
            Some(tenant) => builder.header("X-Scope-OrgID", tenant),
            None => builder,
        };
        match self.config.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    /// Check that Loki answers its readiness probe. This is optional and
    /// is not called automatically.
    ///
    /// **Returns**
    /// - `Ok(())` if `GET /ready` answered 200.
    /// - `Err(..)` on transport failure or any other status.
    pub async fn ready(&self) -> Result<(), ShipError> {
        let url = format!("{}{}", self.config.url.trim_end_matches('/'), READY_PATH);
        let resp = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ShipError::Transport(Box::new(e)))?;

        let status = resp.status();
        if status == reqwest::StatusCode::OK {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(ShipError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl LogSink for LokiSink {
    async fn push(&self, payload: &PushPayload) -> Result<(), ShipError> {
        let body = serde_json::to_vec(payload)?;
        let resp = self
            .request(self.client.post(self.endpoint()))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ShipError::Transport(Box::new(e)))?;

        let status = resp.status();
        if status.as_u16() >= 400 {
            let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            return Err(ShipError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogEvent;
    use crate::stream::Stream;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use tracing::Level;

    fn payload() -> PushPayload {
        let event = LogEvent::new(Level::INFO, "api", "api", "request_started")
            .with_request_id("r-1")
            .with_field("path", "/api/v1/claims");
        PushPayload::new(vec![Stream::from_event(&event).unwrap()])
    }

    #[tokio::test]
    async fn pushes_json_to_push_endpoint() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/loki/api/v1/push")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "streams": [{
                    "stream": {
                        "level": "info",
                        "logger": "api",
                        "application": "api",
                        "request_id": "r-1",
                        "path": "/api/v1/claims"
                    }
                }]
            })))
            .with_status(204)
            .create_async()
            .await;

        let sink = LokiSink::new(LokiConfig::new(server.url()));
        sink.push(&payload()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn tenant_header_is_sent_when_configured() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/loki/api/v1/push")
            .match_header("x-scope-orgid", "claims")
            .with_status(204)
            .create_async()
            .await;

        let mut config = LokiConfig::new(server.url());
        config.tenant_id = Some("claims".to_string());
        LokiSink::new(config).push(&payload()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn status_400_and_above_is_a_rejection() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/loki/api/v1/push")
            .with_status(400)
            .with_body("entry out of order")
            .create_async()
            .await;

        let sink = LokiSink::new(LokiConfig::new(server.url()));
        match sink.push(&payload()).await {
            Err(ShipError::Rejected { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "entry out of order");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_failure() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let sink = LokiSink::new(LokiConfig::from_host_port("127.0.0.1", port));
        let err = sink.push(&payload()).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn ready_probe() {
        let mut server = Server::new_async().await;
        let _ready = server
            .mock("GET", "/ready")
            .with_status(200)
            .create_async()
            .await;

        let sink = LokiSink::new(LokiConfig::new(format!("{}/", server.url())));
        sink.ready().await.unwrap();
    }
}
