use crate::context::RequestContext;
use crate::emitter::EventEmitter;
use futures::FutureExt;
use serde_json::json;
use std::any::{type_name, Any};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// What the middleware needs to know about an inbound request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    pub client_ip: Option<String>,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            client_ip: None,
        }
    }

    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }
}

/// Method and path come from the request line. The client address is taken
/// from a `SocketAddr` or `IpAddr` the server stored in the request
/// extensions; without one, set it with [`RequestInfo::with_client_ip`].
impl<B> From<&http::Request<B>> for RequestInfo {
    fn from(req: &http::Request<B>) -> Self {
        let info = RequestInfo::new(req.method().as_str(), req.uri().path());
        let extensions = req.extensions();
        let client_ip = extensions
            .get::<SocketAddr>()
            .map(SocketAddr::ip)
            .or_else(|| extensions.get::<IpAddr>().copied());
        match client_ip {
            Some(ip) => info.with_client_ip(ip.to_string()),
            None => info,
        }
    }
}

/// Outbound status of a handled request.
pub trait ResponseStatus {
    fn status_code(&self) -> u16;
}

impl ResponseStatus for u16 {
    fn status_code(&self) -> u16 {
        *self
    }
}

impl ResponseStatus for http::StatusCode {
    fn status_code(&self) -> u16 {
        self.as_u16()
    }
}

impl<B> ResponseStatus for http::Response<B> {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }
}

impl<T> ResponseStatus for (http::StatusCode, T) {
    fn status_code(&self) -> u16 {
        self.0.as_u16()
    }
}

/// Request middleware that logs `request_started`, then either
/// `request_completed` or `request_failed`, all under one request id.
#[derive(Clone)]
pub struct RequestLifecycleLogger {
    emitter: EventEmitter,
}

impl RequestLifecycleLogger {
    pub fn new(emitter: EventEmitter) -> Self {
        Self { emitter }
    }

    /// Run `handler` for the request described by `info`.
    ///
    /// A fresh [`RequestContext`] is created and kept in scope for the whole
    /// handler, so anything the handler logs through an
    /// [`EventEmitter`] or `tracing` carries the same request id. A handler
    /// error is logged and then returned unchanged; a handler panic is logged
    /// with `error_type` `panic` and then resumed.
    pub async fn instrument<F, Fut, T, E>(&self, info: RequestInfo, handler: F) -> Result<T, E>
    where
        F: FnOnce(Arc<RequestContext>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: ResponseStatus,
        E: std::fmt::Display,
    {
        let ctx = Arc::new(RequestContext::new());
        let started = Instant::now();
        let emitter = &self.emitter;

        ctx.clone()
            .scope(async move {
                let mut started_fields = json!({ "method": info.method, "path": info.path });
                if let Some(client_ip) = info.client_ip {
                    started_fields["client_ip"] = json!(client_ip);
                }
                emitter.info("request_started", started_fields);

                let outcome = AssertUnwindSafe(async move { handler(ctx).await })
                    .catch_unwind()
                    .await;
                let duration_ms = started.elapsed().as_millis() as u64;

                let result = match outcome {
                    Ok(result) => result,
                    Err(payload) => {
                        emitter.error(
                            "request_failed",
                            json!({
                                "error": panic_message(payload.as_ref()),
                                "error_type": "panic",
                                "duration_ms": duration_ms,
                            }),
                        );
                        panic::resume_unwind(payload);
                    }
                };

                match &result {
                    Ok(response) => {
                        emitter.info(
                            "request_completed",
                            json!({
                                "status_code": response.status_code(),
                                "duration_ms": duration_ms,
                            }),
                        );
                    }
                    Err(e) => {
                        emitter.error(
                            "request_failed",
                            json!({
                                "error": e.to_string(),
                                "error_type": short_type_name::<E>(),
                                "duration_ms": duration_ms,
                            }),
                        );
                    }
                }

                result
            })
            .await
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "Box<dyn Any>"
    }
}

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogEvent;
    use crate::worker::ShipperHandle;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("claim store unavailable")]
    struct StoreDown;

    fn logger() -> (RequestLifecycleLogger, mpsc::Receiver<LogEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let emitter = EventEmitter::new("api", "api", ShipperHandle::new(tx));
        (RequestLifecycleLogger::new(emitter), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<LogEvent>) -> Vec<LogEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn completed_request_logs_two_events_with_one_id() {
        let (logger, mut rx) = logger();
        let info = RequestInfo::new("GET", "/api/v1/claims/123").with_client_ip("10.0.0.8");

        let result: Result<u16, StoreDown> = logger.instrument(info, |_ctx| async { Ok(200) }).await;
        assert_eq!(result, Ok(200));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);

        let (started, completed) = (&events[0], &events[1]);
        assert_eq!(started.message, "request_started");
        assert_eq!(started.fields["method"], json!("GET"));
        assert_eq!(started.fields["path"], json!("/api/v1/claims/123"));
        assert_eq!(started.fields["client_ip"], json!("10.0.0.8"));
        assert!(!started.fields.contains_key("status_code"));

        assert_eq!(completed.message, "request_completed");
        assert_eq!(completed.fields["status_code"], json!(200));

        assert!(started.request_id.is_some());
        assert_eq!(started.request_id, completed.request_id);
    }

    #[tokio::test]
    async fn handler_sees_the_same_request_id() {
        let (logger, mut rx) = logger();

        let seen = logger
            .instrument(RequestInfo::new("GET", "/health"), |ctx| async move {
                Ok::<_, StoreDown>((http::StatusCode::OK, ctx.request_id().to_string()))
            })
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert_eq!(events[0].request_id.as_deref(), Some(seen.1.as_str()));
    }

    #[tokio::test]
    async fn failed_request_is_logged_and_error_returned_unchanged() {
        let (logger, mut rx) = logger();

        let result: Result<u16, StoreDown> = logger
            .instrument(RequestInfo::new("POST", "/api/v1/claims"), |_ctx| async {
                Err(StoreDown)
            })
            .await;
        assert_eq!(result, Err(StoreDown));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        let failed = &events[1];
        assert_eq!(failed.message, "request_failed");
        assert_eq!(failed.level, "error");
        assert_eq!(failed.fields["error"], json!("claim store unavailable"));
        assert_eq!(failed.fields["error_type"], json!("StoreDown"));
        assert!(!failed.fields.contains_key("status_code"));
    }

    #[tokio::test]
    async fn user_id_set_by_handler_reaches_completion_event() {
        let (logger, mut rx) = logger();

        logger
            .instrument(RequestInfo::new("GET", "/api/v1/claims"), |ctx| async move {
                ctx.set_user_id("u-77");
                Ok::<_, StoreDown>(200u16)
            })
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert!(!events[0].fields.contains_key("user_id"));
        assert_eq!(events[1].fields["user_id"], json!("u-77"));
    }

    #[tokio::test]
    async fn missing_client_ip_is_not_logged() {
        let (logger, mut rx) = logger();
        logger
            .instrument(RequestInfo::new("GET", "/health"), |_ctx| async {
                Ok::<_, StoreDown>(200u16)
            })
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert!(!events[0].fields.contains_key("client_ip"));
    }

    #[tokio::test]
    async fn panicking_handler_is_logged_then_resumed() {
        let (logger, mut rx) = logger();

        let outcome = AssertUnwindSafe(logger.instrument(
            RequestInfo::new("GET", "/api/v1/claims/7"),
            |_ctx| async {
                let claim: Option<u16> = None;
                Ok::<_, StoreDown>(claim.expect("handler exploded"))
            },
        ))
        .catch_unwind()
        .await;

        let payload = outcome.unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "handler exploded");

        let events = drain(&mut rx);
        let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["request_started", "request_failed"]);

        let failed = &events[1];
        assert_eq!(failed.level, "error");
        assert_eq!(failed.fields["error_type"], json!("panic"));
        assert_eq!(failed.fields["error"], json!("handler exploded"));
        assert_eq!(failed.request_id, events[0].request_id);
    }

    #[test]
    fn panic_messages_are_recovered() {
        let formatted: Box<dyn Any + Send> = Box::new(format!("claim {} missing", 7));
        assert_eq!(panic_message(formatted.as_ref()), "claim 7 missing");
        let opaque: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(opaque.as_ref()), "Box<dyn Any>");
    }

    #[test]
    fn client_ip_comes_from_request_extensions() {
        let mut req = http::Request::builder()
            .method("POST")
            .uri("/api/v1/login?next=/claims")
            .body(())
            .unwrap();
        let info = RequestInfo::from(&req);
        assert_eq!(info.method, "POST");
        assert_eq!(info.path, "/api/v1/login");
        assert_eq!(info.client_ip, None);

        req.extensions_mut()
            .insert(SocketAddr::from(([10, 0, 0, 8], 51234)));
        assert_eq!(RequestInfo::from(&req).client_ip.as_deref(), Some("10.0.0.8"));
    }

    #[test]
    fn type_names_are_shortened() {
        assert_eq!(short_type_name::<StoreDown>(), "StoreDown");
        assert_eq!(short_type_name::<std::io::Error>(), "Error");
    }
}
