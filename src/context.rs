use crate::record::LogEvent;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

tokio::task_local! {
    static CURRENT: Arc<RequestContext>;
}

/// Correlation data for one inbound request.
///
/// The request id is minted once, when the context is created, and every
/// event logged while the context is in scope carries that same id.
#[derive(Debug)]
pub struct RequestContext {
    request_id: String,
    user_id: OnceLock<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::with_request_id(Uuid::new_v4().to_string())
    }

    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            user_id: OnceLock::new(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.get().map(String::as_str)
    }

    /// Attach the authenticated user. Only the first call has an effect.
    pub fn set_user_id(&self, user_id: impl Into<String>) {
        let _ = self.user_id.set(user_id.into());
    }

    /// Run `fut` with `self` as the current request context.
    pub async fn scope<F: Future>(self: Arc<Self>, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The context of the request being served on this task, if any.
pub fn current() -> Option<Arc<RequestContext>> {
    CURRENT.try_with(Arc::clone).ok()
}

/// Stamp `event` with the current request id and user id, if a request is
/// in scope. A `user_id` field set by the caller is kept.
pub fn enrich(event: &mut LogEvent) {
    let Some(ctx) = current() else {
        return;
    };
    event.request_id = Some(ctx.request_id().to_string());
    if let Some(user_id) = ctx.user_id() {
        event
            .fields
            .entry("user_id".to_string())
            .or_insert_with(|| Value::String(user_id.to_string()));
    }
}
