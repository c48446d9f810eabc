use crate::stream::PushPayload;
use async_trait::async_trait;
use std::error::Error;

/// Why a batch did not reach the log backend.
#[derive(thiserror::Error, Debug)]
pub enum ShipError {
    #[error("failed to serialize log payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn Error + Send + Sync>),

    #[error("log backend rejected batch with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl ShipError {
    /// Short, stable name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ShipError::Serialization(_) => "serialization",
            ShipError::Transport(_) => "transport",
            ShipError::Rejected { .. } => "rejected",
        }
    }
}

/// Remote destination for batches built by the shipper.
///
/// Implementations perform exactly one delivery attempt per call. The
/// shipper owns retry policy (there is none) and clears its buffer no matter
/// what `push` returns.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Deliver one combined batch.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the batch.
    /// - `Err(ShipError::Transport)` on connection or timeout failures.
    /// - `Err(ShipError::Rejected)` if the backend answered with status >= 400.
    async fn push(&self, payload: &PushPayload) -> Result<(), ShipError>;
}
