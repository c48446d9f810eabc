use crate::sink::{LogSink, ShipError};
use crate::stream::PushPayload;
use async_trait::async_trait;

/// A sink that accepts and discards every batch.
///
/// Useful for measuring the overhead of the pipeline itself without any
/// network I/O, and for tests that don't care about delivery.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn push(&self, _payload: &PushPayload) -> Result<(), ShipError> {
        Ok(())
    }
}
