use crate::diagnostics;
use crate::record::LogEvent;
use crate::sink::LogSink;
use crate::stream::{PushPayload, Stream};
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const DEFAULT_THRESHOLD: usize = 100;

/// Counters describing what the shipper did with the events it was given.
#[derive(Debug, Default)]
pub struct ShipperStats {
    /// Events turned into a pending stream.
    pub appended_events: AtomicU64,
    /// Events dropped because their log line could not be serialized.
    pub dropped_events: AtomicU64,
    /// Batches the sink accepted.
    pub pushed_batches: AtomicU64,
    /// Batches lost to a transport failure or a rejection.
    pub failed_batches: AtomicU64,
    /// Streams contained in failed batches.
    pub lost_streams: AtomicU64,
}

/// Accumulates one stream per event and pushes them to a [`LogSink`] in
/// batches of `threshold`.
///
/// Delivery is at-most-once: a batch is removed from the buffer before the
/// push is attempted and is never retried, whatever the outcome.
pub struct BufferingShipper {
    sink: Arc<dyn LogSink>,
    pending: Mutex<Vec<Stream>>,
    threshold: usize,
    stats: Arc<ShipperStats>,
}

impl BufferingShipper {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self::with_threshold(sink, DEFAULT_THRESHOLD)
    }

    /// A threshold of zero is raised to one.
    pub fn with_threshold(sink: Arc<dyn LogSink>, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            sink,
            pending: Mutex::new(Vec::with_capacity(threshold)),
            threshold,
            stats: Arc::new(ShipperStats::default()),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn stats(&self) -> Arc<ShipperStats> {
        Arc::clone(&self.stats)
    }

    pub fn pending_len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Stream>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer `event` as a single-entry stream.
    ///
    /// The call that brings the buffer to `threshold` takes the whole batch
    /// under the lock and awaits the push before returning; concurrent
    /// callers keep appending to the now-empty buffer. Exactly one flush
    /// happens per threshold crossing.
    pub async fn append(&self, event: LogEvent) {
        let stream = match Stream::from_event(&event) {
            Ok(stream) => stream,
            Err(e) => {
                self.stats.dropped_events.fetch_add(1, Ordering::Relaxed);
                diagnostics::event_unserializable(&e);
                return;
            }
        };

        let batch = {
            let mut pending = self.lock();
            pending.push(stream);
            self.stats.appended_events.fetch_add(1, Ordering::Relaxed);
            if pending.len() >= self.threshold {
                Some(mem::replace(&mut *pending, Vec::with_capacity(self.threshold)))
            } else {
                None
            }
        };

        if let Some(batch) = batch {
            self.push_batch(batch).await;
        }
    }

    /// Push everything pending, if anything, and clear the buffer.
    pub async fn flush(&self) {
        let batch = mem::take(&mut *self.lock());
        if !batch.is_empty() {
            self.push_batch(batch).await;
        }
    }

    async fn push_batch(&self, batch: Vec<Stream>) {
        let payload = PushPayload::new(batch);
        match self.sink.push(&payload).await {
            Ok(()) => {
                self.stats.pushed_batches.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed_batches.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .lost_streams
                    .fetch_add(payload.len() as u64, Ordering::Relaxed);
                diagnostics::batch_failed(&e, payload.len());
            }
        }
    }
}
