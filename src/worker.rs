use crate::diagnostics;
use crate::record::LogEvent;
use crate::shipper::BufferingShipper;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};

/// Producer-side counters.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Successfully enqueued into the channel.
    pub enqueued_events: AtomicU64,
    /// Dropped because the channel was full or the worker had stopped.
    pub dropped_events: AtomicU64,
}

/// Cheap, cloneable producer side of the pipeline.
///
/// [`submit`](Self::submit) never blocks and never waits on the network.
#[derive(Clone)]
pub struct ShipperHandle {
    sender: mpsc::Sender<LogEvent>,
    stats: Arc<WorkerStats>,
}

impl ShipperHandle {
    pub(crate) fn new(sender: mpsc::Sender<LogEvent>) -> Self {
        Self {
            sender,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    /// Queue `event` for shipping. When the queue is full the newest event,
    /// this one, is dropped and counted; the same happens once the worker
    /// has stopped. Returns whether it was queued.
    pub fn submit(&self, event: LogEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => {
                self.stats.enqueued_events.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped_events.fetch_add(1, Ordering::Relaxed);
                diagnostics::queue_full();
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.dropped_events.fetch_add(1, Ordering::Relaxed);
                diagnostics::worker_stopped();
                false
            }
        }
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }
}

/// Owns the background worker. Call [`shutdown`](Self::shutdown) before the
/// process exits so queued events get a final flush attempt.
pub struct ShipperGuard {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
    shipper: Arc<BufferingShipper>,
}

impl ShipperGuard {
    pub fn shipper(&self) -> Arc<BufferingShipper> {
        Arc::clone(&self.shipper)
    }

    /// Stop the worker after it has drained the queue and flushed.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            tracing::warn!(
                target: diagnostics::DIAGNOSTICS_TARGET,
                "log shipping worker ended abnormally: {}",
                e
            );
        }
    }
}

/// Spawn the background task that moves queued events into `shipper`.
///
/// The task appends events as they arrive, lets the shipper flush whenever
/// its threshold is reached, and additionally flushes every
/// `flush_interval` so quiet periods still ship. It stops on shutdown or
/// once the guard is dropped, draining and flushing first.
///
/// Minimal thresholds are enforced for `channel_buffer` and
/// `flush_interval` to avoid degenerate configurations.
pub fn spawn_worker(
    shipper: Arc<BufferingShipper>,
    channel_buffer: usize,
    flush_interval: Duration,
) -> (ShipperHandle, ShipperGuard) {
    let channel_buffer = channel_buffer.max(16);
    let flush_interval = flush_interval.max(Duration::from_millis(10));

    let (tx, mut rx) = mpsc::channel::<LogEvent>(channel_buffer);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let shipper_bg = Arc::clone(&shipper);
    let handle = tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + flush_interval, flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe_event = rx.recv() => match maybe_event {
                    Some(event) => shipper_bg.append(event).await,
                    None => break,
                },
                _ = ticker.tick() => shipper_bg.flush().await,
                _ = &mut shutdown_rx => break,
            }
        }

        rx.close();
        while let Some(event) = rx.recv().await {
            shipper_bg.append(event).await;
        }
        shipper_bg.flush().await;
    });

    (
        ShipperHandle::new(tx),
        ShipperGuard {
            shutdown: Some(shutdown_tx),
            handle,
            shipper,
        },
    )
}
