use crate::emitter::EventEmitter;
use crate::layer::ShippingLayer;
use crate::lifecycle::RequestLifecycleLogger;
use crate::shipper::{BufferingShipper, DEFAULT_THRESHOLD};
use crate::sink::LogSink;
use crate::worker::{spawn_worker, ShipperGuard, ShipperHandle};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Configuration of the shipping pipeline.
///
/// **Fields**
/// - `application`: value of the `application` label on every stream.
/// - `threshold`: pending streams that trigger a push.
/// - `channel_buffer`: queued events before new ones are dropped.
/// - `flush_interval`: longest time a partial batch waits for a push.
/// - `min_level`: least severe `tracing` level forwarded by the layer.
/// - `enable_stdout`: if `true`, a `fmt` layer filtered by `RUST_LOG`
///   (default `info`) is installed alongside the shipping layer.
#[derive(Clone, Debug)]
pub struct ShipperConfig {
    pub application: String,
    pub threshold: usize,
    pub channel_buffer: usize,
    pub flush_interval: Duration,
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            application: "api".to_string(),
            threshold: DEFAULT_THRESHOLD,
            channel_buffer: 1024,
            flush_interval: Duration::from_secs(5),
            min_level: Level::INFO,
            enable_stdout: true,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Running pipeline: producer handle plus the worker's lifetime guard.
pub struct LoggingPipeline {
    handle: ShipperHandle,
    guard: ShipperGuard,
    application: String,
}

impl LoggingPipeline {
    /// Build the shipper and spawn its worker without touching the global
    /// subscriber. Must be called from within a Tokio runtime.
    pub fn start(sink: Arc<dyn LogSink>, config: &ShipperConfig) -> Self {
        let shipper = Arc::new(BufferingShipper::with_threshold(sink, config.threshold));
        let (handle, guard) = spawn_worker(shipper, config.channel_buffer, config.flush_interval);
        Self {
            handle,
            guard,
            application: config.application.clone(),
        }
    }

    pub fn handle(&self) -> ShipperHandle {
        self.handle.clone()
    }

    pub fn shipper(&self) -> Arc<BufferingShipper> {
        self.guard.shipper()
    }

    /// Emitter for the named logger.
    pub fn emitter(&self, logger: &str) -> EventEmitter {
        EventEmitter::new(logger, self.application.as_str(), self.handle.clone())
    }

    /// Request middleware logging under the `api` logger.
    pub fn request_logger(&self) -> RequestLifecycleLogger {
        RequestLifecycleLogger::new(self.emitter("api"))
    }

    pub fn layer(&self, min_level: Level) -> ShippingLayer {
        ShippingLayer::new(self.handle.clone(), self.application.as_str(), min_level)
    }

    /// Drain queued events, attempt a final push and stop the worker.
    pub async fn shutdown(self) {
        self.guard.shutdown().await;
    }
}

/// Start the pipeline and install it as the global `tracing` subscriber.
///
/// **Parameters**
/// - `sink`: implementation of [`LogSink`] that will receive batches.
/// - `config`: [`ShipperConfig`] controlling buffering and batching.
///
/// **Returns**
/// - The running [`LoggingPipeline`]; call
///   [`shutdown`](LoggingPipeline::shutdown) before exiting.
/// - `Err(InitError::SetGlobal)` if a global subscriber already exists.
pub fn init_tracing_with_config(
    sink: Arc<dyn LogSink>,
    config: ShipperConfig,
) -> Result<LoggingPipeline, InitError> {
    let pipeline = LoggingPipeline::start(sink, &config);
    let layer = pipeline.layer(config.min_level);

    // Both variants are built separately to keep the subscriber type concrete.
    if config.enable_stdout {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_filter(filter);
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(pipeline)
}

/// Initialize tracing with [`ShipperConfig::default`].
pub fn init_tracing(sink: Arc<dyn LogSink>) -> Result<LoggingPipeline, InitError> {
    init_tracing_with_config(sink, ShipperConfig::default())
}
