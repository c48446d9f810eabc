use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::info;

use claims_log_shipper::init::{init_tracing_with_config, ShipperConfig};
use claims_log_shipper::noop_sink::NoopSink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(NoopSink::default());

    let config = ShipperConfig {
        channel_buffer: 50_000,
        threshold: 1_000,
        flush_interval: Duration::from_millis(200),
        enable_stdout: false,
        ..ShipperConfig::default()
    };

    let pipeline = init_tracing_with_config(sink, config)?;
    let handle = pipeline.handle();
    let shipper = pipeline.shipper();

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        info!(iteration = i, path = "/api/v1/claims", "load test event");
    }

    let elapsed = start.elapsed();
    println!(
        "sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    pipeline.shutdown().await;

    let queued = handle.stats();
    let shipped = shipper.stats();
    println!(
        "enqueued={} dropped={} batches={}",
        queued.enqueued_events.load(Ordering::Relaxed),
        queued.dropped_events.load(Ordering::Relaxed),
        shipped.pushed_batches.load(Ordering::Relaxed),
    );
    Ok(())
}
