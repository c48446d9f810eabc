//! Local diagnostic channel for the shipping pipeline itself.
//!
//! Everything here is logged under [`DIAGNOSTICS_TARGET`]. The
//! [`ShippingLayer`](crate::layer::ShippingLayer) never forwards events from
//! this crate's targets, so a broken backend cannot feed its own failure
//! reports back into the queue it is failing to drain.

use crate::sink::ShipError;

pub const DIAGNOSTICS_TARGET: &str = "claims_log_shipper::diagnostics";

pub(crate) fn batch_failed(err: &ShipError, batch_len: usize) {
    match err {
        ShipError::Rejected { status, body } => tracing::warn!(
            target: DIAGNOSTICS_TARGET,
            kind = err.kind(),
            status = *status,
            batch_len,
            "error sending logs to Loki: {}",
            body
        ),
        _ => tracing::warn!(
            target: DIAGNOSTICS_TARGET,
            kind = err.kind(),
            batch_len,
            "exception sending logs to Loki: {}",
            err
        ),
    }
}

pub(crate) fn event_unserializable(err: &dyn std::fmt::Display) {
    tracing::warn!(
        target: DIAGNOSTICS_TARGET,
        kind = "serialization",
        "error formatting log for Loki: {}",
        err
    );
}

pub(crate) fn queue_full() {
    tracing::warn!(
        target: DIAGNOSTICS_TARGET,
        kind = "queue_full",
        "log channel full, dropping log event"
    );
}

pub(crate) fn worker_stopped() {
    tracing::warn!(
        target: DIAGNOSTICS_TARGET,
        kind = "worker_stopped",
        "log shipping worker has stopped, dropping log event"
    );
}
