use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

use claims_log_shipper::claims::model::{NewClaim, Procedure};
use claims_log_shipper::claims::store::{ClaimStore, InMemoryStore};
use claims_log_shipper::env;
use claims_log_shipper::init::{init_tracing_with_config, ShipperConfig};
use claims_log_shipper::lifecycle::RequestInfo;
use claims_log_shipper::loki::{LokiConfig, LokiSink};

/// Drives a few claim requests through the request logger and ships the
/// resulting events to the Loki configured by `LOKI_HOST` / `LOKI_PORT`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(LokiSink::new(LokiConfig::from_env()?));
    let pipeline = init_tracing_with_config(sink, ShipperConfig::from_env()?)?;
    tracing::info!(
        loki_host = %env::env_or(env::LOKI_HOST_ENV, "localhost"),
        "Starting application"
    );

    let store = InMemoryStore::new();
    let requests = pipeline.request_logger();
    let claims_log = pipeline.emitter("claims");
    let user_id = Uuid::new_v4();

    for patient in ["P-1", "P-2", ""] {
        let claim = NewClaim {
            patient_id: patient.to_string(),
            provider_id: "PR-9".to_string(),
            service_date: NaiveDate::from_ymd_opt(2024, 5, 14).unwrap_or_default(),
            procedures: vec![Procedure {
                code: "99213".to_string(),
                amount: 120.0,
                description: "Office visit".to_string(),
            }],
            total_amount: 120.0,
            notes: None,
        };

        let info = RequestInfo::new("POST", "/api/v1/claims").with_client_ip("127.0.0.1");
        let result = requests
            .instrument(info, |ctx| {
                let store = &store;
                let claims_log = &claims_log;
                async move {
                    ctx.set_user_id(user_id.to_string());
                    let claim = store.create_claim(user_id, claim).await?;
                    claims_log.info("claim_submitted", json!({ "claim_id": claim.id }));
                    Ok::<_, claims_log_shipper::claims::store::StoreError>(201u16)
                }
            })
            .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, "request answered with 500");
        }
    }

    tracing::info!("Shutting down application");
    pipeline.shutdown().await;
    Ok(())
}
