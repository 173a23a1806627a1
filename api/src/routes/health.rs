//! Health Check Endpoint
//!
//! Always answers 200; a load balancer reads `status` to pull an instance
//! whose store has stopped answering.

use std::time::Instant;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Ok,
    Degraded,
}

/// Store 왕복 결과
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCheck {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub status: ServiceStatus,
    pub version: &'static str,
    pub environment: &'static str,
    pub store: StoreCheck,
    pub checked_at: DateTime<Utc>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<ServiceHealth> {
    let started = Instant::now();
    let store = match state.store.health_check().await {
        Ok(()) => StoreCheck {
            reachable: true,
            latency_ms: Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)),
        },
        Err(err) => {
            tracing::warn!(error = ?err, "store unreachable");
            StoreCheck { reachable: false, latency_ms: None }
        }
    };

    Json(ServiceHealth {
        status: if store.reachable { ServiceStatus::Ok } else { ServiceStatus::Degraded },
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.as_str(),
        store,
        checked_at: Utc::now(),
    })
}
