/// Health check endpoint
///
/// Reports liveness plus database reachability, with the probe's round-trip
/// time. A reachable database means `healthy` / 200; an unreachable one
/// means `degraded` / 503, which lets load balancers stop routing here
/// while the process itself keeps running.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database_latency_ms": 2
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::time::Instant;

/// Overall service health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Serving and the database answers
    Healthy,

    /// Serving but the database is unreachable
    Degraded,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: HealthStatus,

    /// Application version
    pub version: &'static str,

    /// Database probe round-trip time (absent when unreachable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_latency_ms: Option<u128>,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let started = Instant::now();

    let database_latency_ms = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => Some(started.elapsed().as_millis()),
        Err(e) => {
            tracing::warn!(error = %e, "Health check cannot reach the database");
            None
        }
    };

    let status = if database_latency_ms.is_some() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    let code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            database_latency_ms,
        }),
    )
}
