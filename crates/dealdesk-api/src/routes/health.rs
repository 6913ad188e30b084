//! Health check endpoint.

use axum::{Json, extract::State};
use dealdesk_types::constants;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// Whether ledger supply and listing reservations reconcile.
    pub invariants_ok: bool,
    pub timestamp: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let invariants_ok = match state.desk.lock().verify_invariants() {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(error = %err, "desk invariant check failed");
            false
        }
    };

    Json(HealthResponse {
        status: if invariants_ok { "healthy" } else { "degraded" },
        service: constants::SERVICE_NAME,
        version: constants::VERSION,
        invariants_ok,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
