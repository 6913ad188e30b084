//! Appeal endpoints: raise, list, resolve.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use dealdesk_types::{Appeal, AppealId, AppealOutcome, DealId};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    actor::{Actor, Admin},
    error::ApiResult,
    routes::deals::ensure_can_view,
};

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct RaiseAppealRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveAppealRequest {
    pub outcome: AppealOutcome,
}

// ============ Handlers ============

/// POST /p2p/deals/:id/appeal
///
/// Disputes a claimed deal; release is blocked until an admin resolves it.
pub async fn raise_appeal(
    State(state): State<AppState>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<RaiseAppealRequest>,
) -> ApiResult<(StatusCode, Json<Appeal>)> {
    let appeal = state.desk.lock().raise_appeal(
        DealId::from(id),
        user,
        &request.reason,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(appeal)))
}

/// GET /p2p/deals/:id/appeals
pub async fn deal_appeals(
    State(state): State<AppState>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Appeal>>> {
    let deal_id = DealId::from(id);
    let mut desk = state.desk.lock();
    let deal = desk.deal(deal_id, Utc::now())?;
    ensure_can_view(&state, &deal, user)?;
    Ok(Json(desk.appeals_for_deal(deal_id)?))
}

/// PUT /p2p/appeals/:id/resolve
pub async fn resolve_appeal(
    State(state): State<AppState>,
    Admin(admin): Admin,
    Path(id): Path<Uuid>,
    Json(request): Json<ResolveAppealRequest>,
) -> ApiResult<Json<Appeal>> {
    let appeal = state
        .desk
        .lock()
        .resolve_appeal(AppealId::from(id), request.outcome, Utc::now())?;
    tracing::info!(appeal = %appeal.id, admin = %admin, outcome = %request.outcome, "appeal resolved");
    Ok(Json(appeal))
}
