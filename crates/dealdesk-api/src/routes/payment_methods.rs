//! Payment method endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use dealdesk_types::{PaymentMethod, PaymentMethodId};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, actor::Actor, error::ApiResult};

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct AddPaymentMethodRequest {
    /// Method name as listings reference it, e.g. `SBP`.
    pub name: String,
    /// Where the buyer sends fiat (account, phone number).
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentMethodStatusRequest {
    pub active: bool,
}

// ============ Handlers ============

/// GET /p2p/payment-methods
pub async fn list_payment_methods(
    State(state): State<AppState>,
    Actor(user): Actor,
) -> Json<Vec<PaymentMethod>> {
    Json(state.desk.lock().payment_methods_of(user))
}

/// POST /p2p/payment-methods
pub async fn add_payment_method(
    State(state): State<AppState>,
    Actor(user): Actor,
    Json(request): Json<AddPaymentMethodRequest>,
) -> ApiResult<(StatusCode, Json<PaymentMethod>)> {
    let method = state
        .desk
        .lock()
        .add_payment_method(user, &request.name, &request.details)?;
    Ok((StatusCode::CREATED, Json(method)))
}

/// PUT /p2p/payment-methods/:id/status
pub async fn set_payment_method_status(
    State(state): State<AppState>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<PaymentMethodStatusRequest>,
) -> ApiResult<Json<PaymentMethod>> {
    let method = state.desk.lock().set_payment_method_active(
        PaymentMethodId::from(id),
        user,
        request.active,
    )?;
    Ok(Json(method))
}
