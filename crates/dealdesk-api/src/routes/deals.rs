//! Deal lifecycle endpoints.
//!
//! Every read or write expires the deal first if its payment window has
//! passed, so responses never show an overdue deal as pending.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use dealdesk_escrow::OpenDeal;
use dealdesk_types::{Deal, DealDeskError, DealId, ListingId, PaymentMethodId, UserId};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, actor::Actor, error::ApiResult};

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDealRequest {
    /// Listing to trade against.
    pub ad_id: Uuid,
    /// Crypto quantity.
    pub amount: Decimal,
    /// Fiat total the client was shown; rejected if the price has moved.
    #[serde(default)]
    pub total_price: Option<Decimal>,
    pub payment_method_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CancelDealRequest {
    pub reason: Option<String>,
}

/// Participants and admins may look at a deal.
pub(crate) fn ensure_can_view(state: &AppState, deal: &Deal, user: UserId) -> ApiResult<()> {
    if deal.is_participant(user) || state.config.is_admin(user) {
        Ok(())
    } else {
        Err(DealDeskError::not_authorized("only deal participants may view this deal").into())
    }
}

// ============ Handlers ============

/// GET /p2p/deals
///
/// Deals where the caller is buyer or seller, newest first.
pub async fn my_deals(
    State(state): State<AppState>,
    Actor(user): Actor,
) -> ApiResult<Json<Vec<Deal>>> {
    let deals = state.desk.lock().deals_for(user, Utc::now())?;
    Ok(Json(deals))
}

/// GET /p2p/deals/:id
pub async fn get_deal(
    State(state): State<AppState>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Deal>> {
    let deal = state.desk.lock().deal(DealId::from(id), Utc::now())?;
    ensure_can_view(&state, &deal, user)?;
    Ok(Json(deal))
}

/// POST /p2p/deals
///
/// Reserves `amount` from the listing. The caller takes the side opposite
/// to the listing.
pub async fn open_deal(
    State(state): State<AppState>,
    Actor(user): Actor,
    Json(request): Json<OpenDealRequest>,
) -> ApiResult<(StatusCode, Json<Deal>)> {
    let open = OpenDeal {
        listing_id: ListingId::from(request.ad_id),
        quantity: request.amount,
        payment_method_id: PaymentMethodId::from(request.payment_method_id),
        expected_fiat_total: request.total_price,
    };
    let deal = state.desk.lock().open_deal(user, open, Utc::now())?;
    Ok((StatusCode::CREATED, Json(deal)))
}

/// PUT /p2p/deals/:id/confirm-payment
pub async fn confirm_payment(
    State(state): State<AppState>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Deal>> {
    let deal = state
        .desk
        .lock()
        .confirm_payment(DealId::from(id), user, Utc::now())?;
    Ok(Json(deal))
}

/// PUT /p2p/deals/:id/release
pub async fn release(
    State(state): State<AppState>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Deal>> {
    let deal = state
        .desk
        .lock()
        .release(DealId::from(id), user, Utc::now())?;
    Ok(Json(deal))
}

/// PUT /p2p/deals/:id/cancel
///
/// After a payment claim the first caller only records a request; the deal
/// is cancelled once the counterparty agrees or the claim window elapses.
pub async fn cancel_deal(
    State(state): State<AppState>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelDealRequest>>,
) -> ApiResult<Json<Deal>> {
    let reason = body.and_then(|Json(r)| r.reason);
    let deal = state
        .desk
        .lock()
        .cancel_deal(DealId::from(id), user, reason, Utc::now())?;
    Ok(Json(deal))
}
