//! Listing endpoints: search, create, edit, activate, delete.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use dealdesk_escrow::ListingQuote;
use dealdesk_types::{Listing, ListingDraft, ListingFilter, ListingId, ListingPatch, ListingSide, ListingStatus};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, actor::Actor, error::{ApiError, ApiResult}};

// ============ Request/Response Types ============

/// Search filter; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchListingsRequest {
    pub asset: Option<String>,
    pub fiat_currency: Option<String>,
    pub payment_method: Option<String>,
    /// Fiat amount the caller wants to trade; must fall within the limits.
    pub amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ListingStatusRequest {
    pub status: ListingStatus,
}

// ============ Handlers ============

/// POST /p2p/listings/:side
///
/// Best price first: cheapest sell listings, highest buy listings.
pub async fn search_listings(
    State(state): State<AppState>,
    Actor(_user): Actor,
    Path(side): Path<String>,
    body: Option<Json<SearchListingsRequest>>,
) -> ApiResult<Json<Vec<ListingQuote>>> {
    let side = ListingSide::parse(&side)
        .ok_or_else(|| ApiError::BadRequest(format!("side must be buy or sell, got '{side}'")))?;
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let filter = ListingFilter {
        side,
        asset: request.asset,
        fiat_currency: request.fiat_currency,
        payment_method: request.payment_method,
        fiat_amount: request.amount,
    };

    let quotes = state.desk.lock().search_listings(&filter, Utc::now());
    Ok(Json(quotes))
}

/// GET /p2p/ads
pub async fn my_listings(
    State(state): State<AppState>,
    Actor(user): Actor,
) -> Json<Vec<Listing>> {
    Json(state.desk.lock().listings_of(user))
}

/// GET /p2p/ads/:id
pub async fn get_listing(
    State(state): State<AppState>,
    Actor(_user): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Listing>> {
    let listing = state.desk.lock().listing(ListingId::from(id))?;
    Ok(Json(listing))
}

/// POST /p2p/ads
pub async fn create_listing(
    State(state): State<AppState>,
    Actor(user): Actor,
    Json(draft): Json<ListingDraft>,
) -> ApiResult<(StatusCode, Json<Listing>)> {
    let listing = state.desk.lock().create_listing(user, draft, Utc::now())?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// PUT /p2p/ads/:id
pub async fn update_listing(
    State(state): State<AppState>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
    Json(patch): Json<ListingPatch>,
) -> ApiResult<Json<Listing>> {
    let listing = state
        .desk
        .lock()
        .update_listing(ListingId::from(id), user, patch, Utc::now())?;
    Ok(Json(listing))
}

/// PUT /p2p/ads/:id/status
pub async fn set_listing_status(
    State(state): State<AppState>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<ListingStatusRequest>,
) -> ApiResult<Json<Listing>> {
    let listing = state.desk.lock().set_listing_status(
        ListingId::from(id),
        user,
        request.status,
        Utc::now(),
    )?;
    Ok(Json(listing))
}

/// DELETE /p2p/ads/:id
///
/// Refused with 409 while an open deal still holds part of the listing.
pub async fn delete_listing(
    State(state): State<AppState>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Listing>> {
    let removed = state
        .desk
        .lock()
        .remove_listing(ListingId::from(id), user, Utc::now())?;
    Ok(Json(removed))
}
