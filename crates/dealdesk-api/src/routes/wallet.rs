//! Wallet endpoints: balances, deposit addresses, deposits and withdrawals.
//!
//! A withdrawal debits the ledger first, then calls the wallet outside the
//! desk lock. If the transfer fails the debit is refunded under its own
//! movement key.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use dealdesk_escrow::DepositReceipt;
use dealdesk_types::{DealDeskError, LedgerEntry, UserId, WithdrawalId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    actor::{Actor, Admin},
    error::ApiResult,
};

// ============ Request/Response Types ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user_id: UserId,
    pub balances: Vec<LedgerEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositAddressResponse {
    pub currency: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub currency: String,
    pub amount: Decimal,
    pub address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawResponse {
    pub withdrawal_id: WithdrawalId,
    pub currency: String,
    pub amount: Decimal,
    pub tx_hash: String,
    pub balance: Decimal,
}

/// Deposit notification from the chain watcher.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDepositRequest {
    pub user_id: Uuid,
    pub currency: String,
    pub amount: Decimal,
    pub tx_ref: String,
}

fn ensure_supported(state: &AppState, currency: &str) -> ApiResult<String> {
    let currency = currency.trim().to_ascii_uppercase();
    if state.config.supports_asset(&currency) {
        Ok(currency)
    } else {
        Err(DealDeskError::validation(format!("unsupported currency '{currency}'")).into())
    }
}

// ============ Handlers ============

/// GET /wallet/balance
pub async fn balance(State(state): State<AppState>, Actor(user): Actor) -> Json<BalanceResponse> {
    let balances = state.desk.lock().balances(user);
    Json(BalanceResponse {
        user_id: user,
        balances,
    })
}

/// GET /wallet/deposit-address/:currency
pub async fn deposit_address(
    State(state): State<AppState>,
    Actor(user): Actor,
    Path(currency): Path<String>,
) -> ApiResult<Json<DepositAddressResponse>> {
    let currency = ensure_supported(&state, &currency)?;
    let address = state.wallet.deposit_address(user, &currency).await?;
    Ok(Json(DepositAddressResponse { currency, address }))
}

/// POST /wallet/deposits
///
/// Credits a confirmed on-chain deposit. Replaying the same `txRef`
/// returns the current balance with `credited: false`.
pub async fn confirm_deposit(
    State(state): State<AppState>,
    Admin(_admin): Admin,
    Json(request): Json<ConfirmDepositRequest>,
) -> ApiResult<Json<DepositReceipt>> {
    let currency = ensure_supported(&state, &request.currency)?;
    let receipt = state.desk.lock().confirm_deposit(
        UserId(request.user_id),
        &currency,
        request.amount,
        &request.tx_ref,
        Utc::now(),
    )?;
    Ok(Json(receipt))
}

/// POST /wallet/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Actor(user): Actor,
    Json(request): Json<WithdrawRequest>,
) -> ApiResult<Json<WithdrawResponse>> {
    let currency = ensure_supported(&state, &request.currency)?;
    let address = request.address.trim();
    if address.is_empty() {
        return Err(DealDeskError::validation("withdrawal address must not be empty").into());
    }

    let ticket = state
        .desk
        .lock()
        .debit_withdrawal(user, &currency, request.amount, Utc::now())?;

    match state.wallet.transfer(&currency, address, ticket.amount).await {
        Ok(tx_hash) => {
            tracing::info!(withdrawal = %ticket.id, %tx_hash, "withdrawal sent");
            Ok(Json(WithdrawResponse {
                withdrawal_id: ticket.id,
                currency,
                amount: ticket.amount,
                tx_hash,
                balance: ticket.balance,
            }))
        }
        Err(err) => {
            tracing::warn!(withdrawal = %ticket.id, error = %err, "transfer failed, refunding");
            state.desk.lock().refund_withdrawal(&ticket, Utc::now())?;
            Err(err.into())
        }
    }
}
