//! # Deal: the escrow lifecycle record
//!
//! A `Deal` ties a listing to a buyer/seller pair. Quantity, unit price and
//! fiat total are snapshotted at creation and never change afterwards.
//!
//! ## State Machine
//!
//! ```text
//!   PENDING_PAYMENT ──confirm──▶ PAYMENT_CLAIMED ──release──▶ COMPLETED
//!         │                        │         │                    ▲
//!         │ cancel / timeout       │ cancel  │ appeal             │ resolve
//!         ▼                        ▼         ▼                    │
//!     CANCELLED ◀──────────────────┘     DISPUTED ────────────────┘
//!         ▲                                  │
//!         └────────────── resolve ───────────┘
//! ```
//!
//! `COMPLETED` and `CANCELLED` are terminal. `DISPUTED` is an overlay on a
//! claimed deal: dismissing the last pending appeal lifts it back to
//! `PAYMENT_CLAIMED`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DealId, ListingId, PaymentMethodId, UserId};

/// The lifecycle state of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealState {
    /// Quantity reserved; waiting for the buyer to pay fiat.
    PendingPayment,
    /// The buyer says the fiat was sent; waiting for the seller to release.
    PaymentClaimed,
    /// An appeal is open against a claimed deal.
    Disputed,
    /// The asset was credited to the buyer. **Terminal.**
    Completed,
    /// The reservation was returned to the listing. **Terminal.**
    Cancelled,
}

impl DealState {
    /// Can a deal move from this state to `target`?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (
                Self::PendingPayment,
                Self::PaymentClaimed | Self::Cancelled
            ) | (
                Self::PaymentClaimed,
                Self::Completed | Self::Cancelled | Self::Disputed
            ) | (
                Self::Disputed,
                Self::Completed | Self::Cancelled | Self::PaymentClaimed
            )
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for DealState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingPayment => write!(f, "PENDING_PAYMENT"),
            Self::PaymentClaimed => write!(f, "PAYMENT_CLAIMED"),
            Self::Disputed => write!(f, "DISPUTED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Which side of a deal a participant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealParty {
    Buyer,
    Seller,
}

impl DealParty {
    #[must_use]
    pub fn counterparty(self) -> Self {
        match self {
            Self::Buyer => Self::Seller,
            Self::Seller => Self::Buyer,
        }
    }
}

impl std::fmt::Display for DealParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buyer => write!(f, "buyer"),
            Self::Seller => write!(f, "seller"),
        }
    }
}

/// Payment method details copied into the deal when it opens, so later
/// edits to the method do not change what the buyer was told to pay to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodSnapshot {
    pub id: PaymentMethodId,
    pub name: String,
    pub details: String,
}

/// An escrow deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: DealId,
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub asset: String,
    pub fiat_currency: String,
    /// Fixed at creation.
    pub quantity: Decimal,
    pub unit_price_snapshot: Decimal,
    pub fiat_total: Decimal,
    pub payment_method: PaymentMethodSnapshot,
    pub state: DealState,
    pub created_at: DateTime<Utc>,
    pub payment_deadline: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    /// First party to ask for cancellation of a claimed deal.
    pub cancel_requested_by: Option<DealParty>,
}

impl Deal {
    /// The role `user` plays in this deal, if any.
    #[must_use]
    pub fn party_of(&self, user: UserId) -> Option<DealParty> {
        if user == self.buyer_id {
            Some(DealParty::Buyer)
        } else if user == self.seller_id {
            Some(DealParty::Seller)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_participant(&self, user: UserId) -> bool {
        self.party_of(user).is_some()
    }

    /// Whether the payment window elapsed while the deal still awaits payment.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.state == DealState::PendingPayment && now > self.payment_deadline
    }
}
