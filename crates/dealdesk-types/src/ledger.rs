//! Ledger types: balances and keyed balance movements.
//!
//! A [`LedgerEntry`] holds one user's balance of one asset. It changes only
//! through a [`LedgerMovement`] whose [`MovementKey`] is unique, so a deposit
//! confirmation or a deal payout applied twice is rejected rather than
//! credited twice.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DealId, UserId, WithdrawalId};

/// Type alias for asset identifiers (e.g., "BTC", "USDT", "TON").
pub type Asset = String;

/// A single balance row for a (user, asset) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub user_id: UserId,
    pub asset: Asset,
    /// Never negative.
    pub balance: Decimal,
    /// Incremented on every mutation; used for compare-and-swap debits.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// A zero balance that has never been touched.
    #[must_use]
    pub fn empty(user_id: UserId, asset: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            asset: asset.to_string(),
            balance: Decimal::ZERO,
            version: 0,
            updated_at: now,
        }
    }
}

/// Whether a movement adds to or removes from a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

/// Why a balance moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Confirmed on-chain deposit.
    Deposit,
    /// Debit for an outgoing on-chain withdrawal.
    Withdrawal,
    /// Compensating credit when a withdrawal transfer failed.
    WithdrawalRefund,
    /// Payout to the buyer when a deal completes.
    DealRelease,
}

impl MovementKind {
    #[must_use]
    pub fn direction(self) -> Direction {
        match self {
            Self::Withdrawal => Direction::Debit,
            Self::Deposit | Self::WithdrawalRefund | Self::DealRelease => Direction::Credit,
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deposit => write!(f, "deposit"),
            Self::Withdrawal => write!(f, "withdrawal"),
            Self::WithdrawalRefund => write!(f, "withdrawal_refund"),
            Self::DealRelease => write!(f, "deal_release"),
        }
    }
}

/// Uniqueness key of a movement: at most one movement per key is ever applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MovementKey {
    pub kind: MovementKind,
    pub reference: String,
}

impl MovementKey {
    /// Deposit keyed by the external transaction reference (tx hash).
    #[must_use]
    pub fn deposit(tx_ref: &str) -> Self {
        Self {
            kind: MovementKind::Deposit,
            reference: tx_ref.trim().to_string(),
        }
    }

    #[must_use]
    pub fn withdrawal(id: WithdrawalId) -> Self {
        Self {
            kind: MovementKind::Withdrawal,
            reference: id.0.to_string(),
        }
    }

    #[must_use]
    pub fn withdrawal_refund(id: WithdrawalId) -> Self {
        Self {
            kind: MovementKind::WithdrawalRefund,
            reference: id.0.to_string(),
        }
    }

    /// The single payout a deal may ever produce.
    #[must_use]
    pub fn deal_release(id: DealId) -> Self {
        Self {
            kind: MovementKind::DealRelease,
            reference: id.0.to_string(),
        }
    }
}

impl std::fmt::Display for MovementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.reference)
    }
}

/// A balance change recorded in the ledger journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerMovement {
    pub key: MovementKey,
    pub user_id: UserId,
    pub asset: Asset,
    /// Always positive; the sign comes from the key's kind.
    pub amount: Decimal,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerMovement {
    #[must_use]
    pub fn new(
        key: MovementKey,
        user_id: UserId,
        asset: &str,
        amount: Decimal,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            user_id,
            asset: asset.to_string(),
            amount,
            recorded_at,
        }
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.key.kind.direction()
    }
}
