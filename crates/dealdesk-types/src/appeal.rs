//! Appeal (dispute) records raised by deal participants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppealId, DealId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppealStatus {
    Pending,
    Resolved,
}

/// Administrative decision closing an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealOutcome {
    /// Pay the buyer out and complete the disputed deal.
    ReleaseToBuyer,
    /// Cancel the disputed deal and return the quantity to the listing.
    CancelDeal,
    /// Close the appeal without touching the deal.
    Dismiss,
}

impl AppealOutcome {
    /// Whether this outcome closes the disputed deal itself.
    #[must_use]
    pub fn settles_deal(self) -> bool {
        matches!(self, Self::ReleaseToBuyer | Self::CancelDeal)
    }
}

impl std::fmt::Display for AppealOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReleaseToBuyer => write!(f, "RELEASE_TO_BUYER"),
            Self::CancelDeal => write!(f, "CANCEL_DEAL"),
            Self::Dismiss => write!(f, "DISMISS"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appeal {
    pub id: AppealId,
    pub deal_id: DealId,
    pub raised_by: UserId,
    pub reason: String,
    pub status: AppealStatus,
    pub outcome: Option<AppealOutcome>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Appeal {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == AppealStatus::Pending
    }
}
