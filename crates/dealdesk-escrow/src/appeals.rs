//! Appeal (dispute) tracker.
//!
//! Participants raise appeals against claimed, disputed or completed deals.
//! Raising one on a claimed deal overlays `DISPUTED`, which blocks release
//! and cancellation until an administrator resolves it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dealdesk_ledger::Ledger;
use dealdesk_types::{
    Appeal, AppealId, AppealOutcome, AppealStatus, DealDeskError, DealId, Result, UserId,
    constants,
};
use tracing::info;

use crate::deals::DealBook;
use crate::listing_store::ListingStore;

#[derive(Debug, Default)]
pub struct AppealTracker {
    appeals: HashMap<AppealId, Appeal>,
    /// Appeals per deal, oldest first.
    by_deal: HashMap<DealId, Vec<AppealId>>,
}

impl AppealTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new pending appeal and dispute the deal if it is claimed.
    ///
    /// # Errors
    /// - `Validation` if `reason` is blank or too long
    /// - `DealNotFound`
    /// - `NotAuthorized` if `actor` is neither buyer nor seller
    /// - `InvalidState` if the deal is pending or cancelled
    pub fn raise(
        &mut self,
        deals: &mut DealBook,
        deal_id: DealId,
        actor: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Appeal> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DealDeskError::validation("appeal reason must not be empty"));
        }
        if reason.len() > constants::MAX_TEXT_LEN {
            return Err(DealDeskError::validation(format!(
                "appeal reason exceeds {} characters",
                constants::MAX_TEXT_LEN
            )));
        }

        let deal = deals.find(deal_id)?;
        if !deal.is_participant(actor) {
            return Err(DealDeskError::not_authorized(format!(
                "user {actor} is not a party to deal {deal_id}"
            )));
        }
        deals.mark_disputed(deal_id)?;

        let appeal = Appeal {
            id: AppealId::new(),
            deal_id,
            raised_by: actor,
            reason: reason.to_string(),
            status: AppealStatus::Pending,
            outcome: None,
            created_at: now,
            resolved_at: None,
        };
        self.by_deal.entry(deal_id).or_default().push(appeal.id);
        self.appeals.insert(appeal.id, appeal.clone());
        info!(appeal = %appeal.id, deal = %deal_id, raised_by = %actor, "appeal raised");
        Ok(appeal)
    }

    /// Close a pending appeal with an administrative outcome.
    ///
    /// - `ReleaseToBuyer`: the disputed deal completes with its payout
    /// - `CancelDeal`: the disputed deal is cancelled, quantity returned
    /// - `Dismiss`: nothing settles; once no other appeal is pending the
    ///   deal goes back to `PAYMENT_CLAIMED`
    ///
    /// If the deal side fails the appeal stays pending.
    ///
    /// # Errors
    /// - `AppealNotFound`
    /// - `InvalidState` if the appeal is already resolved or the deal
    ///   cannot take the outcome
    pub fn resolve(
        &mut self,
        deals: &mut DealBook,
        ledger: &mut Ledger,
        listings: &mut ListingStore,
        appeal_id: AppealId,
        outcome: AppealOutcome,
        now: DateTime<Utc>,
    ) -> Result<Appeal> {
        let appeal = self.find(appeal_id)?;
        if !appeal.is_pending() {
            return Err(DealDeskError::invalid_state(format!(
                "appeal {appeal_id} is already resolved"
            )));
        }
        let deal_id = appeal.deal_id;

        match outcome {
            AppealOutcome::ReleaseToBuyer => {
                deals.resolve_release(ledger, deal_id, now)?;
            }
            AppealOutcome::CancelDeal => {
                deals.resolve_cancel(listings, deal_id, now)?;
            }
            AppealOutcome::Dismiss => {
                if self.pending_for_deal(deal_id) <= 1 {
                    deals.lift_dispute(deal_id)?;
                }
            }
        }

        let appeal = self
            .appeals
            .get_mut(&appeal_id)
            .ok_or(DealDeskError::AppealNotFound(appeal_id))?;
        appeal.status = AppealStatus::Resolved;
        appeal.outcome = Some(outcome);
        appeal.resolved_at = Some(now);
        info!(appeal = %appeal_id, deal = %deal_id, %outcome, "appeal resolved");
        Ok(appeal.clone())
    }

    #[must_use]
    pub fn get(&self, id: AppealId) -> Option<&Appeal> {
        self.appeals.get(&id)
    }

    pub fn find(&self, id: AppealId) -> Result<&Appeal> {
        self.appeals
            .get(&id)
            .ok_or(DealDeskError::AppealNotFound(id))
    }

    /// All appeals of a deal, oldest first.
    #[must_use]
    pub fn for_deal(&self, deal_id: DealId) -> Vec<Appeal> {
        self.by_deal
            .get(&deal_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.appeals.get(id))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn pending_for_deal(&self, deal_id: DealId) -> usize {
        self.for_deal(deal_id)
            .iter()
            .filter(|a| a.is_pending())
            .count()
    }
}
