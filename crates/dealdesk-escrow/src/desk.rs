//! The escrow desk: one owner for every component.
//!
//! Each public method is one atomic unit of work over the ledger, the
//! listing store, the payment methods, the deal book and the appeal
//! tracker. Callers share a desk as `Arc<Mutex<Desk>>`, so a method call
//! is also one critical section.
//!
//! Deal reads and deal operations first expire the deal if its payment
//! window has passed, so an overdue deal is never observed as pending.

use chrono::{DateTime, Duration, Utc};
use dealdesk_ledger::Ledger;
use dealdesk_types::{
    Appeal, AppealId, AppealOutcome, Deal, DealDeskError, DealId, DealState, DeskConfig, LedgerEntry,
    LedgerMovement, Listing, ListingDraft, ListingFilter, ListingId, ListingPatch, ListingStatus,
    MovementKey, PaymentMethod, PaymentMethodId, Result, UserId, WithdrawalId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::appeals::AppealTracker;
use crate::deals::{DealBook, OpenDeal};
use crate::listing_store::{ListingQuote, ListingStore};
use crate::payment_methods::PaymentMethodRegistry;
use crate::pricing::PriceSource;

/// Outcome of a deposit confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositReceipt {
    pub tx_ref: String,
    /// `false` if this transaction was already credited.
    pub credited: bool,
    pub balance: Decimal,
}

/// A withdrawal whose ledger debit has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalTicket {
    pub id: WithdrawalId,
    pub user_id: UserId,
    pub asset: String,
    pub amount: Decimal,
    /// Balance after the debit.
    pub balance: Decimal,
}

pub struct Desk {
    config: DeskConfig,
    ledger: Ledger,
    listings: ListingStore,
    payment_methods: PaymentMethodRegistry,
    deals: DealBook,
    appeals: AppealTracker,
    prices: Box<dyn PriceSource>,
}

impl std::fmt::Debug for Desk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Desk")
            .field("config", &self.config)
            .field("listings", &self.listings.len())
            .field("deals", &self.deals.len())
            .finish_non_exhaustive()
    }
}

fn normalize_asset(asset: &str) -> Result<String> {
    let asset = asset.trim().to_ascii_uppercase();
    if asset.is_empty() {
        return Err(DealDeskError::validation("asset must not be empty"));
    }
    Ok(asset)
}

fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(DealDeskError::validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

impl Desk {
    /// Create an empty desk.
    ///
    /// # Errors
    /// Returns `Configuration` if `config` fails validation.
    pub fn new(config: DeskConfig, prices: Box<dyn PriceSource>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ledger: Ledger::new(),
            listings: ListingStore::new(),
            payment_methods: PaymentMethodRegistry::new(),
            deals: DealBook::new(),
            appeals: AppealTracker::new(),
            prices,
        })
    }

    #[must_use]
    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn post_claim_window(&self) -> Duration {
        Duration::minutes(i64::from(self.config.post_claim_cancel_minutes))
    }

    // =================================================================
    // Listings
    // =================================================================

    pub fn create_listing(
        &mut self,
        owner: UserId,
        draft: ListingDraft,
        now: DateTime<Utc>,
    ) -> Result<Listing> {
        self.listings
            .create(draft, owner, self.config.default_payment_time_minutes, now)
    }

    pub fn update_listing(
        &mut self,
        id: ListingId,
        actor: UserId,
        patch: ListingPatch,
        now: DateTime<Utc>,
    ) -> Result<Listing> {
        self.listings.update(id, actor, patch, now)
    }

    pub fn set_listing_status(
        &mut self,
        id: ListingId,
        actor: UserId,
        status: ListingStatus,
        now: DateTime<Utc>,
    ) -> Result<Listing> {
        self.listings.set_status(id, actor, status, now)
    }

    /// Delete a listing once no open deal references it. Overdue deals
    /// are expired first so they do not block the removal.
    pub fn remove_listing(
        &mut self,
        id: ListingId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<Listing> {
        self.listings.find(id)?;
        self.expire_listing_deals(id, now)?;
        let open = self.deals.open_count_for_listing(id);
        self.listings.remove(id, actor, open)
    }

    pub fn listing(&self, id: ListingId) -> Result<Listing> {
        self.listings.find(id).cloned()
    }

    #[must_use]
    pub fn listings_of(&self, owner: UserId) -> Vec<Listing> {
        self.listings.listings_of(owner)
    }

    /// Search active listings. Overdue deals are expired first so their
    /// reserved quantity is searchable again.
    pub fn search_listings(
        &mut self,
        filter: &ListingFilter,
        now: DateTime<Utc>,
    ) -> Vec<ListingQuote> {
        self.expire_overdue(now);
        self.listings.search(filter, self.prices.as_ref())
    }

    /// Expire the overdue deals of one listing, returning their quantity to it.
    fn expire_listing_deals(&mut self, id: ListingId, now: DateTime<Utc>) -> Result<()> {
        let pending: Vec<DealId> = self.deals.for_listing(id).map(|d| d.id).collect();
        for deal_id in pending {
            self.deals
                .expire_if_overdue(&mut self.listings, deal_id, now)?;
        }
        Ok(())
    }

    // =================================================================
    // Payment methods
    // =================================================================

    pub fn add_payment_method(
        &mut self,
        owner: UserId,
        name: &str,
        details: &str,
    ) -> Result<PaymentMethod> {
        self.payment_methods.add(owner, name, details)
    }

    pub fn set_payment_method_active(
        &mut self,
        id: PaymentMethodId,
        actor: UserId,
        active: bool,
    ) -> Result<PaymentMethod> {
        self.payment_methods.set_active(id, actor, active)
    }

    #[must_use]
    pub fn payment_methods_of(&self, owner: UserId) -> Vec<PaymentMethod> {
        self.payment_methods.list_for(owner)
    }

    // =================================================================
    // Deals
    // =================================================================

    pub fn open_deal(
        &mut self,
        actor: UserId,
        request: OpenDeal,
        now: DateTime<Utc>,
    ) -> Result<Deal> {
        if self.listings.get(request.listing_id).is_some() {
            self.expire_listing_deals(request.listing_id, now)?;
        }
        self.deals.open(
            &mut self.listings,
            &self.payment_methods,
            self.prices.as_ref(),
            actor,
            request,
            now,
        )
    }

    pub fn confirm_payment(&mut self, id: DealId, actor: UserId, now: DateTime<Utc>) -> Result<Deal> {
        self.touch(id, now)?;
        self.deals.confirm_payment(id, actor, now)
    }

    pub fn release(&mut self, id: DealId, actor: UserId, now: DateTime<Utc>) -> Result<Deal> {
        self.touch(id, now)?;
        self.deals.release(&mut self.ledger, id, actor, now)
    }

    pub fn cancel_deal(
        &mut self,
        id: DealId,
        actor: UserId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Deal> {
        let deal = self.deals.find(id)?;
        if !deal.is_participant(actor) {
            return Err(DealDeskError::not_authorized(format!(
                "user {actor} is not a party to deal {id}"
            )));
        }
        // An overdue deal is already cancelled by the time the party asks.
        if self.touch(id, now)? {
            return self.deals.find(id).cloned();
        }
        let window = self.post_claim_window();
        self.deals
            .cancel(&mut self.listings, id, actor, reason, window, now)
    }

    /// Read a deal, expiring it first if overdue.
    pub fn deal(&mut self, id: DealId, now: DateTime<Utc>) -> Result<Deal> {
        self.touch(id, now)?;
        self.deals.find(id).cloned()
    }

    /// A user's deals, newest first, each expired first if overdue.
    pub fn deals_for(&mut self, user: UserId, now: DateTime<Utc>) -> Result<Vec<Deal>> {
        let ids = self.deals.ids_for_user(user);
        ids.into_iter().map(|id| self.deal(id, now)).collect()
    }

    /// Expire every overdue pending deal. Returns the ids that expired.
    pub fn expire_overdue(&mut self, now: DateTime<Utc>) -> Vec<DealId> {
        let expired = self.deals.expire_overdue(&mut self.listings, now);
        if !expired.is_empty() {
            info!(count = expired.len(), "expired overdue deals");
        }
        expired
    }

    /// Expire the deal if overdue. Returns whether it expired just now.
    fn touch(&mut self, id: DealId, now: DateTime<Utc>) -> Result<bool> {
        self.deals.expire_if_overdue(&mut self.listings, id, now)
    }

    // =================================================================
    // Appeals
    // =================================================================

    pub fn raise_appeal(
        &mut self,
        deal_id: DealId,
        actor: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Appeal> {
        self.touch(deal_id, now)?;
        self.appeals
            .raise(&mut self.deals, deal_id, actor, reason, now)
    }

    pub fn resolve_appeal(
        &mut self,
        appeal_id: AppealId,
        outcome: AppealOutcome,
        now: DateTime<Utc>,
    ) -> Result<Appeal> {
        self.appeals.resolve(
            &mut self.deals,
            &mut self.ledger,
            &mut self.listings,
            appeal_id,
            outcome,
            now,
        )
    }

    /// Appeals of a deal, oldest first.
    pub fn appeals_for_deal(&self, deal_id: DealId) -> Result<Vec<Appeal>> {
        self.deals.find(deal_id)?;
        Ok(self.appeals.for_deal(deal_id))
    }

    // =================================================================
    // Wallet-side ledger movements
    // =================================================================

    #[must_use]
    pub fn balances(&self, user: UserId) -> Vec<LedgerEntry> {
        self.ledger.balances_of(user)
    }

    /// Credit a confirmed on-chain deposit, at most once per `tx_ref`.
    pub fn confirm_deposit(
        &mut self,
        user: UserId,
        asset: &str,
        amount: Decimal,
        tx_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<DepositReceipt> {
        let asset = normalize_asset(asset)?;
        ensure_positive(amount)?;
        let tx_ref = tx_ref.trim();
        if tx_ref.is_empty() {
            return Err(DealDeskError::validation("transaction reference must not be empty"));
        }

        let movement = LedgerMovement::new(MovementKey::deposit(tx_ref), user, &asset, amount, now);
        match self.ledger.apply(movement) {
            Ok(balance) => Ok(DepositReceipt {
                tx_ref: tx_ref.to_string(),
                credited: true,
                balance,
            }),
            Err(DealDeskError::DuplicateMovement(key)) => {
                warn!(%key, user = %user, "deposit already credited");
                Ok(DepositReceipt {
                    tx_ref: tx_ref.to_string(),
                    credited: false,
                    balance: self.ledger.balance(user, &asset),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Debit a withdrawal before the on-chain transfer is attempted.
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if the balance is too low.
    pub fn debit_withdrawal(
        &mut self,
        user: UserId,
        asset: &str,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalTicket> {
        let asset = normalize_asset(asset)?;
        ensure_positive(amount)?;
        let id = WithdrawalId::new();
        let balance = self.ledger.apply(LedgerMovement::new(
            MovementKey::withdrawal(id),
            user,
            &asset,
            amount,
            now,
        ))?;
        info!(withdrawal = %id, user = %user, %asset, %amount, "withdrawal debited");
        Ok(WithdrawalTicket {
            id,
            user_id: user,
            asset,
            amount,
            balance,
        })
    }

    /// Credit back a withdrawal whose transfer failed. At most once per ticket.
    pub fn refund_withdrawal(
        &mut self,
        ticket: &WithdrawalTicket,
        now: DateTime<Utc>,
    ) -> Result<Decimal> {
        let balance = self.ledger.apply(LedgerMovement::new(
            MovementKey::withdrawal_refund(ticket.id),
            ticket.user_id,
            &ticket.asset,
            ticket.amount,
            now,
        ))?;
        warn!(withdrawal = %ticket.id, user = %ticket.user_id, "withdrawal refunded");
        Ok(balance)
    }

    // =================================================================
    // Invariants
    // =================================================================

    /// Check the ledger supply and, for every listing, that its reserved
    /// quantity equals the quantity held by its non-cancelled deals.
    ///
    /// # Errors
    /// Returns `SupplyInvariantViolation` or `Internal` on the first breach.
    pub fn verify_invariants(&self) -> Result<()> {
        self.ledger.verify_all()?;
        self.listings
            .iter()
            .try_for_each(|listing| self.verify_listing(listing))
    }

    fn verify_listing(&self, listing: &Listing) -> Result<()> {
        if listing.available_quantity < Decimal::ZERO
            || listing.available_quantity > listing.original_quantity
        {
            return Err(DealDeskError::Internal(format!(
                "listing {} available {} outside [0, {}]",
                listing.id, listing.available_quantity, listing.original_quantity
            )));
        }
        let held: Decimal = self
            .deals
            .for_listing(listing.id)
            .filter(|d| d.state != DealState::Cancelled)
            .map(|d| d.quantity)
            .sum();
        if held != listing.reserved_quantity() {
            return Err(DealDeskError::Internal(format!(
                "listing {} reserves {} but deals hold {held}",
                listing.id,
                listing.reserved_quantity()
            )));
        }
        Ok(())
    }
}
