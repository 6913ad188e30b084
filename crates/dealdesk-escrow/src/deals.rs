//! Deal state machine.
//!
//! Every transition goes through [`DealBook::transition`], a compare-and-swap
//! on the expected current state. Preconditions are checked before anything
//! is mutated, so a rejected call leaves the deal, the listing and the
//! ledger exactly as they were.
//!
//! Cross-component effects follow one order: the listing or ledger side is
//! applied first, the deal state is written last. The only fallible step
//! after a listing/ledger mutation is the CAS itself, which cannot fail
//! under the `&mut` borrow that checked it.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use dealdesk_ledger::Ledger;
use dealdesk_types::{
    Deal, DealDeskError, DealId, DealParty, DealState, LedgerMovement, ListingId, ListingSide,
    MovementKey, PaymentMethodId, Result, UserId, constants,
};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::listing_store::ListingStore;
use crate::payment_methods::PaymentMethodRegistry;
use crate::pricing::{PriceSource, fiat_total, resolve_unit_price, round_fiat};

/// A request to open a deal against a listing.
#[derive(Debug, Clone)]
pub struct OpenDeal {
    pub listing_id: ListingId,
    /// Crypto quantity to trade.
    pub quantity: Decimal,
    /// The seller's payment method the buyer will pay into.
    pub payment_method_id: PaymentMethodId,
    /// Fiat total the client saw; a mismatch means the price moved.
    pub expected_fiat_total: Option<Decimal>,
}

/// All deals, indexed by id.
#[derive(Debug, Default)]
pub struct DealBook {
    deals: HashMap<DealId, Deal>,
    /// Creation order.
    order: Vec<DealId>,
}

fn clean_reason(reason: Option<String>) -> Result<Option<String>> {
    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    if reason
        .as_ref()
        .is_some_and(|r| r.len() > constants::MAX_TEXT_LEN)
    {
        return Err(DealDeskError::validation(format!(
            "reason exceeds {} characters",
            constants::MAX_TEXT_LEN
        )));
    }
    Ok(reason)
}

impl DealBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =================================================================
    // Open
    // =================================================================

    /// Open a deal: validate against the listing, snapshot the price and
    /// payment method, reserve quantity, create the deal in
    /// `PENDING_PAYMENT`.
    ///
    /// The actor takes the side opposite to the listing.
    ///
    /// # Errors
    /// - `ListingNotFound`, or `InvalidState` if the listing is inactive
    /// - `SelfDeal` if the actor owns the listing
    /// - `InvalidQuantity` if the quantity is non-positive or the fiat
    ///   total falls outside the listing limits
    /// - `PaymentMethodNotFound` / `InvalidPaymentMethod`
    /// - `PriceUnavailable` for a market-relative listing without reference
    /// - `PriceMismatch` if the expected total differs from the snapshot
    /// - `InsufficientListingQuantity` if the reservation fails
    #[allow(clippy::too_many_lines)]
    pub fn open(
        &mut self,
        listings: &mut ListingStore,
        methods: &PaymentMethodRegistry,
        prices: &dyn PriceSource,
        actor: UserId,
        request: OpenDeal,
        now: DateTime<Utc>,
    ) -> Result<Deal> {
        let listing = listings.find(request.listing_id)?;
        if !listing.is_active() {
            return Err(DealDeskError::invalid_state(format!(
                "listing {} is {}",
                listing.id, listing.status
            )));
        }
        if listing.owner_id == actor {
            return Err(DealDeskError::SelfDeal);
        }

        let quantity = request.quantity;
        if quantity <= Decimal::ZERO {
            return Err(DealDeskError::InvalidQuantity {
                reason: format!("quantity must be positive, got {quantity}"),
            });
        }
        if quantity.scale() > constants::QTY_PRECISION {
            return Err(DealDeskError::InvalidQuantity {
                reason: format!(
                    "quantity {quantity} has more than {} decimal places",
                    constants::QTY_PRECISION
                ),
            });
        }
        if quantity > listing.available_quantity {
            return Err(DealDeskError::InsufficientListingQuantity {
                requested: quantity,
                available: listing.available_quantity,
            });
        }

        let (buyer_id, seller_id) = match listing.side {
            ListingSide::Sell => (actor, listing.owner_id),
            ListingSide::Buy => (listing.owner_id, actor),
        };

        let method = methods.find(request.payment_method_id)?;
        if !method.active {
            return Err(DealDeskError::InvalidPaymentMethod {
                reason: format!("payment method {} is inactive", method.id),
            });
        }
        if method.owner_id != seller_id {
            return Err(DealDeskError::InvalidPaymentMethod {
                reason: format!("payment method {} does not belong to the seller", method.id),
            });
        }
        if !listing.accepts_method(&method.name) {
            return Err(DealDeskError::InvalidPaymentMethod {
                reason: format!("listing {} does not accept {}", listing.id, method.name),
            });
        }

        let unit_price =
            resolve_unit_price(&listing.price, &listing.asset, &listing.fiat_currency, prices)?;
        let total = fiat_total(quantity, unit_price)?;
        if !listing.fiat_within_limits(total) {
            return Err(DealDeskError::InvalidQuantity {
                reason: format!(
                    "fiat total {total} outside limits [{}, {}]",
                    listing.min_fiat,
                    listing
                        .max_fiat
                        .map_or_else(|| "unbounded".to_string(), |m| m.to_string())
                ),
            });
        }
        if let Some(expected) = request.expected_fiat_total {
            if round_fiat(expected) != total {
                return Err(DealDeskError::PriceMismatch {
                    expected,
                    actual: total,
                });
            }
        }

        let deal = Deal {
            id: DealId::new(),
            listing_id: listing.id,
            buyer_id,
            seller_id,
            asset: listing.asset.clone(),
            fiat_currency: listing.fiat_currency.clone(),
            quantity,
            unit_price_snapshot: unit_price,
            fiat_total: total,
            payment_method: method.snapshot(),
            state: DealState::PendingPayment,
            created_at: now,
            payment_deadline: now + Duration::minutes(i64::from(listing.payment_time_minutes)),
            claimed_at: None,
            closed_at: None,
            cancellation_reason: None,
            cancel_requested_by: None,
        };

        listings.reserve(deal.listing_id, quantity, now)?;

        self.order.push(deal.id);
        self.deals.insert(deal.id, deal.clone());
        info!(
            deal = %deal.id,
            listing = %deal.listing_id,
            buyer = %buyer_id,
            seller = %seller_id,
            %quantity,
            fiat_total = %total,
            "deal opened"
        );
        Ok(deal)
    }

    // =================================================================
    // Participant transitions
    // =================================================================

    /// Buyer marks the fiat payment as sent.
    ///
    /// Idempotent from `PAYMENT_CLAIMED`.
    ///
    /// # Errors
    /// - `NotAuthorized` if `actor` is not the buyer
    /// - `InvalidState` from any other state, or once the payment window
    ///   has elapsed
    pub fn confirm_payment(&mut self, id: DealId, actor: UserId, now: DateTime<Utc>) -> Result<Deal> {
        let deal = self.find(id)?;
        if deal.buyer_id != actor {
            return Err(DealDeskError::not_authorized(format!(
                "only the buyer can confirm payment on deal {id}"
            )));
        }
        match deal.state {
            DealState::PaymentClaimed => {
                debug!(deal = %id, "payment already claimed");
                return Ok(deal.clone());
            }
            DealState::PendingPayment if deal.is_overdue(now) => {
                return Err(DealDeskError::invalid_state(format!(
                    "payment window of deal {id} elapsed at {}",
                    deal.payment_deadline
                )));
            }
            DealState::PendingPayment => {}
            state => {
                return Err(DealDeskError::invalid_state(format!(
                    "deal {id} is {state}, payment can only be confirmed while PENDING_PAYMENT"
                )));
            }
        }

        self.transition(id, DealState::PendingPayment, DealState::PaymentClaimed, |deal| {
            deal.claimed_at = Some(now);
        })
    }

    /// Seller releases the crypto: the buyer is credited once and the deal
    /// completes.
    ///
    /// A repeated release of a completed deal succeeds without crediting.
    ///
    /// # Errors
    /// - `NotAuthorized` if `actor` is not the seller
    /// - `InvalidState` unless the deal is `PAYMENT_CLAIMED`
    pub fn release(
        &mut self,
        ledger: &mut Ledger,
        id: DealId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<Deal> {
        let deal = self.find(id)?;
        if deal.seller_id != actor {
            return Err(DealDeskError::not_authorized(format!(
                "only the seller can release deal {id}"
            )));
        }
        match deal.state {
            DealState::Completed => {
                debug!(deal = %id, "deal already released");
                Ok(deal.clone())
            }
            DealState::PaymentClaimed => self.settle_to_buyer(ledger, id, DealState::PaymentClaimed, now),
            state => Err(DealDeskError::invalid_state(format!(
                "deal {id} is {state}, release requires PAYMENT_CLAIMED"
            ))),
        }
    }

    /// Cancel a deal on behalf of a participant.
    ///
    /// From `PENDING_PAYMENT` either party cancels at once. From
    /// `PAYMENT_CLAIMED` the first call records a cancel request and the
    /// deal stays claimed; it is cancelled when the counterparty agrees or
    /// once `post_claim_window` has passed since the claim.
    ///
    /// # Errors
    /// - `NotAuthorized` if `actor` is not a participant
    /// - `InvalidState` for disputed or terminal deals
    pub fn cancel(
        &mut self,
        listings: &mut ListingStore,
        id: DealId,
        actor: UserId,
        reason: Option<String>,
        post_claim_window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Deal> {
        let deal = self.find(id)?;
        let party = deal.party_of(actor).ok_or_else(|| {
            DealDeskError::not_authorized(format!("user {actor} is not a party to deal {id}"))
        })?;
        let reason = clean_reason(reason)?;

        match deal.state {
            DealState::PendingPayment => {
                let reason = reason.unwrap_or_else(|| format!("cancelled by {party}"));
                self.close_cancelled(listings, id, DealState::PendingPayment, reason, now)
            }
            DealState::PaymentClaimed => {
                let window_elapsed = deal
                    .claimed_at
                    .is_some_and(|claimed| now >= claimed + post_claim_window);
                let counterparty_agreed = deal.cancel_requested_by == Some(party.counterparty());

                if counterparty_agreed {
                    let reason = reason.unwrap_or_else(|| "cancelled by mutual agreement".into());
                    self.close_cancelled(listings, id, DealState::PaymentClaimed, reason, now)
                } else if window_elapsed {
                    let reason =
                        reason.unwrap_or_else(|| format!("cancelled by {party} after claim window"));
                    self.close_cancelled(listings, id, DealState::PaymentClaimed, reason, now)
                } else if deal.cancel_requested_by == Some(party) {
                    Ok(deal.clone())
                } else {
                    let deal = self.get_mut(id)?;
                    deal.cancel_requested_by = Some(party);
                    info!(deal = %id, %party, "cancellation requested, awaiting counterparty");
                    Ok(deal.clone())
                }
            }
            state => Err(DealDeskError::invalid_state(format!(
                "deal {id} is {state} and cannot be cancelled"
            ))),
        }
    }

    // =================================================================
    // Expiry
    // =================================================================

    /// Cancel the deal with reason `"timeout"` if it is still
    /// `PENDING_PAYMENT` past its deadline. Returns whether it expired.
    pub fn expire_if_overdue(
        &mut self,
        listings: &mut ListingStore,
        id: DealId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if !self.find(id)?.is_overdue(now) {
            return Ok(false);
        }
        self.close_cancelled(
            listings,
            id,
            DealState::PendingPayment,
            constants::TIMEOUT_REASON.to_string(),
            now,
        )?;
        warn!(deal = %id, "deal expired unpaid");
        Ok(true)
    }

    /// Expire every overdue deal. Returns the ids that expired.
    pub fn expire_overdue(&mut self, listings: &mut ListingStore, now: DateTime<Utc>) -> Vec<DealId> {
        let overdue: Vec<DealId> = self
            .order
            .iter()
            .filter(|id| self.deals.get(*id).is_some_and(|d| d.is_overdue(now)))
            .copied()
            .collect();

        overdue
            .into_iter()
            .filter(|id| match self.expire_if_overdue(listings, *id, now) {
                Ok(expired) => expired,
                Err(err) => {
                    error!(deal = %id, %err, "failed to expire deal");
                    false
                }
            })
            .collect()
    }

    // =================================================================
    // Dispute handling (driven by the appeal tracker)
    // =================================================================

    /// Overlay `DISPUTED` onto a claimed deal. Disputed and completed deals
    /// accept further appeals unchanged.
    ///
    /// # Errors
    /// Returns `InvalidState` for pending or cancelled deals.
    pub fn mark_disputed(&mut self, id: DealId) -> Result<Deal> {
        let deal = self.find(id)?;
        match deal.state {
            DealState::PaymentClaimed => {
                self.transition(id, DealState::PaymentClaimed, DealState::Disputed, |deal| {
                    deal.cancel_requested_by = None;
                })
            }
            DealState::Disputed | DealState::Completed => Ok(deal.clone()),
            state => Err(DealDeskError::invalid_state(format!(
                "deal {id} is {state}, appeals require PAYMENT_CLAIMED, DISPUTED or COMPLETED"
            ))),
        }
    }

    /// Settle a disputed deal in the buyer's favour. No-op if already completed.
    pub fn resolve_release(&mut self, ledger: &mut Ledger, id: DealId, now: DateTime<Utc>) -> Result<Deal> {
        let deal = self.find(id)?;
        match deal.state {
            DealState::Completed => Ok(deal.clone()),
            DealState::Disputed => self.settle_to_buyer(ledger, id, DealState::Disputed, now),
            state => Err(DealDeskError::invalid_state(format!(
                "deal {id} is {state}, cannot release by appeal"
            ))),
        }
    }

    /// Cancel a disputed deal, returning its quantity. No-op if already cancelled.
    pub fn resolve_cancel(
        &mut self,
        listings: &mut ListingStore,
        id: DealId,
        now: DateTime<Utc>,
    ) -> Result<Deal> {
        let deal = self.find(id)?;
        match deal.state {
            DealState::Cancelled => Ok(deal.clone()),
            DealState::Disputed => self.close_cancelled(
                listings,
                id,
                DealState::Disputed,
                "cancelled by appeal".to_string(),
                now,
            ),
            state => Err(DealDeskError::invalid_state(format!(
                "deal {id} is {state}, cannot cancel by appeal"
            ))),
        }
    }

    /// Lift the dispute overlay back to `PAYMENT_CLAIMED`. No-op otherwise.
    pub fn lift_dispute(&mut self, id: DealId) -> Result<Deal> {
        let deal = self.find(id)?;
        if deal.state != DealState::Disputed {
            return Ok(deal.clone());
        }
        self.transition(id, DealState::Disputed, DealState::PaymentClaimed, |_| {})
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn get(&self, id: DealId) -> Option<&Deal> {
        self.deals.get(&id)
    }

    /// Look up a deal, failing with `DealNotFound`.
    pub fn find(&self, id: DealId) -> Result<&Deal> {
        self.deals.get(&id).ok_or(DealDeskError::DealNotFound(id))
    }

    /// Deals where `user` is buyer or seller, newest first.
    #[must_use]
    pub fn ids_for_user(&self, user: UserId) -> Vec<DealId> {
        self.order
            .iter()
            .rev()
            .filter(|id| self.deals.get(*id).is_some_and(|d| d.is_participant(user)))
            .copied()
            .collect()
    }

    /// Deals opened against a listing, in creation order.
    pub fn for_listing(&self, listing_id: ListingId) -> impl Iterator<Item = &Deal> {
        self.order
            .iter()
            .filter_map(|id| self.deals.get(id))
            .filter(move |d| d.listing_id == listing_id)
    }

    /// Non-terminal deals referencing a listing.
    #[must_use]
    pub fn open_count_for_listing(&self, listing_id: ListingId) -> usize {
        self.for_listing(listing_id)
            .filter(|d| !d.state.is_terminal())
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    // =================================================================
    // Internals
    // =================================================================

    /// Compare-and-swap: move `id` from `expected` to `target`, then let
    /// `apply` fill in the transition's fields.
    fn transition(
        &mut self,
        id: DealId,
        expected: DealState,
        target: DealState,
        apply: impl FnOnce(&mut Deal),
    ) -> Result<Deal> {
        let deal = self.get_mut(id)?;
        if deal.state != expected {
            return Err(DealDeskError::invalid_state(format!(
                "deal {id} is {}, expected {expected}",
                deal.state
            )));
        }
        if !expected.can_transition_to(target) {
            return Err(DealDeskError::invalid_state(format!(
                "{expected} -> {target} is not a valid transition"
            )));
        }
        deal.state = target;
        apply(deal);
        info!(deal = %id, from = %expected, to = %target, "deal transition");
        Ok(deal.clone())
    }

    fn close_cancelled(
        &mut self,
        listings: &mut ListingStore,
        id: DealId,
        expected: DealState,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Deal> {
        let deal = self.find(id)?;
        listings.release(deal.listing_id, deal.quantity, now)?;
        self.transition(id, expected, DealState::Cancelled, |deal| {
            deal.closed_at = Some(now);
            deal.cancellation_reason = Some(reason);
        })
    }

    fn settle_to_buyer(
        &mut self,
        ledger: &mut Ledger,
        id: DealId,
        expected: DealState,
        now: DateTime<Utc>,
    ) -> Result<Deal> {
        let deal = self.find(id)?;
        let payout = LedgerMovement::new(
            MovementKey::deal_release(id),
            deal.buyer_id,
            &deal.asset,
            deal.quantity,
            now,
        );
        match ledger.apply(payout) {
            Ok(balance) => {
                info!(deal = %id, buyer = %deal.buyer_id, %balance, "buyer credited");
            }
            Err(DealDeskError::DuplicateMovement(key)) => {
                warn!(deal = %id, %key, "payout already applied, completing deal");
            }
            Err(err) => return Err(err),
        }
        self.transition(id, expected, DealState::Completed, |deal| {
            deal.closed_at = Some(now);
            deal.cancel_requested_by = None;
        })
    }

    fn get_mut(&mut self, id: DealId) -> Result<&mut Deal> {
        self.deals.get_mut(&id).ok_or(DealDeskError::DealNotFound(id))
    }
}
