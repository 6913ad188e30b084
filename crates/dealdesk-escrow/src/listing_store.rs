//! Listing store: buy/sell advertisements and their available quantity.
//!
//! `available_quantity` only moves through [`ListingStore::reserve`] (deal
//! opened), [`ListingStore::release`] (deal cancelled or expired) and an
//! owner top-up via [`ListingPatch::add_quantity`]. At all times:
//!
//! ```text
//! 0 ≤ available_quantity ≤ original_quantity
//! ```

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use dealdesk_types::{
    DealDeskError, Listing, ListingDraft, ListingFilter, ListingId, ListingPatch, ListingSide,
    ListingStatus, PriceSpec, Result, UserId, constants,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::pricing::{PriceSource, resolve_unit_price};

/// A listing together with its unit price resolved at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuote {
    #[serde(flatten)]
    pub listing: Listing,
    pub unit_price: Decimal,
}

/// In-memory listing storage.
#[derive(Debug, Default)]
pub struct ListingStore {
    listings: HashMap<ListingId, Listing>,
    /// Insertion sequence, used to break price ties in creation order.
    sequence: HashMap<ListingId, u64>,
    next_sequence: u64,
}

fn invalid(reason: impl Into<String>) -> DealDeskError {
    DealDeskError::InvalidListing {
        reason: reason.into(),
    }
}

fn normalize_methods(methods: BTreeSet<String>) -> BTreeSet<String> {
    methods
        .into_iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect()
}

/// Rules shared by create and update.
fn validate(listing: &Listing) -> Result<()> {
    if listing.asset.is_empty() {
        return Err(invalid("asset must not be empty"));
    }
    if listing.fiat_currency.is_empty() {
        return Err(invalid("fiat currency must not be empty"));
    }
    if listing.min_fiat <= Decimal::ZERO {
        return Err(invalid(format!(
            "min fiat must be positive, got {}",
            listing.min_fiat
        )));
    }
    if let Some(max) = listing.max_fiat {
        if max < listing.min_fiat {
            return Err(invalid(format!(
                "max fiat {max} is below min fiat {}",
                listing.min_fiat
            )));
        }
    }
    if listing.accepted_payment_methods.is_empty() {
        return Err(invalid("at least one payment method is required"));
    }
    let window = constants::MIN_PAYMENT_TIME_MINUTES..=constants::MAX_PAYMENT_TIME_MINUTES;
    if !window.contains(&listing.payment_time_minutes) {
        return Err(invalid(format!(
            "payment time must be within {}..={} minutes, got {}",
            constants::MIN_PAYMENT_TIME_MINUTES,
            constants::MAX_PAYMENT_TIME_MINUTES,
            listing.payment_time_minutes
        )));
    }
    match listing.price {
        PriceSpec::Fixed { unit_price } if unit_price <= Decimal::ZERO => {
            return Err(invalid(format!(
                "unit price must be positive, got {unit_price}"
            )));
        }
        PriceSpec::MarketRelative { premium_percent } => {
            let min = Decimal::from(constants::MIN_PRICE_PREMIUM_PERCENT);
            let max = Decimal::from(constants::MAX_PRICE_PREMIUM_PERCENT);
            if premium_percent <= min || premium_percent > max {
                return Err(invalid(format!(
                    "premium must be within ({min}, {max}] percent, got {premium_percent}"
                )));
            }
        }
        PriceSpec::Fixed { .. } => {}
    }
    if listing
        .terms
        .as_ref()
        .is_some_and(|t| t.len() > constants::MAX_TEXT_LEN)
    {
        return Err(invalid(format!(
            "terms exceed {} characters",
            constants::MAX_TEXT_LEN
        )));
    }
    if listing.original_quantity > Decimal::from(constants::MAX_LISTING_QUANTITY) {
        return Err(invalid(format!(
            "quantity {} exceeds the maximum of {}",
            listing.original_quantity,
            constants::MAX_LISTING_QUANTITY
        )));
    }
    if listing.available_quantity < Decimal::ZERO
        || listing.available_quantity > listing.original_quantity
    {
        return Err(invalid("available quantity out of range"));
    }
    Ok(())
}

fn clean_terms(terms: Option<String>) -> Option<String> {
    terms
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

impl ListingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =================================================================
    // Owner operations
    // =================================================================

    /// Validate a draft and store it as an active listing.
    ///
    /// `default_payment_time` applies when the draft leaves the payment
    /// window unset.
    ///
    /// # Errors
    /// Returns `InvalidListing` if any listing rule is violated.
    pub fn create(
        &mut self,
        draft: ListingDraft,
        owner_id: UserId,
        default_payment_time: u32,
        now: DateTime<Utc>,
    ) -> Result<Listing> {
        if draft.quantity <= Decimal::ZERO {
            return Err(invalid(format!(
                "quantity must be positive, got {}",
                draft.quantity
            )));
        }
        let listing = Listing {
            id: ListingId::new(),
            owner_id,
            side: draft.side,
            asset: draft.asset.trim().to_ascii_uppercase(),
            fiat_currency: draft.fiat_currency.trim().to_ascii_uppercase(),
            price: draft.price,
            available_quantity: draft.quantity,
            original_quantity: draft.quantity,
            min_fiat: draft.min_fiat,
            max_fiat: draft.max_fiat,
            accepted_payment_methods: normalize_methods(draft.accepted_payment_methods),
            payment_time_minutes: draft.payment_time_minutes.unwrap_or(default_payment_time),
            terms: clean_terms(draft.terms),
            status: ListingStatus::Active,
            created_at: now,
            updated_at: now,
        };
        validate(&listing)?;

        self.sequence.insert(listing.id, self.next_sequence);
        self.next_sequence += 1;
        self.listings.insert(listing.id, listing.clone());
        info!(
            listing = %listing.id,
            owner = %owner_id,
            side = %listing.side,
            asset = %listing.asset,
            quantity = %listing.available_quantity,
            "listing created"
        );
        Ok(listing)
    }

    /// Apply an owner edit. The edited listing is re-validated with the
    /// same rules as [`ListingStore::create`]; on failure nothing changes.
    ///
    /// # Errors
    /// - `ListingNotFound`
    /// - `NotAuthorized` if `actor` is not the owner
    /// - `InvalidListing` if the result violates a listing rule
    pub fn update(
        &mut self,
        id: ListingId,
        actor: UserId,
        patch: ListingPatch,
        now: DateTime<Utc>,
    ) -> Result<Listing> {
        let current = self.owned(id, actor)?;
        let mut next = current.clone();

        if let Some(price) = patch.price {
            next.price = price;
        }
        if let Some(min) = patch.min_fiat {
            next.min_fiat = min;
        }
        if patch.clear_max_fiat {
            next.max_fiat = None;
        } else if let Some(max) = patch.max_fiat {
            next.max_fiat = Some(max);
        }
        if let Some(methods) = patch.accepted_payment_methods {
            next.accepted_payment_methods = normalize_methods(methods);
        }
        if let Some(minutes) = patch.payment_time_minutes {
            next.payment_time_minutes = minutes;
        }
        if patch.terms.is_some() {
            next.terms = clean_terms(patch.terms);
        }
        if let Some(extra) = patch.add_quantity {
            if extra <= Decimal::ZERO {
                return Err(invalid(format!("top-up must be positive, got {extra}")));
            }
            let (Some(available), Some(original)) = (
                next.available_quantity.checked_add(extra),
                next.original_quantity.checked_add(extra),
            ) else {
                return Err(invalid(format!("top-up of {extra} overflows the listing quantity")));
            };
            next.available_quantity = available;
            next.original_quantity = original;
        }
        next.updated_at = now;
        validate(&next)?;

        self.listings.insert(id, next.clone());
        info!(listing = %id, "listing updated");
        Ok(next)
    }

    /// Activate or deactivate a listing. Owner only.
    pub fn set_status(
        &mut self,
        id: ListingId,
        actor: UserId,
        status: ListingStatus,
        now: DateTime<Utc>,
    ) -> Result<Listing> {
        self.owned(id, actor)?;
        let listing = self.get_mut(id)?;
        listing.status = status;
        listing.updated_at = now;
        info!(listing = %id, %status, "listing status changed");
        Ok(listing.clone())
    }

    /// Delete a listing. Owner only, and only while no open deal references it.
    ///
    /// # Errors
    /// Returns `InvalidState` if `open_deals > 0`.
    pub fn remove(&mut self, id: ListingId, actor: UserId, open_deals: usize) -> Result<Listing> {
        self.owned(id, actor)?;
        if open_deals > 0 {
            return Err(DealDeskError::invalid_state(format!(
                "listing {id} has {open_deals} open deal(s)"
            )));
        }
        self.sequence.remove(&id);
        let listing = self
            .listings
            .remove(&id)
            .ok_or(DealDeskError::ListingNotFound(id))?;
        info!(listing = %id, "listing removed");
        Ok(listing)
    }

    // =================================================================
    // Reservation
    // =================================================================

    /// Conditionally decrement `available_quantity` by `quantity`.
    ///
    /// # Errors
    /// Returns `InsufficientListingQuantity` if less than `quantity` is
    /// available; the listing is unchanged.
    pub fn reserve(&mut self, id: ListingId, quantity: Decimal, now: DateTime<Utc>) -> Result<()> {
        if quantity <= Decimal::ZERO {
            return Err(DealDeskError::InvalidQuantity {
                reason: format!("reservation must be positive, got {quantity}"),
            });
        }
        let listing = self.get_mut(id)?;
        if listing.available_quantity < quantity {
            return Err(DealDeskError::InsufficientListingQuantity {
                requested: quantity,
                available: listing.available_quantity,
            });
        }
        listing.available_quantity -= quantity;
        listing.updated_at = now;
        debug!(listing = %id, %quantity, available = %listing.available_quantity, "quantity reserved");
        Ok(())
    }

    /// Return reserved quantity to a listing.
    ///
    /// # Errors
    /// Returns `Internal` if the release would lift `available_quantity`
    /// above `original_quantity`; the listing is unchanged.
    pub fn release(&mut self, id: ListingId, quantity: Decimal, now: DateTime<Utc>) -> Result<()> {
        let listing = self.get_mut(id)?;
        let restored = listing
            .available_quantity
            .checked_add(quantity)
            .filter(|restored| quantity > Decimal::ZERO && *restored <= listing.original_quantity);
        let Some(restored) = restored else {
            return Err(DealDeskError::Internal(format!(
                "release of {quantity} on listing {id} exceeds reserved {}",
                listing.reserved_quantity()
            )));
        };
        listing.available_quantity = restored;
        listing.updated_at = now;
        debug!(listing = %id, %quantity, available = %restored, "quantity released");
        Ok(())
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn get(&self, id: ListingId) -> Option<&Listing> {
        self.listings.get(&id)
    }

    /// Look up a listing, failing with `ListingNotFound`.
    pub fn find(&self, id: ListingId) -> Result<&Listing> {
        self.listings
            .get(&id)
            .ok_or(DealDeskError::ListingNotFound(id))
    }

    /// All listings of an owner in creation order, active or not.
    #[must_use]
    pub fn listings_of(&self, owner: UserId) -> Vec<Listing> {
        let mut own: Vec<&Listing> = self
            .listings
            .values()
            .filter(|l| l.owner_id == owner)
            .collect();
        own.sort_by_key(|l| self.sequence.get(&l.id).copied().unwrap_or(u64::MAX));
        own.into_iter().cloned().collect()
    }

    /// Active listings with quantity left that match `filter`, best price
    /// first: ascending for sell listings, descending for buy listings.
    /// Ties keep creation order. Market-relative listings whose reference
    /// price is unknown are left out.
    #[must_use]
    pub fn search(&self, filter: &ListingFilter, prices: &dyn PriceSource) -> Vec<ListingQuote> {
        let mut quotes: Vec<(u64, ListingQuote)> = self
            .listings
            .values()
            .filter(|l| l.matches(filter))
            .filter_map(|l| {
                let unit_price =
                    resolve_unit_price(&l.price, &l.asset, &l.fiat_currency, prices).ok()?;
                let seq = self.sequence.get(&l.id).copied().unwrap_or(u64::MAX);
                Some((
                    seq,
                    ListingQuote {
                        listing: l.clone(),
                        unit_price,
                    },
                ))
            })
            .collect();

        quotes.sort_by(|(seq_a, a), (seq_b, b)| {
            let by_price = match filter.side {
                ListingSide::Sell => a.unit_price.cmp(&b.unit_price),
                ListingSide::Buy => b.unit_price.cmp(&a.unit_price),
            };
            by_price.then(seq_a.cmp(seq_b))
        });
        quotes.into_iter().map(|(_, quote)| quote).collect()
    }

    /// Every stored listing, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Listing> {
        self.listings.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    // =================================================================
    // Internals
    // =================================================================

    fn get_mut(&mut self, id: ListingId) -> Result<&mut Listing> {
        self.listings
            .get_mut(&id)
            .ok_or(DealDeskError::ListingNotFound(id))
    }

    fn owned(&self, id: ListingId, actor: UserId) -> Result<&Listing> {
        let listing = self.find(id)?;
        if listing.owner_id != actor {
            return Err(DealDeskError::not_authorized(format!(
                "user {actor} does not own listing {id}"
            )));
        }
        Ok(listing)
    }
}
