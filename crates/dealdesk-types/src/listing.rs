//! Listing (advertisement) types.
//!
//! A listing offers to buy or sell `available_quantity` of an asset for a
//! fiat currency. Deals reserve quantity from it; cancelled or expired deals
//! give it back. `original_quantity` tracks the total ever added so that
//! `0 <= available_quantity <= original_quantity` can be checked at any time.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ListingId, UserId};

/// Which side the listing owner is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingSide {
    /// The owner wants to buy the asset; counterparties sell to them.
    Buy,
    /// The owner sells the asset; counterparties buy from them.
    Sell,
}

impl ListingSide {
    /// The side a counterparty takes when opening a deal on this listing.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Parse the `{buy|sell}` path segment used by the listings endpoint.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for ListingSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Whether the listing is visible and can be traded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Inactive => write!(f, "INACTIVE"),
        }
    }
}

/// How the unit price of a listing is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PriceSpec {
    /// A fixed fiat price per unit of the asset.
    #[serde(rename_all = "camelCase")]
    Fixed { unit_price: Decimal },
    /// The reference market price adjusted by a premium (negative = discount).
    #[serde(rename_all = "camelCase")]
    MarketRelative { premium_percent: Decimal },
}

/// A buy/sell advertisement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: ListingId,
    pub owner_id: UserId,
    pub side: ListingSide,
    pub asset: String,
    pub fiat_currency: String,
    pub price: PriceSpec,
    /// Quantity still open for new deals.
    pub available_quantity: Decimal,
    /// Total quantity ever put on this listing (creation + top-ups).
    pub original_quantity: Decimal,
    /// Smallest fiat total a single deal may have.
    pub min_fiat: Decimal,
    /// Largest fiat total a single deal may have (inclusive); `None` = unbounded.
    pub max_fiat: Option<Decimal>,
    /// Names of the payment methods the listing accepts.
    pub accepted_payment_methods: BTreeSet<String>,
    pub payment_time_minutes: u32,
    pub terms: Option<String>,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }

    /// Quantity currently held by open deals.
    #[must_use]
    pub fn reserved_quantity(&self) -> Decimal {
        self.original_quantity - self.available_quantity
    }

    /// Whether a deal with this fiat total fits the listing limits.
    /// Both bounds are inclusive.
    #[must_use]
    pub fn fiat_within_limits(&self, fiat_total: Decimal) -> bool {
        fiat_total >= self.min_fiat && self.max_fiat.is_none_or(|max| fiat_total <= max)
    }

    /// Whether the listing accepts the named payment method (case-insensitive).
    #[must_use]
    pub fn accepts_method(&self, name: &str) -> bool {
        self.accepted_payment_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(name.trim()))
    }

    /// Whether this listing should be returned for the given search filter.
    #[must_use]
    pub fn matches(&self, filter: &ListingFilter) -> bool {
        if !self.is_active() || self.available_quantity <= Decimal::ZERO {
            return false;
        }
        if self.side != filter.side {
            return false;
        }
        if let Some(asset) = &filter.asset {
            if !self.asset.eq_ignore_ascii_case(asset) {
                return false;
            }
        }
        if let Some(fiat) = &filter.fiat_currency {
            if !self.fiat_currency.eq_ignore_ascii_case(fiat) {
                return false;
            }
        }
        if let Some(method) = &filter.payment_method {
            if !self.accepts_method(method) {
                return false;
            }
        }
        if let Some(amount) = filter.fiat_amount {
            if !self.fiat_within_limits(amount) {
                return false;
            }
        }
        true
    }
}

/// Owner input for creating a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    pub side: ListingSide,
    pub asset: String,
    pub fiat_currency: String,
    pub price: PriceSpec,
    pub quantity: Decimal,
    pub min_fiat: Decimal,
    #[serde(default)]
    pub max_fiat: Option<Decimal>,
    pub accepted_payment_methods: BTreeSet<String>,
    #[serde(default)]
    pub payment_time_minutes: Option<u32>,
    #[serde(default)]
    pub terms: Option<String>,
}

/// Owner edit of an existing listing. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingPatch {
    pub price: Option<PriceSpec>,
    pub min_fiat: Option<Decimal>,
    pub max_fiat: Option<Decimal>,
    /// Remove the upper fiat limit. Ignored when `max_fiat` is also set.
    pub clear_max_fiat: bool,
    pub accepted_payment_methods: Option<BTreeSet<String>>,
    pub payment_time_minutes: Option<u32>,
    pub terms: Option<String>,
    /// Top up both the available and the original quantity.
    pub add_quantity: Option<Decimal>,
}

/// Search criteria for the public listing feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingFilter {
    pub side: ListingSide,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub fiat_currency: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Only listings whose fiat limits include this amount.
    #[serde(default)]
    pub fiat_amount: Option<Decimal>,
}

impl ListingFilter {
    #[must_use]
    pub fn side(side: ListingSide) -> Self {
        Self {
            side,
            asset: None,
            fiat_currency: None,
            payment_method: None,
            fiat_amount: None,
        }
    }
}

/// Sample sell-side draft for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl ListingDraft {
    pub fn sample_sell(quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            side: ListingSide::Sell,
            asset: "USDT".to_string(),
            fiat_currency: "RUB".to_string(),
            price: PriceSpec::Fixed { unit_price },
            quantity,
            min_fiat: Decimal::ONE,
            max_fiat: None,
            accepted_payment_methods: BTreeSet::from(["SBP".to_string()]),
            payment_time_minutes: None,
            terms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Listing {
        let draft = ListingDraft::sample_sell(Decimal::new(100, 0), Decimal::new(95, 0));
        Listing {
            id: ListingId::new(),
            owner_id: UserId::new(),
            side: draft.side,
            asset: draft.asset,
            fiat_currency: draft.fiat_currency,
            price: draft.price,
            available_quantity: draft.quantity,
            original_quantity: draft.quantity,
            min_fiat: Decimal::new(500, 0),
            max_fiat: Some(Decimal::new(5000, 0)),
            accepted_payment_methods: draft.accepted_payment_methods,
            payment_time_minutes: 15,
            terms: None,
            status: ListingStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn fiat_limits_are_inclusive() {
        let l = listing();
        assert!(l.fiat_within_limits(Decimal::new(500, 0)));
        assert!(l.fiat_within_limits(Decimal::new(5000, 0)));
        assert!(!l.fiat_within_limits(Decimal::new(49999, 2)));
        assert!(!l.fiat_within_limits(Decimal::new(500001, 2)));
    }

    #[test]
    fn unbounded_max() {
        let mut l = listing();
        l.max_fiat = None;
        assert!(l.fiat_within_limits(Decimal::new(1_000_000, 0)));
    }

    #[test]
    fn filter_matching() {
        let l = listing();
        let mut filter = ListingFilter::side(ListingSide::Sell);
        assert!(l.matches(&filter));

        filter.asset = Some("usdt".into());
        filter.payment_method = Some("sbp".into());
        assert!(l.matches(&filter));

        filter.fiat_amount = Some(Decimal::new(100, 0));
        assert!(!l.matches(&filter));

        let buy = ListingFilter::side(ListingSide::Buy);
        assert!(!l.matches(&buy));
    }

    #[test]
    fn inactive_or_empty_never_matches() {
        let mut l = listing();
        let filter = ListingFilter::side(ListingSide::Sell);
        l.status = ListingStatus::Inactive;
        assert!(!l.matches(&filter));
        l.status = ListingStatus::Active;
        l.available_quantity = Decimal::ZERO;
        assert!(!l.matches(&filter));
        assert_eq!(l.reserved_quantity(), Decimal::new(100, 0));
    }

    #[test]
    fn side_parse_and_opposite() {
        assert_eq!(ListingSide::parse("SELL"), Some(ListingSide::Sell));
        assert_eq!(ListingSide::parse("hold"), None);
        assert_eq!(ListingSide::Buy.opposite(), ListingSide::Sell);
    }

    #[test]
    fn price_spec_json_shape() {
        let fixed = PriceSpec::Fixed {
            unit_price: Decimal::new(9550, 2),
        };
        let json = serde_json::to_value(fixed).unwrap();
        assert_eq!(json["type"], "fixed");
        assert_eq!(json["unitPrice"], "95.50");

        let rel: PriceSpec =
            serde_json::from_str(r#"{"type":"marketRelative","premiumPercent":"-1.5"}"#).unwrap();
        assert_eq!(
            rel,
            PriceSpec::MarketRelative {
                premium_percent: Decimal::new(-15, 1)
            }
        );
    }
}
