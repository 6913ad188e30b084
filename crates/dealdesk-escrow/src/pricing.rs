//! Unit price resolution.
//!
//! A listing is priced either at a fixed unit price or relative to a
//! reference market price:
//!
//! ```text
//! unit_price = reference × (100 + premium_percent) / 100
//! ```
//!
//! Reference prices come from a [`PriceSource`]. Fiat amounts are rounded to
//! [`constants::FIAT_PRECISION`] places, half away from zero.

use std::collections::HashMap;

use dealdesk_types::{DealDeskError, PriceSpec, Result, constants};
use rust_decimal::{Decimal, RoundingStrategy};

/// Capability: current reference price of `asset` in `fiat`.
pub trait PriceSource: Send + Sync {
    fn reference_price(&self, asset: &str, fiat: &str) -> Option<Decimal>;
}

/// In-memory reference price table.
#[derive(Debug, Default, Clone)]
pub struct FixedPriceSource {
    prices: HashMap<(String, String), Decimal>,
}

fn pair_key(asset: &str, fiat: &str) -> (String, String) {
    (
        asset.trim().to_ascii_uppercase(),
        fiat.trim().to_ascii_uppercase(),
    )
}

impl FixedPriceSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_price(mut self, asset: &str, fiat: &str, price: Decimal) -> Self {
        self.set_price(asset, fiat, price);
        self
    }

    pub fn set_price(&mut self, asset: &str, fiat: &str, price: Decimal) {
        self.prices.insert(pair_key(asset, fiat), price);
    }
}

impl PriceSource for FixedPriceSource {
    fn reference_price(&self, asset: &str, fiat: &str) -> Option<Decimal> {
        self.prices.get(&pair_key(asset, fiat)).copied()
    }
}

/// Round a fiat amount to display precision.
#[must_use]
pub fn round_fiat(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(
        constants::FIAT_PRECISION,
        RoundingStrategy::MidpointAwayFromZero,
    )
}

/// Resolve the unit price of a listing's [`PriceSpec`].
///
/// # Errors
/// Returns `PriceUnavailable` if the listing is market-relative and the
/// source has no reference price for the pair, `Validation` if the
/// premium-adjusted price does not fit a decimal.
pub fn resolve_unit_price(
    spec: &PriceSpec,
    asset: &str,
    fiat: &str,
    source: &dyn PriceSource,
) -> Result<Decimal> {
    match spec {
        PriceSpec::Fixed { unit_price } => Ok(*unit_price),
        PriceSpec::MarketRelative { premium_percent } => {
            let reference = source.reference_price(asset, fiat).ok_or_else(|| {
                DealDeskError::PriceUnavailable {
                    asset: asset.to_string(),
                    fiat: fiat.to_string(),
                }
            })?;
            let hundred = Decimal::ONE_HUNDRED;
            hundred
                .checked_add(*premium_percent)
                .and_then(|factor| reference.checked_mul(factor))
                .and_then(|scaled| scaled.checked_div(hundred))
                .map(round_fiat)
                .ok_or_else(|| {
                    DealDeskError::validation(format!(
                        "unit price for {asset}/{fiat} overflows at premium {premium_percent}"
                    ))
                })
        }
    }
}

/// `quantity × unit_price`, rounded to fiat precision.
///
/// # Errors
/// Returns `InvalidQuantity` if the product does not fit a decimal.
pub fn fiat_total(quantity: Decimal, unit_price: Decimal) -> Result<Decimal> {
    quantity
        .checked_mul(unit_price)
        .map(round_fiat)
        .ok_or_else(|| DealDeskError::InvalidQuantity {
            reason: format!("fiat total of {quantity} at {unit_price} overflows"),
        })
}
