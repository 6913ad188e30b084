//! Supply conservation invariant checker.
//!
//! Invariant enforced by [`crate::Ledger::verify_supply`]:
//! ```text
//! ∀ asset: Σ balances == Σ credits - Σ debits
//! ```
//!
//! Credits are deposits, deal payouts and withdrawal refunds; debits are
//! withdrawals. If the sum of balances drifts from the recorded flows, some
//! code path mutated a balance outside the ledger API.

use std::collections::{BTreeSet, HashMap};

use dealdesk_types::{Asset, DealDeskError, Result};
use rust_decimal::Decimal;

/// Tracks per-asset inflow/outflow totals.
#[derive(Debug, Default)]
pub struct SupplyConservation {
    /// Total credited per asset since genesis.
    inflows: HashMap<Asset, Decimal>,
    /// Total debited per asset since genesis.
    outflows: HashMap<Asset, Decimal>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `Validation` if the running total would overflow; the totals
    /// are unchanged.
    pub fn record_inflow(&mut self, asset: &str, amount: Decimal) -> Result<()> {
        accumulate(&mut self.inflows, asset, amount, "inflow")
    }

    /// # Errors
    /// Returns `Validation` if the running total would overflow; the totals
    /// are unchanged.
    pub fn record_outflow(&mut self, asset: &str, amount: Decimal) -> Result<()> {
        accumulate(&mut self.outflows, asset, amount, "outflow")
    }

    /// Whether an inflow of `amount` can be recorded without overflow.
    #[must_use]
    pub fn can_record_inflow(&self, asset: &str, amount: Decimal) -> bool {
        self.total_inflows(asset).checked_add(amount).is_some()
    }

    /// Whether an outflow of `amount` can be recorded without overflow.
    #[must_use]
    pub fn can_record_outflow(&self, asset: &str, amount: Decimal) -> bool {
        self.total_outflows(asset).checked_add(amount).is_some()
    }

    /// Expected total supply for an asset: inflows - outflows.
    #[must_use]
    pub fn expected_supply(&self, asset: &str) -> Decimal {
        self.total_inflows(asset) - self.total_outflows(asset)
    }

    /// Verify that the actual supply (sum of all balances) matches the
    /// expected supply for `asset`.
    ///
    /// # Errors
    /// Returns [`DealDeskError::SupplyInvariantViolation`] if actual ≠ expected.
    pub fn verify(&self, asset: &str, actual_supply: Decimal) -> Result<()> {
        let expected = self.expected_supply(asset);
        if actual_supply != expected {
            return Err(DealDeskError::SupplyInvariantViolation {
                reason: format!(
                    "Asset {asset}: actual supply {actual_supply} != expected {expected} \
                     (inflows={}, outflows={})",
                    self.total_inflows(asset),
                    self.total_outflows(asset),
                ),
            });
        }
        Ok(())
    }

    /// All assets that ever moved, sorted.
    #[must_use]
    pub fn tracked_assets(&self) -> Vec<String> {
        let assets: BTreeSet<&String> = self.inflows.keys().chain(self.outflows.keys()).collect();
        assets.into_iter().cloned().collect()
    }

    #[must_use]
    pub fn total_inflows(&self, asset: &str) -> Decimal {
        self.inflows.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    #[must_use]
    pub fn total_outflows(&self, asset: &str) -> Decimal {
        self.outflows.get(asset).copied().unwrap_or(Decimal::ZERO)
    }
}

fn accumulate(
    totals: &mut HashMap<Asset, Decimal>,
    asset: &str,
    amount: Decimal,
    flow: &str,
) -> Result<()> {
    let total = totals.entry(asset.to_string()).or_insert(Decimal::ZERO);
    *total = total.checked_add(amount).ok_or_else(|| {
        DealDeskError::validation(format!("{asset} {flow} total overflows"))
    })?;
    Ok(())
}
