//! Per-(user, asset) balance ledger.
//!
//! All mutations are atomic: either the full operation succeeds or the
//! ledger is unchanged. Balances are never negative, and no method sets a
//! balance directly; everything goes through [`Ledger::credit`],
//! [`Ledger::debit`] or a keyed [`Ledger::apply`].

use std::collections::HashMap;

use chrono::Utc;
use dealdesk_types::{
    Asset, DealDeskError, Direction, LedgerEntry, LedgerMovement, MovementKey, Result, UserId,
};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::journal::MovementJournal;
use crate::supply_conservation::SupplyConservation;

/// The source of truth for user balances.
#[derive(Debug, Default)]
pub struct Ledger {
    /// Per-(user, asset) balances.
    entries: HashMap<(UserId, Asset), LedgerEntry>,
    /// Applied keyed movements.
    journal: MovementJournal,
    /// Inflow/outflow totals for the conservation check.
    supply: SupplyConservation,
}

fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(DealDeskError::validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

fn normalize_asset(asset: &str) -> Result<String> {
    let asset = asset.trim().to_ascii_uppercase();
    if asset.is_empty() {
        return Err(DealDeskError::validation("asset must not be empty"));
    }
    Ok(asset)
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the balance. The first credit creates the row.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    /// Returns `Validation` if the balance or the asset's inflow total would
    /// overflow; the ledger is unchanged.
    pub fn credit(&mut self, user_id: UserId, asset: &str, amount: Decimal) -> Result<Decimal> {
        ensure_positive(amount)?;
        let asset = normalize_asset(asset)?;
        let balance = self
            .balance(user_id, &asset)
            .checked_add(amount)
            .filter(|_| self.supply.can_record_inflow(&asset, amount))
            .ok_or_else(|| {
                DealDeskError::validation(format!("credit of {amount} {asset} overflows"))
            })?;
        self.supply.record_inflow(&asset, amount)?;
        let now = Utc::now();
        let entry = self
            .entries
            .entry((user_id, asset.clone()))
            .or_insert_with(|| LedgerEntry::empty(user_id, &asset, now));
        entry.balance = balance;
        entry.version += 1;
        entry.updated_at = now;
        debug!(user = %user_id, %asset, %amount, %balance, "ledger credit");
        Ok(balance)
    }

    /// Remove `amount` from the balance.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if the balance is below `amount`, or
    /// `Validation` if the asset's outflow total would overflow; the ledger
    /// is unchanged.
    pub fn debit(&mut self, user_id: UserId, asset: &str, amount: Decimal) -> Result<Decimal> {
        ensure_positive(amount)?;
        let asset = normalize_asset(asset)?;
        let Some(entry) = self.entries.get_mut(&(user_id, asset.clone())) else {
            return Err(DealDeskError::InsufficientFunds {
                needed: amount,
                available: Decimal::ZERO,
            });
        };
        if entry.balance < amount {
            return Err(DealDeskError::InsufficientFunds {
                needed: amount,
                available: entry.balance,
            });
        }
        self.supply.record_outflow(&asset, amount)?;

        entry.balance -= amount;
        entry.version += 1;
        entry.updated_at = Utc::now();
        let balance = entry.balance;
        debug!(user = %user_id, %asset, %amount, %balance, "ledger debit");
        Ok(balance)
    }

    /// Apply a keyed movement exactly once.
    ///
    /// The key is checked before the balance changes and recorded only after
    /// it changed, so a movement that fails (e.g. a withdrawal with
    /// insufficient funds) can be retried under the same key.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    /// - `DuplicateMovement` if the key was already applied
    /// - whatever [`Ledger::credit`] / [`Ledger::debit`] return
    pub fn apply(&mut self, movement: LedgerMovement) -> Result<Decimal> {
        self.journal.ensure_fresh(&movement.key)?;
        let balance = match movement.direction() {
            Direction::Credit => self.credit(movement.user_id, &movement.asset, movement.amount)?,
            Direction::Debit => self.debit(movement.user_id, &movement.asset, movement.amount)?,
        };
        info!(
            key = %movement.key,
            user = %movement.user_id,
            asset = %movement.asset,
            amount = %movement.amount,
            "ledger movement applied"
        );
        self.journal.record(movement)?;
        Ok(balance)
    }

    /// Whether a movement with this key has been applied.
    #[must_use]
    pub fn is_applied(&self, key: &MovementKey) -> bool {
        self.journal.contains(key)
    }

    #[must_use]
    pub fn movement(&self, key: &MovementKey) -> Option<&LedgerMovement> {
        self.journal.get(key)
    }

    /// Keyed movements touching `user`, oldest first.
    #[must_use]
    pub fn movements_for(&self, user_id: UserId) -> Vec<LedgerMovement> {
        self.journal.for_user(user_id).into_iter().cloned().collect()
    }

    /// Current balance; zero if the row was never created.
    #[must_use]
    pub fn balance(&self, user_id: UserId, asset: &str) -> Decimal {
        self.entry(user_id, asset)
            .map_or(Decimal::ZERO, |entry| entry.balance)
    }

    #[must_use]
    pub fn entry(&self, user_id: UserId, asset: &str) -> Option<&LedgerEntry> {
        self.entries
            .get(&(user_id, asset.trim().to_ascii_uppercase()))
    }

    /// All of a user's balance rows, sorted by asset.
    #[must_use]
    pub fn balances_of(&self, user_id: UserId) -> Vec<LedgerEntry> {
        let mut rows: Vec<LedgerEntry> = self
            .entries
            .values()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.asset.cmp(&b.asset));
        rows
    }

    /// Sum of all users' balances of an asset.
    #[must_use]
    pub fn total_supply(&self, asset: &str) -> Decimal {
        let asset = asset.trim().to_ascii_uppercase();
        self.entries
            .iter()
            .filter(|((_, a), _)| *a == asset)
            .map(|(_, entry)| entry.balance)
            .sum()
    }

    /// Verify supply conservation for a given asset.
    pub fn verify_supply(&self, asset: &str) -> Result<()> {
        let asset = asset.trim().to_ascii_uppercase();
        self.supply.verify(&asset, self.total_supply(&asset))
    }

    /// Verify supply conservation for every asset that ever moved.
    pub fn verify_all(&self) -> Result<()> {
        self.supply
            .tracked_assets()
            .iter()
            .try_for_each(|asset| self.verify_supply(asset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealdesk_types::{DealId, WithdrawalId};

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn missing_row_reads_as_zero() {
        let ledger = Ledger::new();
        let user = UserId::new();
        assert_eq!(ledger.balance(user, "BTC"), Decimal::ZERO);
        assert!(ledger.entry(user, "BTC").is_none());
    }

    #[test]
    fn credit_creates_row_and_bumps_version() {
        let mut ledger = Ledger::new();
        let user = UserId::new();
        assert_eq!(ledger.credit(user, "usdt", dec(100)).unwrap(), dec(100));
        ledger.credit(user, "USDT", dec(50)).unwrap();
        let entry = ledger.entry(user, "USDT").unwrap();
        assert_eq!(entry.balance, dec(150));
        assert_eq!(entry.version, 2);
    }

    #[test]
    fn debit_insufficient_fails_without_mutation() {
        let mut ledger = Ledger::new();
        let user = UserId::new();
        ledger.credit(user, "USDT", dec(100)).unwrap();
        let err = ledger.debit(user, "USDT", dec(200)).unwrap_err();
        assert!(matches!(
            err,
            DealDeskError::InsufficientFunds { needed, available }
                if needed == dec(200) && available == dec(100)
        ));
        let entry = ledger.entry(user, "USDT").unwrap();
        assert_eq!(entry.balance, dec(100));
        assert_eq!(entry.version, 1);
    }

    #[test]
    fn debit_on_missing_row_is_insufficient() {
        let mut ledger = Ledger::new();
        let err = ledger.debit(UserId::new(), "BTC", Decimal::ONE).unwrap_err();
        assert!(matches!(err, DealDeskError::InsufficientFunds { .. }));
    }

    #[test]
    fn non_positive_amounts_rejected() {
        let mut ledger = Ledger::new();
        let user = UserId::new();
        assert!(matches!(
            ledger.credit(user, "BTC", Decimal::ZERO).unwrap_err(),
            DealDeskError::Validation { .. }
        ));
        assert!(matches!(
            ledger.debit(user, "BTC", dec(-1)).unwrap_err(),
            DealDeskError::Validation { .. }
        ));
    }

    #[test]
    fn credit_overflow_leaves_ledger_unchanged() {
        let mut ledger = Ledger::new();
        let user = UserId::new();
        ledger.credit(user, "ETH", Decimal::MAX).unwrap();

        let err = ledger.credit(user, "ETH", dec(1)).unwrap_err();
        assert!(matches!(err, DealDeskError::Validation { .. }));
        let entry = ledger.entry(user, "ETH").unwrap();
        assert_eq!(entry.balance, Decimal::MAX);
        assert_eq!(entry.version, 1);

        // Another user's balance fits, but the asset's inflow total does not.
        let other = UserId::new();
        assert!(ledger.credit(other, "ETH", dec(1)).is_err());
        assert!(ledger.entry(other, "ETH").is_none());
        ledger.verify_all().unwrap();
    }

    #[test]
    fn apply_is_idempotent_per_key() {
        let mut ledger = Ledger::new();
        let buyer = UserId::new();
        let deal = DealId::new();
        let payout = LedgerMovement::new(
            MovementKey::deal_release(deal),
            buyer,
            "USDT",
            dec(100),
            Utc::now(),
        );
        ledger.apply(payout.clone()).unwrap();
        let err = ledger.apply(payout).unwrap_err();
        assert!(matches!(err, DealDeskError::DuplicateMovement(_)));
        assert_eq!(ledger.balance(buyer, "USDT"), dec(100));
        assert!(ledger.is_applied(&MovementKey::deal_release(deal)));
    }

    #[test]
    fn failed_movement_does_not_consume_key() {
        let mut ledger = Ledger::new();
        let user = UserId::new();
        let id = WithdrawalId::new();
        let withdrawal =
            LedgerMovement::new(MovementKey::withdrawal(id), user, "BTC", dec(2), Utc::now());

        assert!(ledger.apply(withdrawal.clone()).is_err());
        assert!(!ledger.is_applied(&MovementKey::withdrawal(id)));

        ledger.credit(user, "BTC", dec(3)).unwrap();
        assert_eq!(ledger.apply(withdrawal).unwrap(), Decimal::ONE);
    }

    #[test]
    fn balances_of_sorted_by_asset() {
        let mut ledger = Ledger::new();
        let user = UserId::new();
        ledger.credit(user, "USDT", dec(1)).unwrap();
        ledger.credit(user, "BTC", dec(1)).unwrap();
        ledger.credit(UserId::new(), "ETH", dec(1)).unwrap();
        let assets: Vec<_> = ledger.balances_of(user).into_iter().map(|e| e.asset).collect();
        assert_eq!(assets, vec!["BTC".to_string(), "USDT".to_string()]);
    }

    #[test]
    fn supply_conserved_across_flows() {
        let mut ledger = Ledger::new();
        let alice = UserId::new();
        let bob = UserId::new();
        ledger.credit(alice, "USDT", dec(1000)).unwrap();
        ledger.credit(bob, "USDT", dec(500)).unwrap();
        ledger.debit(alice, "USDT", dec(300)).unwrap();
        assert!(ledger.debit(bob, "USDT", dec(501)).is_err());

        assert_eq!(ledger.total_supply("USDT"), dec(1200));
        ledger.verify_supply("USDT").unwrap();
        ledger.verify_all().unwrap();
    }
}
