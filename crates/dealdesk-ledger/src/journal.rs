//! Movement journal: prevents a keyed movement from being applied twice.
//!
//! Each deal can be paid out once, each deposit transaction credited once,
//! each withdrawal debited once. The journal remembers every applied
//! [`MovementKey`] and refuses a second one with
//! [`DealDeskError::DuplicateMovement`].
//!
//! Keys are never evicted: forgetting a payout key would re-open the
//! double-credit it exists to prevent.

use std::collections::HashMap;

use dealdesk_types::{DealDeskError, LedgerMovement, MovementKey, Result, UserId};

/// Append-only record of applied ledger movements.
#[derive(Debug, Default)]
pub struct MovementJournal {
    /// Applied movements by key.
    applied: HashMap<MovementKey, LedgerMovement>,
    /// Keys in application order.
    order: Vec<MovementKey>,
}

impl MovementJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail if a movement with this key was already applied.
    pub fn ensure_fresh(&self, key: &MovementKey) -> Result<()> {
        if self.applied.contains_key(key) {
            return Err(DealDeskError::DuplicateMovement(key.to_string()));
        }
        Ok(())
    }

    /// Record an applied movement.
    ///
    /// # Errors
    /// Returns [`DealDeskError::DuplicateMovement`] if the key is already present.
    pub fn record(&mut self, movement: LedgerMovement) -> Result<()> {
        self.ensure_fresh(&movement.key)?;
        self.order.push(movement.key.clone());
        self.applied.insert(movement.key.clone(), movement);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, key: &MovementKey) -> bool {
        self.applied.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &MovementKey) -> Option<&LedgerMovement> {
        self.applied.get(key)
    }

    /// Movements touching `user`, oldest first.
    #[must_use]
    pub fn for_user(&self, user: UserId) -> Vec<&LedgerMovement> {
        self.order
            .iter()
            .filter_map(|key| self.applied.get(key))
            .filter(|m| m.user_id == user)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dealdesk_types::DealId;
    use rust_decimal::Decimal;

    fn payout(deal: DealId, user: UserId) -> LedgerMovement {
        LedgerMovement::new(
            MovementKey::deal_release(deal),
            user,
            "USDT",
            Decimal::new(100, 0),
            Utc::now(),
        )
    }

    #[test]
    fn first_record_ok() {
        let mut journal = MovementJournal::new();
        let deal = DealId::new();
        journal.record(payout(deal, UserId::new())).unwrap();
        assert!(journal.contains(&MovementKey::deal_release(deal)));
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn duplicate_key_blocked() {
        let mut journal = MovementJournal::new();
        let deal = DealId::new();
        let user = UserId::new();
        journal.record(payout(deal, user)).unwrap();

        let err = journal.record(payout(deal, user)).unwrap_err();
        assert!(
            matches!(err, DealDeskError::DuplicateMovement(ref key) if key.starts_with("deal_release:")),
            "Expected DuplicateMovement, got: {err:?}"
        );
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn history_is_per_user_and_ordered() {
        let mut journal = MovementJournal::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let d1 = DealId::new();
        let d2 = DealId::new();
        let d3 = DealId::new();
        journal.record(payout(d1, alice)).unwrap();
        journal.record(payout(d2, bob)).unwrap();
        journal.record(payout(d3, alice)).unwrap();

        let history = journal.for_user(alice);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].key, MovementKey::deal_release(d1));
        assert_eq!(history[1].key, MovementKey::deal_release(d3));
    }

    #[test]
    fn empty_journal() {
        let journal = MovementJournal::new();
        assert!(journal.is_empty());
        assert!(journal.ensure_fresh(&MovementKey::deposit("0x1")).is_ok());
    }
}
