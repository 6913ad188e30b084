//! Integration test: balances never go negative and supply always reconciles
//!
//! Drives the ledger with a seeded random sequence of credits, debits and
//! keyed movements, checking the invariants after every step.

use chrono::Utc;
use dealdesk_ledger::Ledger;
use dealdesk_types::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

const ASSETS: [&str; 3] = ["BTC", "USDT", "TON"];

fn check_invariants(ledger: &Ledger, users: &[UserId]) {
    for asset in ASSETS {
        for user in users {
            assert!(
                ledger.balance(*user, asset) >= Decimal::ZERO,
                "negative {asset} balance for {user}"
            );
        }
        ledger.verify_supply(asset).unwrap();
    }
}

#[test]
fn random_flows_preserve_invariants() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut ledger = Ledger::new();
    let users: Vec<UserId> = (0..5).map(|_| UserId::new()).collect();
    let mut rejected = 0usize;

    for step in 0..2_000 {
        let user = users[rng.gen_range(0..users.len())];
        let asset = ASSETS[rng.gen_range(0..ASSETS.len())];
        // Amounts with 2 decimal places in (0, 100].
        let amount = Decimal::new(rng.gen_range(1..=10_000), 2);

        let outcome = match rng.gen_range(0..4) {
            0 => ledger.credit(user, asset, amount),
            1 => ledger.debit(user, asset, amount),
            2 => ledger.apply(LedgerMovement::new(
                MovementKey::deposit(&format!("tx-{}", rng.gen_range(0..300))),
                user,
                asset,
                amount,
                Utc::now(),
            )),
            _ => ledger.apply(LedgerMovement::new(
                MovementKey::withdrawal(WithdrawalId::new()),
                user,
                asset,
                amount,
                Utc::now(),
            )),
        };
        if let Err(err) = outcome {
            assert!(
                matches!(
                    err,
                    DealDeskError::InsufficientFunds { .. } | DealDeskError::DuplicateMovement(_)
                ),
                "step {step}: unexpected error {err}"
            );
            rejected += 1;
        }
        check_invariants(&ledger, &users);
    }

    assert!(rejected > 0, "sequence should exercise rejections");
    ledger.verify_all().unwrap();
}

#[test]
fn duplicate_deposit_credits_once() {
    let mut ledger = Ledger::new();
    let user = UserId::new();
    let deposit = |amount| {
        LedgerMovement::new(MovementKey::deposit("0xfeed"), user, "TON", amount, Utc::now())
    };

    ledger.apply(deposit(Decimal::new(25, 0))).unwrap();
    assert!(ledger.apply(deposit(Decimal::new(25, 0))).is_err());
    assert!(ledger.apply(deposit(Decimal::new(99, 0))).is_err());

    assert_eq!(ledger.balance(user, "TON"), Decimal::new(25, 0));
    assert_eq!(ledger.movements_for(user).len(), 1);
    ledger.verify_supply("TON").unwrap();
}
