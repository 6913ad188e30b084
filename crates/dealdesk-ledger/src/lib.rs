//! # dealdesk-ledger
//!
//! **Ledger**: per-(user, asset) balances with atomic credit/debit.
//!
//! ## Architecture
//!
//! 1. **Ledger**: balance rows with a version counter, never negative
//! 2. **MovementJournal**: keyed movements, each key applied at most once
//! 3. **SupplyConservation**: per-asset inflow/outflow totals that must
//!    reconcile with the sum of balances
//!
//! The ledger changes only through deposit confirmation, withdrawal debit
//! and deal payout. UI-facing code never sets a balance.

pub mod journal;
pub mod ledger;
pub mod supply_conservation;

pub use journal::MovementJournal;
pub use ledger::Ledger;
pub use supply_conservation::SupplyConservation;
