//! HTTP handlers.
//!
//! # Routes
//! - `/health` - liveness plus a desk invariant check
//! - `/p2p/listings/*`, `/p2p/ads/*` - listing search and management
//! - `/p2p/deals/*` - deal lifecycle
//! - `/p2p/appeals/*` - appeal resolution (admin)
//! - `/p2p/payment-methods/*` - seller payment methods
//! - `/wallet/*` - balances, deposits, withdrawals

pub mod appeals;
pub mod deals;
pub mod health;
pub mod listings;
pub mod payment_methods;
pub mod wallet;
