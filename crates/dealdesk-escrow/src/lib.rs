//! # dealdesk-escrow
//!
//! Escrow core of the **DealDesk** P2P desk: a listing is matched against a
//! counterparty to open a deal, which reserves quantity from the listing
//! until the deal completes or is cancelled.
//!
//! - [`ListingStore`]: buy/sell advertisements with conditional reservation
//! - [`PaymentMethodRegistry`]: per-owner payment methods with stable ids
//! - [`PriceSource`]: reference prices for market-relative listings
//! - [`DealBook`]: the deal state machine, every transition a CAS on state
//! - [`AppealTracker`]: disputes raised by deal participants
//! - [`Desk`]: owns all of the above plus the [`dealdesk_ledger::Ledger`]
//!
//! ## Deal Lifecycle
//!
//! ```text
//!  open ──▶ PENDING_PAYMENT ──confirm──▶ PAYMENT_CLAIMED ──release──▶ COMPLETED
//!              │       │                    │       │                    ▲
//!       cancel │       │ deadline    cancel │       │ appeal             │
//!              ▼       ▼ passes     (mutual │       ▼                    │
//!            CANCELLED ◀──────────── or late)    DISPUTED ──resolve──────┘
//! ```
//!
//! The ledger is credited once per deal, keyed by the deal id, so a
//! repeated release never pays twice.

pub mod appeals;
pub mod deals;
pub mod desk;
pub mod listing_store;
pub mod payment_methods;
pub mod pricing;

pub use appeals::AppealTracker;
pub use deals::{DealBook, OpenDeal};
pub use desk::{DepositReceipt, Desk, WithdrawalTicket};
pub use listing_store::{ListingQuote, ListingStore};
pub use payment_methods::PaymentMethodRegistry;
pub use pricing::{FixedPriceSource, PriceSource, fiat_total, resolve_unit_price, round_fiat};
