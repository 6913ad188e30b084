//! # dealdesk-types
//!
//! Shared types, errors, and configuration for the **DealDesk** P2P escrow desk.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`ListingId`], [`DealId`], [`AppealId`], [`PaymentMethodId`], [`WithdrawalId`]
//! - **Listing model**: [`Listing`], [`ListingSide`], [`ListingStatus`], [`PriceSpec`], [`ListingDraft`], [`ListingPatch`], [`ListingFilter`]
//! - **Deal model**: [`Deal`], [`DealState`], [`DealParty`], [`PaymentMethodSnapshot`]
//! - **Appeal model**: [`Appeal`], [`AppealStatus`], [`AppealOutcome`]
//! - **Ledger model**: [`LedgerEntry`], [`LedgerMovement`], [`MovementKey`], [`MovementKind`]
//! - **Payment methods**: [`PaymentMethod`]
//! - **Configuration**: [`DeskConfig`]
//! - **Errors**: [`DealDeskError`] with `DD_ERR_` prefix codes and [`ErrorKind`]
//! - **Constants**: system-wide limits and defaults

pub mod appeal;
pub mod config;
pub mod constants;
pub mod deal;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod listing;
pub mod payment_method;

pub use appeal::*;
pub use config::*;
pub use deal::*;
pub use error::*;
pub use ids::*;
pub use ledger::*;
pub use listing::*;
pub use payment_method::*;

// Constants are accessed via `dealdesk_types::constants::FOO`
// (not re-exported to avoid name collisions).
