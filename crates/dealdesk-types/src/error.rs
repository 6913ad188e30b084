//! Error types for the DealDesk escrow desk.
//!
//! All errors use the `DD_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by [`ErrorKind`]:
//! - 1xx: Validation errors (bad input shape or range)
//! - 2xx: Not-found errors
//! - 3xx: Authorization errors (actor is not a participant / owner)
//! - 4xx: State errors (transition attempted from the wrong state)
//! - 5xx: Business-rule violations (funds, listing quantity, idempotency)
//! - 6xx: Storage / internal errors (safe to retry at the caller)
//! - 7xx: Upstream collaborator errors (pricing, wallet)

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AppealId, DealId, ListingId, PaymentMethodId};

/// Coarse classification of a [`DealDeskError`], used by the API layer to
/// pick an HTTP status and by callers to decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    NotAuthorized,
    InvalidState,
    InsufficientFunds,
    InsufficientListingQuantity,
    Storage,
    Upstream,
}

/// Central error enum for all DealDesk operations.
#[derive(Debug, Error)]
pub enum DealDeskError {
    // =================================================================
    // Validation (1xx)
    // =================================================================
    /// Generic input validation failure.
    #[error("DD_ERR_100: Validation failed: {reason}")]
    Validation { reason: String },

    /// A listing draft or patch violates the listing rules.
    #[error("DD_ERR_101: Invalid listing: {reason}")]
    InvalidListing { reason: String },

    /// The requested deal quantity is non-positive or outside the listing limits.
    #[error("DD_ERR_102: Invalid quantity: {reason}")]
    InvalidQuantity { reason: String },

    /// A user tried to open a deal against their own listing.
    #[error("DD_ERR_103: Cannot open a deal against your own listing")]
    SelfDeal,

    /// The client's expected fiat total no longer matches the listing price.
    #[error("DD_ERR_104: Price changed: expected total {expected}, current total {actual}")]
    PriceMismatch { expected: Decimal, actual: Decimal },

    /// The payment method cannot be used for this deal.
    #[error("DD_ERR_105: Invalid payment method: {reason}")]
    InvalidPaymentMethod { reason: String },

    // =================================================================
    // Not found (2xx)
    // =================================================================
    #[error("DD_ERR_200: Listing not found: {0}")]
    ListingNotFound(ListingId),

    #[error("DD_ERR_201: Deal not found: {0}")]
    DealNotFound(DealId),

    #[error("DD_ERR_202: Appeal not found: {0}")]
    AppealNotFound(AppealId),

    #[error("DD_ERR_203: Payment method not found: {0}")]
    PaymentMethodNotFound(PaymentMethodId),

    // =================================================================
    // Authorization (3xx)
    // =================================================================
    /// The actor is not allowed to perform this action.
    #[error("DD_ERR_300: Not authorized: {reason}")]
    NotAuthorized { reason: String },

    // =================================================================
    // State (4xx)
    // =================================================================
    /// The entity is not in a state that permits the requested action.
    #[error("DD_ERR_400: Invalid state: {reason}")]
    InvalidState { reason: String },

    // =================================================================
    // Business rules (5xx)
    // =================================================================
    /// A debit would drive a ledger balance negative.
    #[error("DD_ERR_500: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    /// A listing does not have enough quantity left for the reservation.
    #[error("DD_ERR_501: Insufficient listing quantity: requested {requested}, available {available}")]
    InsufficientListingQuantity {
        requested: Decimal,
        available: Decimal,
    },

    /// A ledger movement with this key was already applied.
    #[error("DD_ERR_502: Movement already applied: {0}")]
    DuplicateMovement(String),

    // =================================================================
    // Storage / internal (6xx)
    // =================================================================
    /// Ledger totals no longer reconcile with recorded inflows and outflows.
    #[error("DD_ERR_600: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    /// Transient storage failure.
    #[error("DD_ERR_601: Storage error: {0}")]
    Storage(String),

    /// Unrecoverable internal error.
    #[error("DD_ERR_602: Internal error: {0}")]
    Internal(String),

    /// Configuration error (bad value, missing field).
    #[error("DD_ERR_603: Configuration error: {0}")]
    Configuration(String),

    // =================================================================
    // Upstream (7xx)
    // =================================================================
    /// No reference price is known for a market-relative listing.
    #[error("DD_ERR_700: No reference price for {asset}/{fiat}")]
    PriceUnavailable { asset: String, fiat: String },

    /// The wallet collaborator rejected or failed a request.
    #[error("DD_ERR_701: Wallet error: {reason}")]
    Upstream { reason: String },
}

impl DealDeskError {
    /// Coarse classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. }
            | Self::InvalidListing { .. }
            | Self::InvalidQuantity { .. }
            | Self::SelfDeal
            | Self::PriceMismatch { .. }
            | Self::InvalidPaymentMethod { .. } => ErrorKind::Validation,
            Self::ListingNotFound(_)
            | Self::DealNotFound(_)
            | Self::AppealNotFound(_)
            | Self::PaymentMethodNotFound(_) => ErrorKind::NotFound,
            Self::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            Self::InvalidState { .. } | Self::DuplicateMovement(_) => ErrorKind::InvalidState,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InsufficientListingQuantity { .. } => ErrorKind::InsufficientListingQuantity,
            Self::SupplyInvariantViolation { .. }
            | Self::Storage(_)
            | Self::Internal(_)
            | Self::Configuration(_) => ErrorKind::Storage,
            Self::PriceUnavailable { .. } | Self::Upstream { .. } => ErrorKind::Upstream,
        }
    }

    /// The stable `DD_ERR_nnn` code of this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "DD_ERR_100",
            Self::InvalidListing { .. } => "DD_ERR_101",
            Self::InvalidQuantity { .. } => "DD_ERR_102",
            Self::SelfDeal => "DD_ERR_103",
            Self::PriceMismatch { .. } => "DD_ERR_104",
            Self::InvalidPaymentMethod { .. } => "DD_ERR_105",
            Self::ListingNotFound(_) => "DD_ERR_200",
            Self::DealNotFound(_) => "DD_ERR_201",
            Self::AppealNotFound(_) => "DD_ERR_202",
            Self::PaymentMethodNotFound(_) => "DD_ERR_203",
            Self::NotAuthorized { .. } => "DD_ERR_300",
            Self::InvalidState { .. } => "DD_ERR_400",
            Self::InsufficientFunds { .. } => "DD_ERR_500",
            Self::InsufficientListingQuantity { .. } => "DD_ERR_501",
            Self::DuplicateMovement(_) => "DD_ERR_502",
            Self::SupplyInvariantViolation { .. } => "DD_ERR_600",
            Self::Storage(_) => "DD_ERR_601",
            Self::Internal(_) => "DD_ERR_602",
            Self::Configuration(_) => "DD_ERR_603",
            Self::PriceUnavailable { .. } => "DD_ERR_700",
            Self::Upstream { .. } => "DD_ERR_701",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::PriceUnavailable { .. } | Self::Upstream { .. }
        )
    }

    /// Shorthand for [`DealDeskError::Validation`].
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    pub fn not_authorized(reason: impl Into<String>) -> Self {
        Self::NotAuthorized {
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, DealDeskError>;
