//! Globally unique identifiers used throughout DealDesk.
//!
//! All entity IDs use UUIDv7 so that creation order is also sort order,
//! which the listing search relies on for stable tie-breaking.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Unique identifier for a user account (trader, listing owner, admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse a user id from its hyphenated string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Entity ids
// ---------------------------------------------------------------------------

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $prefix, self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a buy/sell advertisement.
    ListingId,
    "listing"
);

entity_id!(
    /// Identifier of an escrow deal opened against a listing.
    DealId,
    "deal"
);

entity_id!(
    /// Identifier of a dispute raised against a deal.
    AppealId,
    "appeal"
);

entity_id!(
    /// Identifier of a user's fiat payment method.
    PaymentMethodId,
    "pm"
);

entity_id!(
    /// Identifier of an on-chain withdrawal request.
    WithdrawalId,
    "wd"
);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_time_ordered() {
        let a = DealId::new();
        let b = DealId::new();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn display_carries_prefix() {
        let id = ListingId::new();
        assert!(id.to_string().starts_with("listing:"));
        let user = UserId::new();
        assert!(!user.to_string().contains(':'));
    }

    #[test]
    fn user_id_parse() {
        let user = UserId::new();
        assert_eq!(UserId::parse(&user.to_string()), Some(user));
        assert_eq!(UserId::parse("not-a-uuid"), None);
    }

    #[test]
    fn ids_serialize_as_bare_uuid() {
        let id = AppealId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
        let back: AppealId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
