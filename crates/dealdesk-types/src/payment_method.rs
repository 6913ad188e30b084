//! Fiat payment methods owned by users.
//!
//! Deals reference a method by [`PaymentMethodId`] and copy its name and
//! details into a [`crate::PaymentMethodSnapshot`] when they open.

use serde::{Deserialize, Serialize};

use crate::{PaymentMethodId, PaymentMethodSnapshot, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub owner_id: UserId,
    /// Method name as listings refer to it (e.g. "SBP", "Revolut").
    pub name: String,
    /// Where the counterparty sends fiat (card number, phone, IBAN).
    pub details: String,
    pub active: bool,
}

impl PaymentMethod {
    #[must_use]
    pub fn snapshot(&self) -> PaymentMethodSnapshot {
        PaymentMethodSnapshot {
            id: self.id,
            name: self.name.clone(),
            details: self.details.clone(),
        }
    }
}
