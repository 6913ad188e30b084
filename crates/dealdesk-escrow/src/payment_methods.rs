//! Payment method registry.
//!
//! Methods have stable ids. A deal resolves its method by id when it opens
//! and keeps a snapshot, so later edits or deactivation do not alter it.

use std::collections::HashMap;

use dealdesk_types::{DealDeskError, PaymentMethod, PaymentMethodId, Result, UserId, constants};
use tracing::info;

#[derive(Debug, Default)]
pub struct PaymentMethodRegistry {
    methods: HashMap<PaymentMethodId, PaymentMethod>,
    /// Registration order.
    order: Vec<PaymentMethodId>,
}

impl PaymentMethodRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new active method for `owner`.
    ///
    /// # Errors
    /// Returns `Validation` if the name is empty or either field is too long.
    pub fn add(&mut self, owner_id: UserId, name: &str, details: &str) -> Result<PaymentMethod> {
        let name = name.trim();
        let details = details.trim();
        if name.is_empty() {
            return Err(DealDeskError::validation("payment method name must not be empty"));
        }
        if name.len() > constants::MAX_TEXT_LEN || details.len() > constants::MAX_TEXT_LEN {
            return Err(DealDeskError::validation(format!(
                "payment method fields exceed {} characters",
                constants::MAX_TEXT_LEN
            )));
        }

        let method = PaymentMethod {
            id: PaymentMethodId::new(),
            owner_id,
            name: name.to_string(),
            details: details.to_string(),
            active: true,
        };
        self.order.push(method.id);
        self.methods.insert(method.id, method.clone());
        info!(method = %method.id, owner = %owner_id, name = %method.name, "payment method added");
        Ok(method)
    }

    /// Enable or disable a method. Owner only.
    pub fn set_active(
        &mut self,
        id: PaymentMethodId,
        actor: UserId,
        active: bool,
    ) -> Result<PaymentMethod> {
        let method = self
            .methods
            .get_mut(&id)
            .ok_or(DealDeskError::PaymentMethodNotFound(id))?;
        if method.owner_id != actor {
            return Err(DealDeskError::not_authorized(format!(
                "user {actor} does not own payment method {id}"
            )));
        }
        method.active = active;
        info!(method = %id, active, "payment method toggled");
        Ok(method.clone())
    }

    /// Look up a method, failing with `PaymentMethodNotFound`.
    pub fn find(&self, id: PaymentMethodId) -> Result<&PaymentMethod> {
        self.methods
            .get(&id)
            .ok_or(DealDeskError::PaymentMethodNotFound(id))
    }

    #[must_use]
    pub fn get(&self, id: PaymentMethodId) -> Option<&PaymentMethod> {
        self.methods.get(&id)
    }

    /// An owner's methods in registration order.
    #[must_use]
    pub fn list_for(&self, owner: UserId) -> Vec<PaymentMethod> {
        self.order
            .iter()
            .filter_map(|id| self.methods.get(id))
            .filter(|m| m.owner_id == owner)
            .cloned()
            .collect()
    }
}
