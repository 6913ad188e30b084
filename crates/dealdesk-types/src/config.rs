//! Configuration for the escrow desk.

use serde::{Deserialize, Serialize};

use crate::{DealDeskError, Result, constants};

/// Policy knobs of the deal lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    /// Payment window used when a listing does not set its own.
    pub default_payment_time_minutes: u32,
    /// After a payment claim, minutes until a single party may cancel
    /// without the counterparty's agreement.
    pub post_claim_cancel_minutes: u32,
    /// Interval of the background expiry sweep.
    pub sweep_interval_secs: u64,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            default_payment_time_minutes: constants::DEFAULT_PAYMENT_TIME_MINUTES,
            post_claim_cancel_minutes: constants::DEFAULT_POST_CLAIM_CANCEL_MINUTES,
            sweep_interval_secs: constants::DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl DeskConfig {
    /// Reject values the lifecycle cannot work with.
    pub fn validate(&self) -> Result<()> {
        let window =
            constants::MIN_PAYMENT_TIME_MINUTES..=constants::MAX_PAYMENT_TIME_MINUTES;
        if !window.contains(&self.default_payment_time_minutes) {
            return Err(DealDeskError::Configuration(format!(
                "default_payment_time_minutes must be within {}..={}, got {}",
                constants::MIN_PAYMENT_TIME_MINUTES,
                constants::MAX_PAYMENT_TIME_MINUTES,
                self.default_payment_time_minutes
            )));
        }
        if self.post_claim_cancel_minutes == 0 {
            return Err(DealDeskError::Configuration(
                "post_claim_cancel_minutes must be > 0".into(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(DealDeskError::Configuration(
                "sweep_interval_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}
