//! Wallet collaborator: deposit addresses and on-chain transfers.
//!
//! The desk never talks to a chain itself. Handlers reach the chain
//! through [`WalletClient`]; [`MockWalletClient`] stands in for it in
//! development and tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dealdesk_types::{DealDeskError, Result, UserId};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

#[async_trait]
pub trait WalletClient: Send + Sync {
    /// Address the user deposits `asset` to.
    async fn deposit_address(&self, user: UserId, asset: &str) -> Result<String>;

    /// Send `amount` of `asset` to `to_address`, returning the transaction hash.
    async fn transfer(&self, asset: &str, to_address: &str, amount: Decimal) -> Result<String>;
}

/// Deterministic in-process wallet.
///
/// Addresses are `SHA-256(user ‖ asset)` in hex; transaction hashes are
/// derived from a counter. Transfers can be switched to fail.
#[derive(Debug, Default)]
pub struct MockWalletClient {
    fail_transfers: AtomicBool,
    sent: AtomicU64,
}

impl MockWalletClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following transfer fail (or succeed again).
    pub fn set_fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    /// Number of transfers that succeeded.
    #[must_use]
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    fn hash_hex(parts: &[&[u8]]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl WalletClient for MockWalletClient {
    async fn deposit_address(&self, user: UserId, asset: &str) -> Result<String> {
        let asset = asset.trim().to_ascii_uppercase();
        Ok(Self::hash_hex(&[user.0.as_bytes(), asset.as_bytes()]))
    }

    async fn transfer(&self, asset: &str, to_address: &str, amount: Decimal) -> Result<String> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(DealDeskError::Upstream {
                reason: format!("{asset} transfer to {to_address} rejected"),
            });
        }
        let nonce = self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "0x{}",
            Self::hash_hex(&[
                asset.as_bytes(),
                to_address.as_bytes(),
                amount.to_string().as_bytes(),
                &nonce.to_be_bytes(),
            ])
        ))
    }
}
