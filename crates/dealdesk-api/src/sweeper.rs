//! Background expiry of overdue deals.
//!
//! Reads already expire a deal lazily; the sweep makes sure reserved
//! listing quantity comes back even if nobody looks at the deal again.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dealdesk_escrow::Desk;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Spawn the sweep loop. It runs until the returned handle is aborted.
pub fn spawn_expiry_sweeper(desk: Arc<Mutex<Desk>>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let expired = desk.lock().expire_overdue(Utc::now());
            if !expired.is_empty() {
                tracing::debug!(count = expired.len(), "sweep expired deals");
            }
        }
    })
}
