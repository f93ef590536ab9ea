use crate::core::PageCapability;
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// How to wait for asynchronous page updates after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlePolicy {
    /// Sleep for a fixed duration
    Fixed { delay_ms: u64 },
    /// Wait for the page to report `quiet_ms` without DOM mutations, bounded by `timeout_ms`
    DomQuiet { quiet_ms: u64, timeout_ms: u64 },
}

impl Default for SettlePolicy {
    fn default() -> Self {
        SettlePolicy::DomQuiet {
            quiet_ms: 500,
            timeout_ms: 30_000,
        }
    }
}

impl SettlePolicy {
    pub fn none() -> Self {
        SettlePolicy::Fixed { delay_ms: 0 }
    }
}

/// Returns whether the page reported itself settled. A timed-out settle is not an error;
/// the caller proceeds either way.
pub async fn settle(page: &dyn PageCapability, policy: &SettlePolicy) -> Result<bool> {
    match policy {
        SettlePolicy::Fixed { delay_ms } => {
            if *delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
            }
            Ok(true)
        }
        SettlePolicy::DomQuiet {
            quiet_ms,
            timeout_ms,
        } => {
            let settled = page
                .wait_for_dom_settled(
                    Duration::from_millis(*quiet_ms),
                    Duration::from_millis(*timeout_ms),
                )
                .await?;
            if !settled {
                debug!("DOM did not settle within {}ms, continuing", timeout_ms);
            }
            Ok(settled)
        }
    }
}
