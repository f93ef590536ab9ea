use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

impl LoadState {
    pub fn name(&self) -> &'static str {
        match self {
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::Load => "load",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

/// Page capability driven by the orchestrator.
///
/// Elements are addressed by a selector expression plus the index of the match
/// in document order, so a handle stays meaningful across separate calls.
#[async_trait]
pub trait PageCapability: Send + Sync {
    /// Navigate to a URL
    async fn goto(&self, url: &str) -> Result<()>;

    /// Wait until the page reaches `state`, failing with `LoadTimeout` after `timeout`
    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()>;

    /// Number of elements matching the selector
    async fn count(&self, selector: &str) -> Result<usize>;

    async fn is_visible(&self, selector: &str, index: usize) -> Result<bool>;

    async fn click(&self, selector: &str, index: usize) -> Result<()>;

    async fn clear(&self, selector: &str, index: usize) -> Result<()>;

    /// Set the value of the matched element, firing input/change events
    async fn fill(&self, selector: &str, index: usize, value: &str) -> Result<()>;

    /// Current URL
    async fn url(&self) -> Result<String>;

    /// Text content of the first element matching the selector
    async fn text_content(&self, selector: &str) -> Result<Option<String>>;

    /// Resolves `true` once the DOM has gone `quiet` without mutations, `false` if
    /// `timeout` passes first. Backends without mutation tracking just wait `quiet`.
    async fn wait_for_dom_settled(&self, quiet: Duration, timeout: Duration) -> Result<bool> {
        let _ = timeout;
        tokio::time::sleep(quiet).await;
        Ok(true)
    }
}
