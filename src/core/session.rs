use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A remote browser session ready to be driven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedSession {
    pub session_id: String,
    /// Live view of the session for the dashboard
    pub debug_url: String,
    /// CDP websocket endpoint
    pub connect_url: String,
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Create a session. Credential and creation errors are terminal for the run.
    async fn provision(&self) -> Result<ProvisionedSession>;
}
