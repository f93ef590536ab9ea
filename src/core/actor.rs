use crate::errors::{AutomationError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentExecuteOptions {
    pub instruction: String,
    pub max_steps: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    pub message: String,
    #[serde(default)]
    pub completed: bool,
}

/// LLM-backed automation service operating on the same page the orchestrator drives.
#[async_trait]
pub trait AiActor: Send + Sync {
    /// Perform one natural-language action; settles or raises
    async fn act(&self, instruction: &str) -> Result<()>;

    /// Extract a structured record matching a JSON schema
    async fn extract(&self, instruction: &str, schema: &Value) -> Result<Value>;

    /// Run a vision-based multi-step agent task
    async fn agent_execute(
        &self,
        config: &AgentConfig,
        options: &AgentExecuteOptions,
    ) -> Result<AgentResult>;
}

/// Actor used when no model credentials are configured. Every call raises,
/// so AI tiers fail cleanly and the direct tiers carry the run.
#[derive(Debug, Clone, Default)]
pub struct DisabledActor {
    reason: String,
}

impl DisabledActor {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> AutomationError {
        AutomationError::ActorFailed(format!("AI actor unavailable: {}", self.reason))
    }
}

#[async_trait]
impl AiActor for DisabledActor {
    async fn act(&self, _instruction: &str) -> Result<()> {
        Err(self.error())
    }

    async fn extract(&self, _instruction: &str, _schema: &Value) -> Result<Value> {
        Err(self.error())
    }

    async fn agent_execute(
        &self,
        _config: &AgentConfig,
        _options: &AgentExecuteOptions,
    ) -> Result<AgentResult> {
        Err(self.error())
    }
}
