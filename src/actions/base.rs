use crate::core::{AiActor, PageCapability};
use crate::dom::FieldLocator;
use crate::errors::Result;
use crate::types::FieldSpec;
use async_trait::async_trait;

/// What a successful strategy attempt did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyOutcome {
    /// Fields this attempt reports as set. Best effort, not a per-field guarantee.
    pub applied: Vec<FieldSpec>,
    /// Errors of independent sub-steps. Any entry marks the attempt as failed
    /// while keeping what was applied.
    pub failures: Vec<String>,
    pub message: String,
}

impl StrategyOutcome {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            applied: Vec::new(),
            failures: Vec::new(),
            message: message.into(),
        }
    }

    pub fn with_applied(mut self, applied: Vec<FieldSpec>) -> Self {
        self.applied = applied;
        self
    }

    pub fn with_failures(mut self, failures: Vec<String>) -> Self {
        self.failures = failures;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Everything a strategy may touch. The page and actor are shared by reference
/// and driven one awaited call at a time.
pub struct StrategyContext<'a> {
    pub page: &'a dyn PageCapability,
    pub actor: &'a dyn AiActor,
    pub locator: &'a FieldLocator,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        page: &'a dyn PageCapability,
        actor: &'a dyn AiActor,
        locator: &'a FieldLocator,
    ) -> Self {
        Self {
            page,
            actor,
            locator,
        }
    }
}

/// One tier of a fallback chain over targets of type `T`.
#[async_trait]
pub trait Strategy<T: ?Sized + Sync>: Send + Sync {
    /// Name recorded in results
    fn name(&self) -> &str;

    /// Attempt the target. An `Err` means this tier failed and the next one runs.
    async fn attempt(&self, ctx: &StrategyContext<'_>, target: &T) -> Result<StrategyOutcome>;
}
