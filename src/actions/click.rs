use crate::actions::base::{Strategy, StrategyContext, StrategyOutcome};
use crate::dom::control_candidates;
use crate::errors::{AutomationError, Result};
use crate::types::NavigationIntent;
use async_trait::async_trait;
use tracing::info;

/// Tier 1: click the first visible element matching the intent's selector patterns.
#[derive(Debug, Default)]
pub struct DirectClickStrategy {
    overrides: Option<Vec<String>>,
}

impl DirectClickStrategy {
    pub const NAME: &'static str = "direct";

    /// Use `candidates` for every intent instead of the built-in patterns
    pub fn with_candidates(candidates: Vec<String>) -> Self {
        Self {
            overrides: Some(candidates),
        }
    }
}

#[async_trait]
impl Strategy<NavigationIntent> for DirectClickStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn attempt(
        &self,
        ctx: &StrategyContext<'_>,
        intent: &NavigationIntent,
    ) -> Result<StrategyOutcome> {
        let candidates = match &self.overrides {
            Some(candidates) => candidates.clone(),
            None => control_candidates(*intent),
        };
        let handle = ctx.locator.locate(ctx.page, &candidates, 1).await?;
        let index = handle
            .first()
            .ok_or_else(|| AutomationError::ElementNotFound(handle.selector.clone()))?;

        ctx.page.click(&handle.selector, index).await?;
        info!("Clicked {} control directly via {}", intent, handle.selector);
        Ok(StrategyOutcome::new(format!("clicked {}", handle.selector)))
    }
}

/// Tier 2: ask the actor to find and click the control.
#[derive(Debug, Default)]
pub struct ActClickStrategy;

impl ActClickStrategy {
    pub const NAME: &'static str = "act";

    pub fn instruction(intent: NavigationIntent) -> String {
        match intent {
            NavigationIntent::Next => {
                "Find and click the Next button to go to the next page of the form".to_string()
            }
            NavigationIntent::Submit => {
                "Find and click the Submit button to submit the form".to_string()
            }
        }
    }
}

#[async_trait]
impl Strategy<NavigationIntent> for ActClickStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn attempt(
        &self,
        ctx: &StrategyContext<'_>,
        intent: &NavigationIntent,
    ) -> Result<StrategyOutcome> {
        info!("Using act to find and click the {} button...", intent);
        ctx.actor.act(&Self::instruction(*intent)).await?;
        Ok(StrategyOutcome::new(format!("{} clicked via act", intent)))
    }
}
