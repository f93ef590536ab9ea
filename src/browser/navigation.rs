use crate::actions::{click_chain, ChainReport, StrategyChain, StrategyContext};
use crate::core::{settle, AiActor, PageCapability, SettlePolicy};
use crate::dom::FieldLocator;
use crate::errors::{AutomationError, Result};
use crate::types::NavigationIntent;
use tracing::{info, warn};

/// Finds and activates Next/Submit controls, then waits for the page to settle.
pub struct NavigationController {
    chain: StrategyChain<NavigationIntent>,
    locator: FieldLocator,
    settle: SettlePolicy,
}

#[derive(Debug, Clone)]
pub struct NavigationReport {
    pub intent: NavigationIntent,
    pub activated: bool,
    pub settled: bool,
    pub chain: ChainReport,
}

impl NavigationReport {
    /// Next reports failure as `false`; Submit has no further fallback and raises.
    pub fn into_result(self) -> Result<bool> {
        match (self.activated, self.intent) {
            (true, _) => Ok(true),
            (false, NavigationIntent::Next) => Ok(false),
            (false, NavigationIntent::Submit) => {
                Err(AutomationError::SubmitFailed(self.chain.failure_summary()))
            }
        }
    }
}

impl NavigationController {
    pub fn new(locator: FieldLocator, settle: SettlePolicy) -> Self {
        Self::with_chain(click_chain(), locator, settle)
    }

    pub fn with_chain(
        chain: StrategyChain<NavigationIntent>,
        locator: FieldLocator,
        settle: SettlePolicy,
    ) -> Self {
        Self {
            chain,
            locator,
            settle,
        }
    }

    pub async fn advance(
        &self,
        page: &dyn PageCapability,
        intent: NavigationIntent,
        actor: &dyn AiActor,
    ) -> Result<bool> {
        self.attempt(page, intent, actor).await.into_result()
    }

    /// Runs the click chain and reports every tier's outcome without raising.
    pub async fn attempt(
        &self,
        page: &dyn PageCapability,
        intent: NavigationIntent,
        actor: &dyn AiActor,
    ) -> NavigationReport {
        info!("Looking for {} button...", intent);
        let ctx = StrategyContext::new(page, actor, &self.locator);
        let chain = self.chain.run(&ctx, &intent, intent.label()).await;

        if !chain.succeeded() {
            warn!("No strategy could activate the {} control", intent);
            return NavigationReport {
                intent,
                activated: false,
                settled: false,
                chain,
            };
        }

        let settled = match settle(page, &self.settle).await {
            Ok(settled) => settled,
            Err(e) => {
                warn!("Settling after {} failed: {}", intent, e);
                false
            }
        };

        NavigationReport {
            intent,
            activated: true,
            settled,
            chain,
        }
    }
}
