use crate::actions::base::{Strategy, StrategyContext, StrategyOutcome};
use crate::types::{FieldSpec, StrategyResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ordered fallback chain. Tiers run one after another, never concurrently,
/// and the first complete success ends the chain.
pub struct StrategyChain<T: ?Sized + Sync> {
    strategies: Vec<Arc<dyn Strategy<T>>>,
}

#[derive(Debug, Clone, Default)]
pub struct ChainReport {
    /// One entry per tier attempted, in order
    pub results: Vec<StrategyResult>,
    /// Fields each attempted tier reported as set, including failed tiers' partial work
    pub applied: Vec<(String, Vec<FieldSpec>)>,
    pub winner: Option<String>,
    pub outcome: Option<StrategyOutcome>,
}

impl ChainReport {
    pub fn succeeded(&self) -> bool {
        self.winner.is_some()
    }

    pub fn failure_summary(&self) -> String {
        self.results
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {}", r.strategy, e)))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl<T: ?Sized + Sync> StrategyChain<T> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy<S: Strategy<T> + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    pub fn push(&mut self, strategy: Arc<dyn Strategy<T>>) {
        self.strategies.push(strategy);
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub async fn run(&self, ctx: &StrategyContext<'_>, target: &T, label: &str) -> ChainReport {
        let mut report = ChainReport::default();

        for strategy in &self.strategies {
            let name = strategy.name().to_string();
            debug!("Trying strategy {} for {}", name, label);

            match strategy.attempt(ctx, target).await {
                Ok(outcome) if outcome.is_complete() => {
                    info!("Strategy {} succeeded for {}: {}", name, label, outcome.message);
                    report.results.push(StrategyResult::success(&name, label));
                    report.applied.push((name.clone(), outcome.applied.clone()));
                    report.winner = Some(name);
                    report.outcome = Some(outcome);
                    return report;
                }
                Ok(outcome) => {
                    let reason = outcome.failures.join("; ");
                    warn!("Strategy {} partially failed for {}: {}", name, label, reason);
                    report.results.push(StrategyResult::failure(&name, label, reason));
                    report.applied.push((name, outcome.applied));
                }
                Err(e) => {
                    if e.is_locator_miss() {
                        info!("Strategy {} found no usable elements for {}, escalating", name, label);
                    } else {
                        warn!("Strategy {} failed for {}: {}", name, label, e);
                    }
                    report.results.push(StrategyResult::failure(&name, label, e.to_string()));
                }
            }
        }

        warn!("All {} strategies failed for {}", self.strategies.len(), label);
        report
    }
}

impl<T: ?Sized + Sync> Default for StrategyChain<T> {
    fn default() -> Self {
        Self::new()
    }
}
