pub mod base;
pub mod chain;
pub mod click;
pub mod fill;

pub use base::{Strategy, StrategyContext, StrategyOutcome};
pub use chain::{ChainReport, StrategyChain};
pub use click::{ActClickStrategy, DirectClickStrategy};
pub use fill::{ActFillStrategy, AgentFillStrategy, DirectFillStrategy};

use crate::core::{AgentConfig, StrategyKind};
use crate::types::{FieldGroup, NavigationIntent};

/// Builds the fill chain from configured tier order.
pub fn fill_chain(kinds: &[StrategyKind], agent_max_steps: u32) -> StrategyChain<FieldGroup> {
    let mut chain = StrategyChain::new();
    for kind in kinds {
        match kind {
            StrategyKind::Direct => {
                chain = chain.with_strategy(DirectFillStrategy::default());
            }
            StrategyKind::Act => {
                chain = chain.with_strategy(ActFillStrategy);
            }
            StrategyKind::Agent => {
                chain = chain.with_strategy(AgentFillStrategy::new(
                    AgentConfig::default(),
                    agent_max_steps,
                ));
            }
        }
    }
    chain
}

/// Direct click first, then act.
pub fn click_chain() -> StrategyChain<NavigationIntent> {
    StrategyChain::new()
        .with_strategy(DirectClickStrategy::default())
        .with_strategy(ActClickStrategy)
}
