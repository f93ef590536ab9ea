use crate::actions::base::{Strategy, StrategyContext, StrategyOutcome};
use crate::core::{AgentConfig, AgentExecuteOptions};
use crate::dom::text_input_candidates;
use crate::errors::{AutomationError, Result};
use crate::types::FieldGroup;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Tier 1: fill the Nth visible input with the Nth field value, counted from
/// the group's input offset.
pub struct DirectFillStrategy {
    candidates: Vec<String>,
}

impl DirectFillStrategy {
    pub const NAME: &'static str = "direct";

    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }
}

impl Default for DirectFillStrategy {
    fn default() -> Self {
        Self::new(text_input_candidates())
    }
}

#[async_trait]
impl Strategy<FieldGroup> for DirectFillStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn attempt(&self, ctx: &StrategyContext<'_>, group: &FieldGroup) -> Result<StrategyOutcome> {
        if group.is_empty() {
            return Ok(StrategyOutcome::new("nothing to fill"));
        }

        let handle = ctx
            .locator
            .locate(ctx.page, &self.candidates, group.input_offset + group.len())
            .await?;
        info!(
            "Found {} input fields with {}, filling them directly",
            handle.count(),
            handle.selector
        );

        // Edits already made stay on the page if a later field fails.
        for (n, field) in group.fields.iter().enumerate() {
            let index = handle.index(group.input_offset + n).ok_or_else(|| {
                AutomationError::strategy(Self::NAME, format!("no element for field {}", n))
            })?;
            ctx.page.clear(&handle.selector, index).await?;
            ctx.page.fill(&handle.selector, index, &field.value).await?;
            debug!("Filled field {} ({}) with: {}", n + 1, field.label, field.value);
        }

        Ok(StrategyOutcome::new(format!(
            "filled {} field(s) via {}",
            group.len(),
            handle.selector
        ))
        .with_applied(group.fields.clone()))
    }
}

/// Tier 2: one natural-language instruction per field, issued in order.
#[derive(Debug, Default)]
pub struct ActFillStrategy;

impl ActFillStrategy {
    pub const NAME: &'static str = "act";

    pub fn instruction(label: &str, value: &str) -> String {
        format!(
            "Click on the text input field under \"{}\" and type \"{}\"",
            label, value
        )
    }
}

#[async_trait]
impl Strategy<FieldGroup> for ActFillStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn attempt(&self, ctx: &StrategyContext<'_>, group: &FieldGroup) -> Result<StrategyOutcome> {
        let mut applied = Vec::new();
        let mut failures = Vec::new();

        // Each instruction stands alone; a failure does not stop the rest.
        for field in &group.fields {
            info!("Using act to fill {}...", field.label);
            match ctx
                .actor
                .act(&Self::instruction(&field.label, &field.value))
                .await
            {
                Ok(()) => applied.push(field.clone()),
                Err(e) => {
                    warn!("act could not fill {}: {}", field.label, e);
                    failures.push(format!("{}: {}", field.label, e));
                }
            }
        }

        Ok(StrategyOutcome::new(format!(
            "{} of {} instruction(s) settled",
            applied.len(),
            group.len()
        ))
        .with_applied(applied)
        .with_failures(failures))
    }
}

/// Optional tier: hand the whole group to a multi-step agent.
pub struct AgentFillStrategy {
    config: AgentConfig,
    max_steps: u32,
}

impl AgentFillStrategy {
    pub const NAME: &'static str = "agent";

    pub fn new(config: AgentConfig, max_steps: u32) -> Self {
        Self { config, max_steps }
    }

    pub fn instruction(group: &FieldGroup) -> String {
        let mut lines = vec![
            "Fill out the form on the current page with the following values:".to_string(),
        ];
        for field in &group.fields {
            lines.push(format!("- {}: {}", field.label, field.value));
        }
        lines.push("Do not submit the form.".to_string());
        lines.join("\n")
    }
}

#[async_trait]
impl Strategy<FieldGroup> for AgentFillStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn attempt(&self, ctx: &StrategyContext<'_>, group: &FieldGroup) -> Result<StrategyOutcome> {
        let options = AgentExecuteOptions {
            instruction: Self::instruction(group),
            max_steps: self.max_steps,
        };
        let result = ctx.actor.agent_execute(&self.config, &options).await?;
        Ok(StrategyOutcome::new(result.message).with_applied(group.fields.clone()))
    }
}
