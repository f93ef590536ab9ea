use crate::actions::{fill_chain, ChainReport, StrategyChain, StrategyContext};
use crate::browser::navigation::{NavigationController, NavigationReport};
use crate::core::{settle, AiActor, Config, LoadState, PageCapability, SettlePolicy};
use crate::dom::FieldLocator;
use crate::errors::Result;
use crate::extract::extract_entity;
use crate::types::{
    ExtractedEntity, ExtractionStep, FieldGroup, FinalPageSignal, FormDescriptor, FormRunResult,
    NavigationIntent, RunPlan,
};
use crate::verifier::SubmissionVerifier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub entity: Option<ExtractedEntity>,
    pub forms: Vec<FormRunResult>,
}

/// Drives forms one after another on a single page it owns for the whole run.
pub struct RunOrchestrator {
    page: Arc<dyn PageCapability>,
    actor: Arc<dyn AiActor>,
    fill_chain: StrategyChain<FieldGroup>,
    locator: FieldLocator,
    navigation: NavigationController,
    verifier: SubmissionVerifier,
    load_timeout: Duration,
    settle: SettlePolicy,
}

impl RunOrchestrator {
    pub fn new(page: Arc<dyn PageCapability>, actor: Arc<dyn AiActor>, config: &Config) -> Self {
        let locator = FieldLocator::new(config.session.locator_retries, config.session.settle.clone());
        Self {
            page,
            actor,
            fill_chain: fill_chain(&config.strategies.fill, config.strategies.agent_max_steps),
            navigation: NavigationController::new(locator.clone(), config.session.settle.clone()),
            locator,
            verifier: SubmissionVerifier::new(
                &config.verifier,
                config.session.verification_settle.clone(),
            ),
            load_timeout: Duration::from_millis(config.session.load_timeout_ms),
            settle: config.session.settle.clone(),
        }
    }

    pub fn with_fill_chain(mut self, chain: StrategyChain<FieldGroup>) -> Self {
        self.fill_chain = chain;
        self
    }

    /// Runs the optional extraction step, then every form in order.
    pub async fn run_plan(&self, plan: &RunPlan) -> RunOutcome {
        let entity = match &plan.extraction {
            Some(step) => match self.extract(step).await {
                Ok(entity) => Some(entity),
                Err(e) => {
                    error!("Extraction from {} failed: {}", step.url, e);
                    None
                }
            },
            None => None,
        };

        let extracted_group = entity
            .as_ref()
            .map(|e| FieldGroup::new("extracted entity", e.to_field_specs()));

        let mut forms = Vec::with_capacity(plan.forms.len());
        for form in &plan.forms {
            let extra = if form.use_extracted_entity {
                extracted_group.as_ref()
            } else {
                None
            };
            forms.push(self.run_form(form, extra).await);
        }

        RunOutcome { entity, forms }
    }

    /// One result per form. A failure in one form never stops the next.
    pub async fn run(&self, forms: &[FormDescriptor]) -> Vec<FormRunResult> {
        let mut results = Vec::with_capacity(forms.len());
        for form in forms {
            results.push(self.run_form(form, None).await);
        }
        results
    }

    pub async fn run_form(&self, form: &FormDescriptor, extra: Option<&FieldGroup>) -> FormRunResult {
        let mut result = FormRunResult::new(form);
        if let Err(e) = self.drive_form(form, extra, &mut result).await {
            error!("Error during form '{}': {}", form.name, e);
            result.record_error(e.to_string());
        }
        result.finish();

        info!(
            form = %form.name,
            submitted = result.submission_succeeded(),
            navigation = result.navigation_succeeded(),
            "{}",
            result.message()
        );
        result
    }

    async fn drive_form(
        &self,
        form: &FormDescriptor,
        extra: Option<&FieldGroup>,
        result: &mut FormRunResult,
    ) -> Result<()> {
        let page = self.page.as_ref();

        info!("Navigating to {}", form.url);
        page.goto(&form.url).await?;
        self.wait_until_loaded().await;
        self.settle_after_load().await;
        if form.is_multi_page() {
            debug!("Form '{}' spans {} pages", form.name, form.pages.len());
        }

        let mut pages: Vec<Vec<&FieldGroup>> = form
            .pages
            .iter()
            .map(|p| p.groups.iter().collect())
            .collect();
        if let Some(extra) = extra {
            match pages.first_mut() {
                Some(first) => first.push(extra),
                None => pages.push(vec![extra]),
            }
        }

        let page_count = pages.len();
        for (i, groups) in pages.into_iter().enumerate() {
            let mut offset = 0;
            for group in groups {
                let group = group.clone().with_input_offset(offset);
                offset += group.len();
                self.fill_group(&group, result).await;
            }

            if i + 1 < page_count {
                let report = self
                    .navigation
                    .attempt(page, NavigationIntent::Next, self.actor.as_ref())
                    .await;
                let advanced = report.activated;
                record_navigation(&report, result);
                if !advanced {
                    result.mark_navigation_failed();
                    let message = format!("Could not advance past page {} of {}", i + 1, page_count);
                    result.record_error(message.clone());
                    result.record_verification(false, FinalPageSignal::Unknown, message);
                    return Ok(());
                }
            }
        }

        if !form.submit {
            result.record_verification(
                false,
                FinalPageSignal::Unknown,
                "Form filled; submission not requested",
            );
            return Ok(());
        }

        let report = self
            .navigation
            .attempt(page, NavigationIntent::Submit, self.actor.as_ref())
            .await;
        record_navigation(&report, result);
        if let Err(e) = report.into_result() {
            error!("{}", e);
            result.mark_navigation_failed();
            result.record_error(e.to_string());
        }

        // The page may show a confirmation even when no tier reported the click.
        let verifier = match &form.success_phrases {
            Some(phrases) => self.verifier.clone().with_phrases(phrases.clone()),
            None => self.verifier.clone(),
        };
        let verification = verifier.verify(page).await;
        result.record_verification(verification.success, verification.signal, verification.message);
        Ok(())
    }

    async fn fill_group(&self, group: &FieldGroup, result: &mut FormRunResult) {
        info!("Filling field group '{}' ({} field(s))", group.name, group.len());
        let ctx = StrategyContext::new(self.page.as_ref(), self.actor.as_ref(), &self.locator);
        let report = self.fill_chain.run(&ctx, group, &group.name).await;
        record_chain(&report, result);

        if !report.succeeded() {
            result.record_error(format!(
                "field group '{}' not filled: {}",
                group.name,
                report.failure_summary()
            ));
        }
    }

    async fn wait_until_loaded(&self) {
        if let Err(e) = self
            .page
            .wait_for_load_state(LoadState::NetworkIdle, self.load_timeout)
            .await
        {
            warn!("Page did not reach network idle ({}), proceeding anyway", e);
        }
    }

    async fn settle_after_load(&self) {
        if let Err(e) = settle(self.page.as_ref(), &self.settle).await {
            warn!("Page did not settle after load ({}), proceeding anyway", e);
        }
    }

    async fn extract(&self, step: &ExtractionStep) -> Result<ExtractedEntity> {
        info!("Reading source document at {}", step.url);
        self.page.goto(&step.url).await?;
        self.wait_until_loaded().await;
        self.settle_after_load().await;
        extract_entity(self.actor.as_ref(), &step.instruction).await
    }
}

fn record_chain(report: &ChainReport, result: &mut FormRunResult) {
    for strategy_result in &report.results {
        result.record_strategy(strategy_result.clone());
    }
    for (strategy, applied) in &report.applied {
        result.record_applied(strategy, applied.clone());
    }
}

fn record_navigation(report: &NavigationReport, result: &mut FormRunResult) {
    for strategy_result in &report.chain.results {
        result.record_strategy(strategy_result.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{control_candidates, text_input_candidates};
    use crate::testing::{MockPage, MockView, ScriptedActor};
    use crate::types::FieldSpec;

    const FORM_URL: &str = "https://docs.google.com/forms/d/e/fintrac/viewform";

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.session.settle = SettlePolicy::none();
        config.session.verification_settle = SettlePolicy::none();
        config.session.locator_retries = 0;
        config
    }

    fn corp_group() -> FieldGroup {
        FieldGroup::new(
            "corporation",
            vec![
                FieldSpec::new("Legal Name of Corporation", "MapleLeaf Financial Services Inc."),
                FieldSpec::new("Business Number", "123456789RT0001"),
            ],
        )
    }

    fn submitted_view() -> MockView {
        MockView::new()
            .with_url("https://docs.google.com/forms/d/e/fintrac/formResponse")
            .with_body_text("Your response has been recorded.")
    }

    #[tokio::test]
    async fn single_page_form_fills_submits_and_verifies() {
        let inputs = text_input_candidates()[0].clone();
        let submit = control_candidates(NavigationIntent::Submit)[2].clone();
        let page = Arc::new(MockPage::new("about:blank"));
        page.add_view(
            FORM_URL,
            MockView::new().with_elements(&inputs, 2).with_elements(&submit, 1),
        );
        page.on_click(&submit, submitted_view());

        let orchestrator =
            RunOrchestrator::new(page.clone(), Arc::new(ScriptedActor::new()), &quiet_config());
        let form = FormDescriptor::new("fintrac", FORM_URL).with_page(vec![corp_group()]);

        let results = orchestrator.run(&[form]).await;
        let result = &results[0];

        assert!(result.submission_succeeded());
        assert!(result.navigation_succeeded());
        assert_eq!(result.final_page_signal(), FinalPageSignal::SuccessPhraseMatched);
        assert_eq!(result.fields_filled_by("direct").len(), 2);
        assert!(result.errors().is_empty());
        assert!(result.finished_at().is_some());
    }

    #[tokio::test]
    async fn failed_next_stops_the_form_without_submitting() {
        let page = Arc::new(MockPage::new("about:blank"));
        let actor = Arc::new(ScriptedActor::new().fail_everything());
        let orchestrator = RunOrchestrator::new(page.clone(), actor.clone(), &quiet_config());
        let form = FormDescriptor::new("two-pages", FORM_URL)
            .with_page(vec![])
            .with_page(vec![corp_group()]);

        let result = orchestrator.run_form(&form, None).await;

        assert!(!result.navigation_succeeded());
        assert!(!result.submission_succeeded());
        assert!(actor
            .instructions()
            .iter()
            .all(|i| !i.contains("Submit")));
    }

    #[tokio::test]
    async fn load_timeout_is_not_fatal() {
        let page = Arc::new(MockPage::new("about:blank"));
        page.set_load_times_out(true);
        page.add_view(FORM_URL, submitted_view());
        let orchestrator =
            RunOrchestrator::new(page.clone(), Arc::new(ScriptedActor::new()), &quiet_config());

        let result = orchestrator
            .run_form(&FormDescriptor::new("f", FORM_URL), None)
            .await;

        assert!(result.submission_succeeded());
    }

    #[tokio::test]
    async fn extracted_entity_feeds_opted_in_forms() {
        let inputs = text_input_candidates()[0].clone();
        let page = Arc::new(MockPage::new("about:blank"));
        page.add_view(FORM_URL, MockView::new().with_elements(&inputs, 1));
        let actor = Arc::new(ScriptedActor::new().with_extract_response(serde_json::json!({
            "legalName": "MaplePay Technologies Inc.",
            "beneficialOwners": []
        })));
        let orchestrator = RunOrchestrator::new(page.clone(), actor, &quiet_config());

        let mut opted_in = FormDescriptor::new("kyc", FORM_URL).without_submit();
        opted_in.use_extracted_entity = true;
        let plan = RunPlan {
            extraction: Some(ExtractionStep {
                url: "https://example.com/articles.pdf".to_string(),
                instruction: "Extract the corporation details".to_string(),
            }),
            forms: vec![opted_in],
        };

        let outcome = orchestrator.run_plan(&plan).await;

        assert!(outcome.entity.is_some());
        assert_eq!(page.values(&inputs), vec!["MaplePay Technologies Inc."]);
        assert_eq!(
            outcome.forms[0].fields_filled_by("direct")[0].label,
            "Legal Name of Corporation"
        );
        assert_eq!(page.visits()[0], "https://example.com/articles.pdf");
    }

    #[tokio::test]
    async fn failed_settle_does_not_stop_extraction() {
        let page = Arc::new(MockPage::new("about:blank"));
        page.set_settle_fails(true);
        let actor = Arc::new(ScriptedActor::new().with_extract_response(serde_json::json!({
            "legalName": "MaplePay Technologies Inc.",
            "beneficialOwners": []
        })));
        let mut config = quiet_config();
        config.session.settle = SettlePolicy::default();
        let orchestrator = RunOrchestrator::new(page.clone(), actor, &config);

        let plan = RunPlan {
            extraction: Some(ExtractionStep {
                url: "https://example.com/articles.pdf".to_string(),
                instruction: "Extract the corporation details".to_string(),
            }),
            forms: vec![],
        };

        let outcome = orchestrator.run_plan(&plan).await;

        assert!(page.settle_calls() > 0);
        assert_eq!(
            outcome.entity.map(|e| e.legal_name),
            Some("MaplePay Technologies Inc.".to_string())
        );
    }
}
