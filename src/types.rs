use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::errors::{AutomationError, Result};

/// A single value to enter into a form, addressed by its human-readable label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub label: String,
    pub value: String,
}

impl FieldSpec {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Fields filled together under one strategy attempt. Order is fill order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldGroup {
    pub name: String,
    pub fields: Vec<FieldSpec>,
    /// Position of the group's first field among the page's text inputs.
    /// Assigned per page by the orchestrator from the groups before it.
    #[serde(skip)]
    pub input_offset: usize,
}

impl FieldGroup {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
            input_offset: 0,
        }
    }

    pub fn with_input_offset(mut self, offset: usize) -> Self {
        self.input_offset = offset;
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One page of a (possibly multi-page) form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormPageSpec {
    #[serde(default)]
    pub groups: Vec<FieldGroup>,
}

fn default_submit() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDescriptor {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub pages: Vec<FormPageSpec>,
    #[serde(default = "default_submit")]
    pub submit: bool,
    /// Overrides the verifier's configured success phrases for this form.
    #[serde(default)]
    pub success_phrases: Option<Vec<String>>,
    #[serde(default)]
    pub use_extracted_entity: bool,
}

impl FormDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            pages: Vec::new(),
            submit: true,
            success_phrases: None,
            use_extracted_entity: false,
        }
    }

    pub fn with_page(mut self, groups: Vec<FieldGroup>) -> Self {
        self.pages.push(FormPageSpec { groups });
        self
    }

    pub fn without_submit(mut self) -> Self {
        self.submit = false;
        self
    }

    pub fn is_multi_page(&self) -> bool {
        self.pages.len() > 1
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.url).map_err(|e| {
            AutomationError::ConfigurationError(format!(
                "form '{}' has an invalid url '{}': {}",
                self.name, self.url, e
            ))
        })?;
        Ok(())
    }
}

/// Document to read before the forms run; its entity feeds downstream forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStep {
    pub url: String,
    pub instruction: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    #[serde(default)]
    pub extraction: Option<ExtractionStep>,
    #[serde(default)]
    pub forms: Vec<FormDescriptor>,
}

impl RunPlan {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let plan: RunPlan = serde_json::from_str(&raw)?;
        for form in &plan.forms {
            form.validate()?;
        }
        Ok(plan)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationIntent {
    Next,
    Submit,
}

impl NavigationIntent {
    pub fn label(&self) -> &'static str {
        match self {
            NavigationIntent::Next => "Next",
            NavigationIntent::Submit => "Submit",
        }
    }
}

impl fmt::Display for NavigationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one strategy attempt against one target (field group or control).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub strategy: String,
    pub target: String,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl StrategyResult {
    pub fn success(strategy: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            target: target.into(),
            succeeded: true,
            error: None,
        }
    }

    pub fn failure(
        strategy: impl Into<String>,
        target: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            target: target.into(),
            succeeded: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalPageSignal {
    SuccessPhraseMatched,
    UrlPatternMatched,
    Unknown,
}

/// Accumulated record of one form's run. Only grows while the run is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRunResult {
    form: String,
    url: String,
    fields_filled_by_strategy: BTreeMap<String, Vec<FieldSpec>>,
    strategy_results: Vec<StrategyResult>,
    navigation_succeeded: bool,
    submission_succeeded: bool,
    final_page_signal: FinalPageSignal,
    message: String,
    errors: Vec<String>,
    started_at: chrono::DateTime<chrono::Utc>,
    finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl FormRunResult {
    pub fn new(form: &FormDescriptor) -> Self {
        Self {
            form: form.name.clone(),
            url: form.url.clone(),
            fields_filled_by_strategy: BTreeMap::new(),
            strategy_results: Vec::new(),
            navigation_succeeded: true,
            submission_succeeded: false,
            final_page_signal: FinalPageSignal::Unknown,
            message: "Form submission attempted".to_string(),
            errors: Vec::new(),
            started_at: chrono::Utc::now(),
            finished_at: None,
        }
    }

    pub fn form(&self) -> &str {
        &self.form
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fields_filled_by_strategy(&self) -> &BTreeMap<String, Vec<FieldSpec>> {
        &self.fields_filled_by_strategy
    }

    pub fn fields_filled_by(&self, strategy: &str) -> &[FieldSpec] {
        self.fields_filled_by_strategy
            .get(strategy)
            .map(|fields| fields.as_slice())
            .unwrap_or(&[])
    }

    pub fn strategy_results(&self) -> &[StrategyResult] {
        &self.strategy_results
    }

    pub fn navigation_succeeded(&self) -> bool {
        self.navigation_succeeded
    }

    pub fn submission_succeeded(&self) -> bool {
        self.submission_succeeded
    }

    pub fn final_page_signal(&self) -> FinalPageSignal {
        self.final_page_signal
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn finished_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.finished_at
    }

    pub(crate) fn record_strategy(&mut self, result: StrategyResult) {
        self.strategy_results.push(result);
    }

    pub(crate) fn record_applied(&mut self, strategy: &str, fields: Vec<FieldSpec>) {
        if fields.is_empty() {
            return;
        }
        self.fields_filled_by_strategy
            .entry(strategy.to_string())
            .or_default()
            .extend(fields);
    }

    pub(crate) fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub(crate) fn mark_navigation_failed(&mut self) {
        self.navigation_succeeded = false;
    }

    pub(crate) fn record_verification(
        &mut self,
        success: bool,
        signal: FinalPageSignal,
        message: impl Into<String>,
    ) {
        self.submission_succeeded = success;
        self.final_page_signal = signal;
        self.message = message.into();
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(chrono::Utc::now());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeneficialOwner {
    pub name: String,
    #[serde(default)]
    pub ownership_percentage: Option<String>,
}

/// Corporation record read out of a source document by the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEntity {
    pub legal_name: String,
    #[serde(default)]
    pub business_number: Option<String>,
    #[serde(default)]
    pub beneficial_owners: Vec<BeneficialOwner>,
    #[serde(default)]
    pub compliance_officer_name: Option<String>,
}

impl ExtractedEntity {
    /// Flattens the record into fill values, skipping absent optionals.
    pub fn to_field_specs(&self) -> Vec<FieldSpec> {
        let mut fields = vec![FieldSpec::new(
            "Legal Name of Corporation",
            self.legal_name.clone(),
        )];

        if let Some(number) = &self.business_number {
            fields.push(FieldSpec::new("Business Number", number.clone()));
        }

        for (i, owner) in self.beneficial_owners.iter().enumerate() {
            let n = i + 1;
            fields.push(FieldSpec::new(
                format!("Beneficial Owner {} Name", n),
                owner.name.clone(),
            ));
            if let Some(pct) = &owner.ownership_percentage {
                fields.push(FieldSpec::new(
                    format!("Beneficial Owner {} Ownership Percentage", n),
                    pct.clone(),
                ));
            }
        }

        if let Some(officer) = &self.compliance_officer_name {
            fields.push(FieldSpec::new("Compliance Officer Name", officer.clone()));
        }

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_flattens_in_declared_order() {
        let entity = ExtractedEntity {
            legal_name: "MaplePay Technologies Inc.".into(),
            business_number: Some("987654321RC0001".into()),
            beneficial_owners: vec![
                BeneficialOwner {
                    name: "Alex Chen".into(),
                    ownership_percentage: Some("60%".into()),
                },
                BeneficialOwner {
                    name: "Priya Singh".into(),
                    ownership_percentage: None,
                },
            ],
            compliance_officer_name: None,
        };

        let labels: Vec<_> = entity
            .to_field_specs()
            .into_iter()
            .map(|f| f.label)
            .collect();
        assert_eq!(
            labels,
            vec![
                "Legal Name of Corporation",
                "Business Number",
                "Beneficial Owner 1 Name",
                "Beneficial Owner 1 Ownership Percentage",
                "Beneficial Owner 2 Name",
            ]
        );
    }

    #[test]
    fn plan_defaults_submit_to_true() {
        let plan: RunPlan = serde_json::from_value(serde_json::json!({
            "forms": [{
                "name": "fintrac",
                "url": "https://docs.google.com/forms/d/e/x/viewform",
                "pages": [{ "groups": [{ "name": "corp", "fields": [
                    { "label": "Legal Name of Corporation", "value": "MapleLeaf Financial Services Inc." }
                ]}]}]
            }]
        }))
        .unwrap();

        let form = &plan.forms[0];
        assert!(form.submit);
        assert!(!form.use_extracted_entity);
        assert!(form.validate().is_ok());
        assert!(plan.extraction.is_none());
    }

    #[test]
    fn invalid_form_url_is_rejected() {
        let form = FormDescriptor::new("broken", "not a url");
        assert!(matches!(
            form.validate(),
            Err(AutomationError::ConfigurationError(_))
        ));
    }

    #[test]
    fn applied_fields_accumulate_per_strategy() {
        let form = FormDescriptor::new("f", "https://example.com");
        let mut result = FormRunResult::new(&form);
        result.record_applied("direct", vec![FieldSpec::new("a", "1")]);
        result.record_applied("direct", vec![FieldSpec::new("b", "2")]);
        result.record_applied("act", vec![]);

        assert_eq!(result.fields_filled_by("direct").len(), 2);
        assert!(result.fields_filled_by("act").is_empty());
        assert!(!result.fields_filled_by_strategy().contains_key("act"));
    }
}
