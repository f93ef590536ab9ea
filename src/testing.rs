//! In-memory page and actor doubles for exercising the orchestration logic
//! without a browser or a model.

use crate::core::{AgentConfig, AgentExecuteOptions, AgentResult, AiActor, LoadState, PageCapability};
use crate::errors::{AutomationError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MockElement {
    pub value: String,
    pub visible: bool,
}

/// What the page looks like at one point in time.
#[derive(Debug, Clone, Default)]
pub struct MockView {
    url: Option<String>,
    body_text: String,
    selectors: HashMap<String, Vec<MockElement>>,
}

impl MockView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` visible elements matching `selector`
    pub fn with_elements(mut self, selector: &str, count: usize) -> Self {
        let elements = self.selectors.entry(selector.to_string()).or_default();
        for _ in 0..count {
            elements.push(MockElement {
                value: String::new(),
                visible: true,
            });
        }
        self
    }

    pub fn with_hidden_elements(mut self, selector: &str, count: usize) -> Self {
        let elements = self.selectors.entry(selector.to_string()).or_default();
        for _ in 0..count {
            elements.push(MockElement {
                value: String::new(),
                visible: false,
            });
        }
        self
    }

    pub fn with_body_text(mut self, text: &str) -> Self {
        self.body_text = text.to_string();
        self
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    url: String,
    view: MockView,
    views_by_url: HashMap<String, MockView>,
    click_effects: HashMap<String, MockView>,
    fill_failures: HashSet<(String, usize)>,
    failing_urls: HashSet<String>,
    load_times_out: bool,
    unsettled: bool,
    settle_fails: bool,
    reads_fail: bool,
    settle_calls: usize,
    clicks: Vec<(String, usize)>,
    visits: Vec<String>,
}

pub struct MockPage {
    state: Mutex<MockState>,
}

impl MockPage {
    pub fn new(url: &str) -> Self {
        Self {
            state: Mutex::new(MockState {
                url: url.to_string(),
                ..Default::default()
            }),
        }
    }

    /// Page showing `view` right away
    pub fn with_view(url: &str, view: MockView) -> Self {
        let page = Self::new(url);
        page.lock().view = view;
        page
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// View loaded by `goto(url)`
    pub fn add_view(&self, url: &str, view: MockView) {
        self.lock().views_by_url.insert(url.to_string(), view);
    }

    /// View that replaces the current one after any element of `selector` is clicked
    pub fn on_click(&self, selector: &str, view: MockView) {
        self.lock().click_effects.insert(selector.to_string(), view);
    }

    pub fn fail_fill(&self, selector: &str, index: usize) {
        self.lock()
            .fill_failures
            .insert((selector.to_string(), index));
    }

    pub fn fail_goto(&self, url: &str) {
        self.lock().failing_urls.insert(url.to_string());
    }

    pub fn set_load_times_out(&self, times_out: bool) {
        self.lock().load_times_out = times_out;
    }

    pub fn set_settles(&self, settles: bool) {
        self.lock().unsettled = !settles;
    }

    pub fn set_body_text(&self, text: &str) {
        self.lock().view.body_text = text.to_string();
    }

    /// Makes the DOM settle wait raise instead of reporting a result
    pub fn set_settle_fails(&self, fails: bool) {
        self.lock().settle_fails = fails;
    }

    /// Makes `url()` and `text_content()` raise, as on a crashed or detached tab
    pub fn fail_reads(&self) {
        self.lock().reads_fail = true;
    }

    fn check_readable(&self) -> Result<()> {
        if self.lock().reads_fail {
            return Err(AutomationError::JavaScriptFailed(
                "Cannot find context with specified id".to_string(),
            ));
        }
        Ok(())
    }

    pub fn values(&self, selector: &str) -> Vec<String> {
        self.lock()
            .view
            .selectors
            .get(selector)
            .map(|els| els.iter().map(|e| e.value.clone()).collect())
            .unwrap_or_default()
    }

    pub fn clicks(&self) -> Vec<(String, usize)> {
        self.lock().clicks.clone()
    }

    pub fn visits(&self) -> Vec<String> {
        self.lock().visits.clone()
    }

    pub fn settle_calls(&self) -> usize {
        self.lock().settle_calls
    }

    fn with_element<T>(
        &self,
        selector: &str,
        index: usize,
        f: impl FnOnce(&mut MockElement) -> T,
    ) -> Result<T> {
        let mut state = self.lock();
        let element = state
            .view
            .selectors
            .get_mut(selector)
            .and_then(|els| els.get_mut(index))
            .ok_or_else(|| {
                AutomationError::ElementNotFound(format!("{} [{}]", selector, index))
            })?;
        Ok(f(element))
    }
}

#[async_trait]
impl PageCapability for MockPage {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut state = self.lock();
        state.visits.push(url.to_string());
        if state.failing_urls.contains(url) {
            return Err(AutomationError::NavigationFailed(format!(
                "net::ERR_CONNECTION_REFUSED at {}",
                url
            )));
        }
        state.url = url.to_string();
        if let Some(view) = state.views_by_url.get(url).cloned() {
            state.view = view;
        }
        Ok(())
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()> {
        if self.lock().load_times_out {
            return Err(AutomationError::LoadTimeout {
                state: state.name().to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        Ok(self
            .lock()
            .view
            .selectors
            .get(selector)
            .map(|els| els.len())
            .unwrap_or(0))
    }

    async fn is_visible(&self, selector: &str, index: usize) -> Result<bool> {
        self.with_element(selector, index, |el| el.visible)
    }

    async fn click(&self, selector: &str, index: usize) -> Result<()> {
        self.with_element(selector, index, |_| ())?;
        let mut state = self.lock();
        state.clicks.push((selector.to_string(), index));
        if let Some(view) = state.click_effects.get(selector).cloned() {
            if let Some(url) = &view.url {
                state.url = url.clone();
            }
            state.view = view;
        }
        Ok(())
    }

    async fn clear(&self, selector: &str, index: usize) -> Result<()> {
        self.with_element(selector, index, |el| el.value.clear())
    }

    async fn fill(&self, selector: &str, index: usize, value: &str) -> Result<()> {
        if self
            .lock()
            .fill_failures
            .contains(&(selector.to_string(), index))
        {
            return Err(AutomationError::JavaScriptFailed(format!(
                "element {} [{}] is detached",
                selector, index
            )));
        }
        self.with_element(selector, index, |el| el.value = value.to_string())
    }

    async fn url(&self) -> Result<String> {
        self.check_readable()?;
        Ok(self.lock().url.clone())
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>> {
        self.check_readable()?;
        if selector == "body" {
            return Ok(Some(self.lock().view.body_text.clone()));
        }
        Ok(None)
    }

    async fn wait_for_dom_settled(&self, _quiet: Duration, _timeout: Duration) -> Result<bool> {
        let mut state = self.lock();
        state.settle_calls += 1;
        if state.settle_fails {
            return Err(AutomationError::JavaScriptFailed(
                "Timeout while waiting for Runtime.evaluate".to_string(),
            ));
        }
        Ok(!state.unsettled)
    }
}

/// Actor that records every instruction and fails the ones matching configured fragments.
#[derive(Default)]
pub struct ScriptedActor {
    instructions: Mutex<Vec<String>>,
    failing_fragments: Mutex<Vec<String>>,
    extract_response: Mutex<Option<Value>>,
    agent_message: Mutex<Option<String>>,
}

impl ScriptedActor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any instruction containing `fragment` raises
    pub fn fail_when(self, fragment: &str) -> Self {
        self.failing_fragments
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(fragment.to_string());
        self
    }

    pub fn fail_everything(self) -> Self {
        self.fail_when("")
    }

    pub fn with_extract_response(self, value: Value) -> Self {
        *self
            .extract_response
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(value);
        self
    }

    pub fn with_agent_message(self, message: &str) -> Self {
        *self.agent_message.lock().unwrap_or_else(|p| p.into_inner()) = Some(message.to_string());
        self
    }

    pub fn instructions(&self) -> Vec<String> {
        self.instructions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn record(&self, instruction: &str) -> Result<()> {
        self.instructions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(instruction.to_string());
        let failing = self
            .failing_fragments
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        if failing.iter().any(|f| instruction.contains(f.as_str())) {
            return Err(AutomationError::ActorFailed(format!(
                "could not perform: {}",
                instruction
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AiActor for ScriptedActor {
    async fn act(&self, instruction: &str) -> Result<()> {
        self.record(instruction)
    }

    async fn extract(&self, instruction: &str, _schema: &Value) -> Result<Value> {
        self.record(instruction)?;
        self.extract_response
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or_else(|| AutomationError::ActorFailed("nothing to extract".to_string()))
    }

    async fn agent_execute(
        &self,
        _config: &AgentConfig,
        options: &AgentExecuteOptions,
    ) -> Result<AgentResult> {
        self.record(&options.instruction)?;
        let message = self
            .agent_message
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .unwrap_or_else(|| "done".to_string());
        Ok(AgentResult {
            message,
            completed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn click_effects_swap_the_view() {
        let page = MockPage::with_view(
            "https://forms.example/viewform",
            MockView::new().with_elements("button", 1),
        );
        page.on_click(
            "button",
            MockView::new()
                .with_body_text("Thanks")
                .with_url("https://forms.example/formResponse"),
        );

        page.click("button", 0).await.unwrap();

        assert_eq!(page.url().await.unwrap(), "https://forms.example/formResponse");
        assert_eq!(page.count("button").await.unwrap(), 0);
        assert_eq!(page.clicks(), vec![("button".to_string(), 0)]);
    }

    #[tokio::test]
    async fn scripted_actor_fails_matching_instructions() {
        let actor = ScriptedActor::new().fail_when("Submit");
        assert!(actor.act("click the Next button").await.is_ok());
        assert!(actor.act("click the Submit button").await.is_err());
        assert_eq!(actor.instructions().len(), 2);
    }
}
