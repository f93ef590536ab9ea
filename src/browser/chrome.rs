use crate::core::config::BrowserConfig;
use crate::core::{LoadState, PageCapability};
use crate::errors::{AutomationError, Result};
use crate::utils::javascript;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const NETWORK_QUIET_MS: u64 = 500;
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(20);
const SETTLE_CALL_MARGIN: Duration = Duration::from_secs(5);

/// Page backed by one Chrome tab, either launched locally or attached over CDP.
pub struct ChromePage {
    // Dropping the browser closes the connection, so it lives as long as the tab.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromePage {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );

        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];

        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }

        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(args)
            .build()
            .map_err(|e| AutomationError::LaunchFailed(e.to_string()))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| AutomationError::LaunchFailed(e.to_string()))?;

        let tab = browser
            .new_tab()
            .map_err(|e| AutomationError::LaunchFailed(e.to_string()))?;

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Attaches to a remote browser and reuses its first tab, so a remote actor
    /// driving the same session sees the same page.
    pub fn connect(ws_url: &str) -> Result<Self> {
        let browser = Browser::connect_with_timeout(ws_url.to_string(), IDLE_BROWSER_TIMEOUT)
            .map_err(|e| AutomationError::SessionFailed(e.to_string()))?;

        let existing = browser
            .get_tabs()
            .lock()
            .ok()
            .and_then(|tabs| tabs.first().cloned());

        let tab = match existing {
            Some(tab) => tab,
            None => browser
                .new_tab()
                .map_err(|e| AutomationError::SessionFailed(e.to_string()))?,
        };

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    async fn evaluate(&self, script: &str, await_promise: bool) -> Result<Value> {
        let result = self
            .tab
            .evaluate(script, await_promise)
            .map_err(|e| AutomationError::JavaScriptFailed(e.to_string()))?;

        Ok(result.value.unwrap_or(Value::Null))
    }

    /// Runs an element script and unwraps its `{ success, value, error }` envelope.
    async fn element_action(&self, script: &str, selector: &str, index: usize) -> Result<Value> {
        let result = self.evaluate(script, false).await?;

        if result
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            return Ok(result.get("value").cloned().unwrap_or(Value::Null));
        }

        let error_msg = result
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown error");

        if error_msg == "Element not found" {
            return Err(AutomationError::ElementNotFound(format!(
                "{} [{}]",
                selector, index
            )));
        }

        Err(AutomationError::JavaScriptFailed(format!(
            "{} [{}]: {}",
            selector, index, error_msg
        )))
    }

    async fn wait_for_condition(&self, condition: &str, timeout: Duration) -> Result<bool> {
        let start_time = Instant::now();

        while start_time.elapsed() < timeout {
            let result = self.evaluate(condition, false).await?;
            if result.as_bool().unwrap_or(false) {
                return Ok(true);
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }

        Ok(false)
    }
}

#[async_trait]
impl PageCapability for ChromePage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| AutomationError::NavigationFailed(e.to_string()))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| AutomationError::NavigationFailed(e.to_string()))?;

        Ok(())
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()> {
        let condition = match state {
            LoadState::DomContentLoaded => {
                format!("{} !== 'loading'", javascript::ready_state())
            }
            LoadState::Load => format!("{} === 'complete'", javascript::ready_state()),
            LoadState::NetworkIdle => javascript::network_quiet(NETWORK_QUIET_MS),
        };

        if self.wait_for_condition(&condition, timeout).await? {
            debug!("Reached load state {}", state.name());
            return Ok(());
        }

        Err(AutomationError::LoadTimeout {
            state: state.name().to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let result = self.evaluate(&javascript::count(selector), false).await?;
        Ok(result.as_u64().unwrap_or(0) as usize)
    }

    async fn is_visible(&self, selector: &str, index: usize) -> Result<bool> {
        let value = self
            .element_action(&javascript::is_visible(selector, index), selector, index)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &str, index: usize) -> Result<()> {
        self.element_action(&javascript::click(selector, index), selector, index)
            .await?;
        debug!("Clicked {} [{}]", selector, index);
        Ok(())
    }

    async fn clear(&self, selector: &str, index: usize) -> Result<()> {
        self.element_action(&javascript::clear(selector, index), selector, index)
            .await?;
        Ok(())
    }

    async fn fill(&self, selector: &str, index: usize, value: &str) -> Result<()> {
        self.element_action(&javascript::fill(selector, index, value), selector, index)
            .await?;
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>> {
        let result = self
            .evaluate(&javascript::text_content(selector), false)
            .await?;
        Ok(result.as_str().map(str::to_string))
    }

    async fn wait_for_dom_settled(&self, quiet: Duration, timeout: Duration) -> Result<bool> {
        let script = javascript::dom_settled(quiet.as_millis() as u64, timeout.as_millis() as u64);

        // The promise resolves `false` at its own deadline; the CDP call must outlive it.
        self.tab.set_default_timeout(timeout + SETTLE_CALL_MARGIN);
        let result = self.evaluate(&script, true).await;
        self.tab.set_default_timeout(DEFAULT_CALL_TIMEOUT);

        Ok(result?.as_bool().unwrap_or(false))
    }
}
