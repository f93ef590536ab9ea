use crate::core::SettlePolicy;
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub session: SessionConfig,
    pub credentials: Credentials,
    pub stagehand: StagehandConfig,
    pub strategies: StrategyConfig,
    pub verifier: VerifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub load_timeout_ms: u64,
    /// Applied after navigation and after every control activation
    pub settle: SettlePolicy,
    /// Applied before reading the page for submission signals
    pub verification_settle: SettlePolicy,
    /// Extra locator attempts, each preceded by a settle
    pub locator_retries: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub browserbase_api_key: Option<String>,
    pub browserbase_project_id: Option<String>,
    pub model_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagehandConfig {
    pub api_url: String,
    pub browserbase_api_url: String,
    pub model_name: String,
    pub dom_settle_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Direct,
    Act,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Fill tiers in the order they are tried
    pub fill: Vec<StrategyKind>,
    pub agent_max_steps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub success_phrases: Vec<String>,
    pub url_markers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    Local,
    Browserbase,
}

/// What the dashboard shows about the server's configuration. Never carries secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSummary {
    pub env: Environment,
    pub headless: bool,
    pub dom_settle_timeout: u64,
    pub has_browserbase_credentials: bool,
    pub has_llm_credentials: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            viewport: Viewport::default(),
            user_agent: None,
            args: vec![],
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: 30_000,
            settle: SettlePolicy::default(),
            verification_settle: SettlePolicy::default(),
            locator_retries: 1,
        }
    }
}

impl Default for StagehandConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.stagehand.browserbase.com/v1".to_string(),
            browserbase_api_url: "https://api.browserbase.com".to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            dom_settle_timeout_ms: 30_000,
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            fill: vec![StrategyKind::Direct, StrategyKind::Act],
            agent_max_steps: 20,
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            success_phrases: vec![
                "Your response has been recorded".to_string(),
                "Thank you".to_string(),
                "Response recorded".to_string(),
                "Submitted".to_string(),
                "form has been submitted".to_string(),
            ],
            url_markers: vec!["formResponse".to_string(), "response".to_string()],
        }
    }
}

impl Config {
    /// Reads an optional JSON config file, then overlays the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str::<Config>(&raw)?
            }
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        debug!(
            has_browserbase_api_key = config.credentials.browserbase_api_key.is_some(),
            has_browserbase_project_id = config.credentials.browserbase_project_id.is_some(),
            has_model_api_key = config.credentials.model_api_key.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Overlays values from `lookup`. Values are trimmed and empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = get("BROWSERBASE_API_KEY") {
            self.credentials.browserbase_api_key = Some(key);
        }
        if let Some(project) = get("BROWSERBASE_PROJECT_ID") {
            self.credentials.browserbase_project_id = Some(project);
        }
        if let Some(key) = get("GEMINI_API_KEY") {
            self.credentials.model_api_key = Some(key);
        }
        if let Some(headless) = get("FORMPILOT_HEADLESS") {
            self.browser.headless = matches!(headless.as_str(), "1" | "true" | "yes");
        }
    }

    pub fn environment(&self) -> Environment {
        if self.credentials.browserbase_api_key.is_some()
            && self.credentials.browserbase_project_id.is_some()
        {
            Environment::Browserbase
        } else {
            Environment::Local
        }
    }

    pub fn runtime_summary(&self) -> RuntimeSummary {
        RuntimeSummary {
            env: self.environment(),
            headless: self.browser.headless,
            dom_settle_timeout: self.stagehand.dom_settle_timeout_ms,
            has_browserbase_credentials: self.environment() == Environment::Browserbase,
            has_llm_credentials: self.credentials.model_api_key.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn environment_needs_both_browserbase_credentials() {
        let mut config = Config::default();
        config.apply_env(env(&[("BROWSERBASE_API_KEY", "bb_live_123")]));
        assert_eq!(config.environment(), Environment::Local);

        config.apply_env(env(&[("BROWSERBASE_PROJECT_ID", " proj-1 ")]));
        assert_eq!(config.environment(), Environment::Browserbase);
        assert_eq!(
            config.credentials.browserbase_project_id.as_deref(),
            Some("proj-1")
        );
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("GEMINI_API_KEY", "   ")]));
        assert!(config.credentials.model_api_key.is_none());
        assert!(!config.runtime_summary().has_llm_credentials);
    }

    #[test]
    fn loads_partial_json_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "browser": {{ "headless": true }}, "session": {{ "locator_retries": 3 }} }}"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.browser.viewport.width, 1280);
        assert_eq!(config.session.locator_retries, 3);
        assert_eq!(config.session.load_timeout_ms, 30_000);
        assert_eq!(config.stagehand.model_name, DEFAULT_MODEL);
        assert_eq!(
            config.strategies.fill,
            vec![StrategyKind::Direct, StrategyKind::Act]
        );
    }

    #[test]
    fn summary_serializes_like_the_dashboard_expects() {
        let value = serde_json::to_value(Config::default().runtime_summary()).unwrap();
        assert_eq!(value["env"], "LOCAL");
        assert_eq!(value["domSettleTimeout"], 30_000);
        assert_eq!(value["hasBrowserbaseCredentials"], false);
    }
}
