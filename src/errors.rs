use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Load state '{state}' not reached within {timeout_ms}ms")]
    LoadTimeout { state: String, timeout_ms: u64 },

    #[error("No selector matched at least {min_count} visible element(s): {candidates:?}")]
    LocatorMiss {
        candidates: Vec<String>,
        min_count: usize,
    },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Strategy '{strategy}' failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },

    #[error("AI actor error: {0}")]
    ActorFailed(String),

    #[error("Submit control could not be activated: {0}")]
    SubmitFailed(String),

    #[error("Session error: {0}")]
    SessionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Anyhow error: {0}")]
    AnyhowError(String),
}

pub type Result<T> = std::result::Result<T, AutomationError>;

// Convert anyhow::Error to AutomationError
impl From<anyhow::Error> for AutomationError {
    fn from(err: anyhow::Error) -> Self {
        AutomationError::AnyhowError(err.to_string())
    }
}

impl AutomationError {
    pub fn strategy<S: Into<String>, R: std::fmt::Display>(strategy: S, reason: R) -> Self {
        AutomationError::StrategyFailed {
            strategy: strategy.into(),
            reason: reason.to_string(),
        }
    }

    /// Locator misses escalate to the next tier; everything else is a hard failure of the tier.
    pub fn is_locator_miss(&self) -> bool {
        matches!(self, AutomationError::LocatorMiss { .. })
    }

    /// Errors that end a run before any form is processed.
    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            AutomationError::SessionFailed(_)
                | AutomationError::AuthenticationFailed(_)
                | AutomationError::MissingCredentials(_)
        )
    }
}
