use crate::core::config::Credentials;
use crate::core::{ProvisionedSession, SessionProvider};
use crate::errors::{AutomationError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

const AUTH_CHECKLIST: &str = "Browserbase authentication failed (401). Please verify:\n\
    1. Your BROWSERBASE_API_KEY is correct and not expired\n\
    2. Your BROWSERBASE_PROJECT_ID matches the project in your Browserbase dashboard\n\
    3. The API key has permission to create sessions in this project\n\
    4. You haven't swapped the API key and project ID in your .env file";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSession {
    id: String,
    #[serde(default)]
    connect_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionDebugUrls {
    debugger_fullscreen_url: String,
    #[serde(default)]
    ws_url: Option<String>,
}

/// Creates remote browser sessions through the Browserbase REST API.
#[derive(Debug, Clone)]
pub struct BrowserbaseClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    project_id: String,
}

impl BrowserbaseClient {
    /// Fails before any network call when either credential is missing or blank.
    pub fn new(base_url: &str, credentials: &Credentials) -> Result<Self> {
        let api_key = credentials
            .browserbase_api_key
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        let project_id = credentials
            .browserbase_project_id
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();

        if api_key.is_empty() || project_id.is_empty() {
            return Err(AutomationError::MissingCredentials(
                "Set BROWSERBASE_API_KEY and BROWSERBASE_PROJECT_ID.".to_string(),
            ));
        }

        if looks_swapped(api_key, project_id) {
            warn!(
                "Project ID looks like an API key (starts with 'bb_'). You may have swapped \
                 BROWSERBASE_API_KEY and BROWSERBASE_PROJECT_ID."
            );
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            project_id: project_id.to_string(),
        })
    }

    fn key_prefix(&self) -> String {
        self.api_key.chars().take(8).collect()
    }

    async fn create_session(&self) -> Result<CreatedSession> {
        let url = format!("{}/v1/sessions", self.base_url);
        let payload = json!({
            "projectId": self.project_id,
            "browserSettings": {
                "enablePdfViewer": true
            }
        });

        debug!(
            project_id = %self.project_id,
            api_key_prefix = %self.key_prefix(),
            "Creating Browserbase session"
        );

        let response = self
            .http
            .post(&url)
            .header("X-BB-API-Key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            error!(
                project_id = %self.project_id,
                api_key_prefix = %self.key_prefix(),
                "Browserbase rejected the credentials"
            );
            return Err(AutomationError::AuthenticationFailed(AUTH_CHECKLIST.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AutomationError::SessionFailed(format!(
                "session create failed with status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    async fn debug_urls(&self, session_id: &str) -> Result<SessionDebugUrls> {
        let url = format!("{}/v1/sessions/{}/debug", self.base_url, session_id);
        let response = self
            .http
            .get(&url)
            .header("X-BB-API-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AutomationError::SessionFailed(format!(
                "debug url lookup for {} failed with status {}: {}",
                session_id, status, body
            )));
        }

        Ok(response.json().await?)
    }
}

fn looks_swapped(api_key: &str, project_id: &str) -> bool {
    project_id.starts_with("bb_") && !api_key.starts_with("bb_")
}

#[async_trait]
impl SessionProvider for BrowserbaseClient {
    async fn provision(&self) -> Result<ProvisionedSession> {
        let session = self.create_session().await?;
        let urls = self.debug_urls(&session.id).await?;

        let connect_url = session
            .connect_url
            .or(urls.ws_url)
            .ok_or_else(|| {
                AutomationError::SessionFailed(format!(
                    "session {} has no connect url",
                    session.id
                ))
            })?;

        info!("Browserbase session {} ready", session.id);
        Ok(ProvisionedSession {
            session_id: session.id,
            debug_url: urls.debugger_fullscreen_url,
            connect_url,
        })
    }
}
