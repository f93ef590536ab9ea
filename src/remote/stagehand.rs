use crate::core::config::{Credentials, StagehandConfig};
use crate::core::{AgentConfig, AgentExecuteOptions, AgentResult, AiActor};
use crate::errors::{AutomationError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Actor backed by the Stagehand REST API, attached to an existing Browserbase session.
///
/// The Stagehand session is started lazily on the first call and reused after that.
pub struct StagehandActor {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    project_id: String,
    model_api_key: String,
    model_name: String,
    dom_settle_timeout_ms: u64,
    browserbase_session_id: String,
    session_id: Mutex<Option<String>>,
    // One page state is shared by every call, so calls never overlap.
    call_lock: Mutex<()>,
}

impl StagehandActor {
    pub fn new(
        config: &StagehandConfig,
        credentials: &Credentials,
        browserbase_session_id: impl Into<String>,
    ) -> Result<Self> {
        let required = |value: &Option<String>, name: &str| -> Result<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| AutomationError::MissingCredentials(format!("{} is required", name)))
        };

        Ok(Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: required(&credentials.browserbase_api_key, "BROWSERBASE_API_KEY")?,
            project_id: required(&credentials.browserbase_project_id, "BROWSERBASE_PROJECT_ID")?,
            model_api_key: required(&credentials.model_api_key, "GEMINI_API_KEY")?,
            model_name: config.model_name.clone(),
            dom_settle_timeout_ms: config.dom_settle_timeout_ms,
            browserbase_session_id: browserbase_session_id.into(),
            session_id: Mutex::new(None),
            call_lock: Mutex::new(()),
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-bb-api-key", header_value(&self.api_key)?);
        headers.insert("x-bb-project-id", header_value(&self.project_id)?);
        headers.insert("x-model-api-key", header_value(&self.model_api_key)?);
        headers.insert(
            "x-sent-at",
            header_value(&chrono::Utc::now().to_rfc3339())?,
        );
        headers.insert("x-stream-response", HeaderValue::from_static("false"));
        Ok(headers)
    }

    async fn post(&self, url: &str, payload: &Value) -> Result<Value> {
        let response = self
            .http
            .post(url)
            .headers(self.headers()?)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AutomationError::ActorFailed(format!(
                "request to {} failed with status {}: {}",
                url, status, body
            )));
        }

        let body: Value = serde_json::from_str(&body)?;
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request reported failure");
            return Err(AutomationError::ActorFailed(message.to_string()));
        }

        Ok(body.get("data").cloned().unwrap_or(body))
    }

    async fn ensure_session(&self) -> Result<String> {
        let mut guard = self.session_id.lock().await;
        if let Some(existing) = guard.as_ref() {
            return Ok(existing.clone());
        }

        let url = format!("{}/sessions/start", self.api_url);
        let payload = json!({
            "modelName": self.model_name,
            "domSettleTimeoutMs": self.dom_settle_timeout_ms,
            "browserbaseSessionId": self.browserbase_session_id,
            "verbose": 1,
        });

        let data = self.post(&url, &payload).await?;
        let session_id = data
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AutomationError::ActorFailed("session response missing sessionId".to_string())
            })?
            .to_string();

        info!("Stagehand session {} started", session_id);
        *guard = Some(session_id.clone());
        Ok(session_id)
    }

    async fn execute(&self, method: &str, payload: Value) -> Result<Value> {
        let session_id = self.ensure_session().await?;
        let url = format!("{}/sessions/{}/{}", self.api_url, session_id, method);

        let _lock = self.call_lock.lock().await;
        debug!("Stagehand {} on session {}", method, session_id);
        self.post(&url, &payload).await
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AutomationError::ConfigurationError(format!("invalid header value: {}", e)))
}

#[async_trait]
impl AiActor for StagehandActor {
    async fn act(&self, instruction: &str) -> Result<()> {
        let data = self.execute("act", json!({ "action": instruction })).await?;

        // Some deployments nest the act outcome under `result`.
        let outcome = data.get("result").unwrap_or(&data);
        if outcome.get("success").and_then(Value::as_bool) == Some(false) {
            let message = outcome
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("action not performed");
            return Err(AutomationError::ActorFailed(format!(
                "{}: {}",
                instruction, message
            )));
        }
        Ok(())
    }

    async fn extract(&self, instruction: &str, schema: &Value) -> Result<Value> {
        let data = self
            .execute(
                "extract",
                json!({
                    "instruction": instruction,
                    "schemaDefinition": schema,
                }),
            )
            .await?;
        Ok(data.get("result").cloned().unwrap_or(data))
    }

    async fn agent_execute(
        &self,
        config: &AgentConfig,
        options: &AgentExecuteOptions,
    ) -> Result<AgentResult> {
        let data = self
            .execute(
                "agentExecute",
                json!({
                    "agentConfig": config,
                    "executeOptions": options,
                }),
            )
            .await?;

        let result: AgentResult = serde_json::from_value(data.get("result").cloned().unwrap_or(data))?;
        if !result.completed {
            return Err(AutomationError::ActorFailed(format!(
                "agent did not complete: {}",
                result.message
            )));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials {
            browserbase_api_key: Some("bb_key".into()),
            browserbase_project_id: Some("proj-1".into()),
            model_api_key: Some("gemini-key".into()),
        }
    }

    async fn actor_for(server: &MockServer) -> StagehandActor {
        let config = StagehandConfig {
            api_url: format!("{}/v1", server.uri()),
            ..StagehandConfig::default()
        };

        Mock::given(method("POST"))
            .and(path("/v1/sessions/start"))
            .and(header("x-bb-api-key", "bb_key"))
            .and(header("x-model-api-key", "gemini-key"))
            .and(body_partial_json(json!({
                "browserbaseSessionId": "bb-sess",
                "domSettleTimeoutMs": 30000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "sessionId": "sh-1" }
            })))
            .expect(1)
            .mount(server)
            .await;

        StagehandActor::new(&config, &credentials(), "bb-sess").unwrap()
    }

    #[test]
    fn requires_model_key() {
        let mut creds = credentials();
        creds.model_api_key = Some("   ".into());
        let err = StagehandActor::new(&StagehandConfig::default(), &creds, "bb").err();
        assert!(matches!(err, Some(AutomationError::MissingCredentials(_))));
    }

    #[tokio::test]
    async fn act_starts_session_once_and_posts_action() {
        let server = MockServer::start().await;
        let actor = actor_for(&server).await;

        Mock::given(method("POST"))
            .and(path("/v1/sessions/sh-1/act"))
            .and(header("x-stream-response", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "ok",
                "action": "click"
            })))
            .expect(2)
            .mount(&server)
            .await;

        actor.act("Click the Next button").await.unwrap();
        actor.act("Click the Submit button").await.unwrap();
    }

    #[tokio::test]
    async fn unsuccessful_act_raises() {
        let server = MockServer::start().await;
        let actor = actor_for(&server).await;

        Mock::given(method("POST"))
            .and(path("/v1/sessions/sh-1/act"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "result": { "success": false, "message": "no such element" } }
            })))
            .mount(&server)
            .await;

        let err = actor.act("Click the Next button").await.unwrap_err();
        assert!(err.to_string().contains("no such element"));
    }

    #[tokio::test]
    async fn extract_returns_result_payload() {
        let server = MockServer::start().await;
        let actor = actor_for(&server).await;

        Mock::given(method("POST"))
            .and(path("/v1/sessions/sh-1/extract"))
            .and(body_partial_json(json!({ "instruction": "Extract the corporation" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "result": { "legalName": "MaplePay Technologies Inc." } }
            })))
            .mount(&server)
            .await;

        let value = actor
            .extract("Extract the corporation", &json!({ "type": "object" }))
            .await
            .unwrap();
        assert_eq!(value["legalName"], "MaplePay Technologies Inc.");
    }

    #[tokio::test]
    async fn server_errors_surface_as_actor_failures() {
        let server = MockServer::start().await;
        let actor = actor_for(&server).await;

        Mock::given(method("POST"))
            .and(path("/v1/sessions/sh-1/agentExecute"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
            .mount(&server)
            .await;

        let options = AgentExecuteOptions {
            instruction: "Fill the form".into(),
            max_steps: 5,
        };
        let err = actor
            .agent_execute(&AgentConfig::default(), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, AutomationError::ActorFailed(ref m) if m.contains("model overloaded")));
    }
}
