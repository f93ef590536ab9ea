//! Dashboard HTTP surface.
//!
//! - GET  /api/config    - Runtime summary
//! - POST /api/run       - Provision a session and start the plan in the background
//! - GET  /api/runs/{id} - Run status and results

use crate::core::{Config, SessionProvider};
use crate::errors::AutomationError;
use crate::launcher::SessionRunner;
use crate::orchestrator::RunOutcome;
use crate::types::RunPlan;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub session_id: String,
    pub debug_url: String,
    pub status: RunStatus,
    pub outcome: Option<RunOutcome>,
    pub error: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Response for a started run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStarted {
    pub run_id: String,
    pub session_id: String,
    pub debug_url: String,
}

pub struct ServerState {
    pub config: Config,
    pub plan: RunPlan,
    /// `None` when the credentials needed to provision sessions are missing.
    pub provider: Option<Arc<dyn SessionProvider>>,
    pub runner: Arc<dyn SessionRunner>,
    pub runs: RwLock<HashMap<String, RunRecord>>,
    /// How long a finished run stays queryable.
    pub retention: chrono::Duration,
}

impl ServerState {
    pub fn new(
        config: Config,
        plan: RunPlan,
        provider: Option<Arc<dyn SessionProvider>>,
        runner: Arc<dyn SessionRunner>,
    ) -> Self {
        Self {
            config,
            plan,
            provider,
            runner,
            runs: RwLock::new(HashMap::new()),
            retention: chrono::Duration::hours(1),
        }
    }

    pub fn with_retention(mut self, retention: chrono::Duration) -> Self {
        self.retention = retention;
        self
    }
}

/// Drops finished runs older than `retention`. Running ones are always kept.
fn evict_finished(runs: &mut HashMap<String, RunRecord>, retention: chrono::Duration) {
    let cutoff = chrono::Utc::now() - retention;
    let before = runs.len();
    runs.retain(|_, record| record.finished_at.map_or(true, |at| at > cutoff));
    if runs.len() < before {
        debug!("Evicted {} finished run(s)", before - runs.len());
    }
}

pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/config", get(get_config))
        .route("/api/run", post(start_run))
        .route("/api/runs/{id}", get(get_run))
        .with_state(state)
}

/// GET /api/config
pub async fn get_config(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.config.runtime_summary())
}

/// POST /api/run
pub async fn start_run(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let Some(provider) = state.provider.clone() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Missing Browserbase credentials. Set BROWSERBASE_API_KEY and BROWSERBASE_PROJECT_ID."
            })),
        );
    };

    let session = match provider.provision().await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to start session: {}", e);
            let status = match e {
                AutomationError::MissingCredentials(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            };
            return (status, Json(serde_json::json!({ "error": e.to_string() })));
        }
    };

    let run_id = uuid::Uuid::new_v4().to_string();
    info!("Starting run {} on session {}", run_id, session.session_id);

    let mut runs = state.runs.write().await;
    evict_finished(&mut runs, state.retention);
    runs.insert(
        run_id.clone(),
        RunRecord {
            run_id: run_id.clone(),
            session_id: session.session_id.clone(),
            debug_url: session.debug_url.clone(),
            status: RunStatus::Running,
            outcome: None,
            error: None,
            started_at: chrono::Utc::now(),
            finished_at: None,
        },
    );
    drop(runs);

    let background = state.clone();
    let background_id = run_id.clone();
    let background_session = session.clone();
    tokio::spawn(async move {
        let result = background
            .runner
            .run(&background_session, &background.plan)
            .await;

        let mut runs = background.runs.write().await;
        if let Some(record) = runs.get_mut(&background_id) {
            record.finished_at = Some(chrono::Utc::now());
            match result {
                Ok(outcome) => {
                    record.status = RunStatus::Completed;
                    record.outcome = Some(outcome);
                }
                Err(e) => {
                    error!("Run {} failed: {}", background_id, e);
                    record.status = RunStatus::Failed;
                    record.error = Some(e.to_string());
                }
            }
        }
    });

    (
        StatusCode::OK,
        Json(serde_json::json!(RunStarted {
            run_id,
            session_id: session.session_id,
            debug_url: session.debug_url,
        })),
    )
}

/// GET /api/runs/{id}
pub async fn get_run(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.runs.read().await.get(&id) {
        Some(record) => (StatusCode::OK, Json(serde_json::json!(record))),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("Run '{}' not found", id) })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProvisionedSession;
    use crate::errors::Result;
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    struct FixedProvider(std::result::Result<ProvisionedSession, fn() -> AutomationError>);

    #[async_trait]
    impl SessionProvider for FixedProvider {
        async fn provision(&self) -> Result<ProvisionedSession> {
            match &self.0 {
                Ok(session) => Ok(session.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    struct EmptyRunner;

    #[async_trait]
    impl SessionRunner for EmptyRunner {
        async fn run(&self, _session: &ProvisionedSession, _plan: &RunPlan) -> Result<RunOutcome> {
            Ok(RunOutcome {
                entity: None,
                forms: vec![],
            })
        }
    }

    fn session() -> ProvisionedSession {
        ProvisionedSession {
            session_id: "sess-1".into(),
            debug_url: "https://www.browserbase.com/devtools-fullscreen/sess-1".into(),
            connect_url: "wss://connect.browserbase.com/?sessionId=sess-1".into(),
        }
    }

    fn state_with(provider: Option<Arc<dyn SessionProvider>>) -> Arc<ServerState> {
        Arc::new(ServerState::new(
            Config::default(),
            RunPlan::default(),
            provider,
            Arc::new(EmptyRunner),
        ))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_run() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/run")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn config_endpoint_reports_summary() {
        let app = create_router(state_with(None));
        let response = app
            .oneshot(Request::builder().uri("/api/config").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["env"], "LOCAL");
        assert_eq!(json["domSettleTimeout"], 30000);
        assert_eq!(json["hasBrowserbaseCredentials"], false);
    }

    #[tokio::test]
    async fn unknown_run_is_not_found() {
        let app = create_router(state_with(None));
        let response = app
            .oneshot(Request::builder().uri("/api/runs/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_credentials_is_bad_request() {
        let app = create_router(state_with(None));
        let response = app.oneshot(post_run()).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("BROWSERBASE_API_KEY"));
    }

    #[tokio::test]
    async fn provisioning_failure_is_bad_gateway() {
        let provider = FixedProvider(Err(|| {
            AutomationError::AuthenticationFailed("Browserbase authentication failed (401)".into())
        }));
        let app = create_router(state_with(Some(Arc::new(provider))));
        let response = app.oneshot(post_run()).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("401"));
    }

    #[tokio::test]
    async fn started_run_is_tracked_until_completion() {
        let state = state_with(Some(Arc::new(FixedProvider(Ok(session())))));
        let app = create_router(state.clone());

        let response = app.clone().oneshot(post_run()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let started = body_json(response).await;
        assert_eq!(started["sessionId"], "sess-1");
        let run_id = started["runId"].as_str().unwrap().to_string();

        let mut status = String::new();
        for _ in 0..50 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("/api/runs/{}", run_id))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            let record = body_json(response).await;
            status = record["status"].as_str().unwrap().to_string();
            if status != "running" {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert_eq!(status, "completed");
    }

    #[tokio::test]
    async fn finished_runs_past_retention_are_evicted() {
        let state = Arc::new(
            ServerState::new(
                Config::default(),
                RunPlan::default(),
                Some(Arc::new(FixedProvider(Ok(session())))),
                Arc::new(EmptyRunner),
            )
            .with_retention(chrono::Duration::minutes(5)),
        );
        let now = chrono::Utc::now();
        let record = |id: &str, finished_at| RunRecord {
            run_id: id.to_string(),
            session_id: "old".into(),
            debug_url: String::new(),
            status: RunStatus::Completed,
            outcome: None,
            error: None,
            started_at: now - chrono::Duration::hours(2),
            finished_at,
        };
        {
            let mut runs = state.runs.write().await;
            runs.insert("stale".into(), record("stale", Some(now - chrono::Duration::hours(1))));
            runs.insert("recent".into(), record("recent", Some(now)));
            runs.insert("running".into(), record("running", None));
        }

        let response = create_router(state.clone()).oneshot(post_run()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let started = body_json(response).await;

        let runs = state.runs.read().await;
        assert!(!runs.contains_key("stale"));
        assert!(runs.contains_key("recent"));
        assert!(runs.contains_key("running"));
        assert!(runs.contains_key(started["runId"].as_str().unwrap()));
    }
}
