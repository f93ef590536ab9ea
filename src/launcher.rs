use crate::browser::ChromePage;
use crate::core::{AiActor, Config, DisabledActor, Environment, ProvisionedSession, SessionProvider};
use crate::errors::Result;
use crate::orchestrator::{RunOrchestrator, RunOutcome};
use crate::remote::{BrowserbaseClient, StagehandActor};
use crate::types::RunPlan;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Runs a plan against an already provisioned remote session.
#[async_trait]
pub trait SessionRunner: Send + Sync {
    async fn run(&self, session: &ProvisionedSession, plan: &RunPlan) -> Result<RunOutcome>;
}

/// Attaches Chrome and the Stagehand actor to a Browserbase session.
pub struct RemoteRunner {
    config: Config,
}

impl RemoteRunner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionRunner for RemoteRunner {
    async fn run(&self, session: &ProvisionedSession, plan: &RunPlan) -> Result<RunOutcome> {
        let orchestrator = attach(&self.config, session)?;
        Ok(orchestrator.run_plan(plan).await)
    }
}

pub fn session_provider(config: &Config) -> Result<BrowserbaseClient> {
    BrowserbaseClient::new(&config.stagehand.browserbase_api_url, &config.credentials)
}

/// Builds an orchestrator over a remote session's page.
pub fn attach(config: &Config, session: &ProvisionedSession) -> Result<RunOrchestrator> {
    let page = ChromePage::connect(&session.connect_url)?;
    let actor: Arc<dyn AiActor> =
        match StagehandActor::new(&config.stagehand, &config.credentials, &session.session_id) {
            Ok(actor) => Arc::new(actor),
            Err(e) => {
                warn!("AI tiers disabled: {}", e);
                Arc::new(DisabledActor::new(e.to_string()))
            }
        };
    Ok(RunOrchestrator::new(Arc::new(page), actor, config))
}

/// Provisions whatever the configuration calls for and runs the plan to completion.
pub async fn run_plan(config: &Config, plan: &RunPlan) -> Result<RunOutcome> {
    match config.environment() {
        Environment::Browserbase => {
            let provider = session_provider(config)?;
            let session = provider.provision().await?;
            info!("Watch the run live at {}", session.debug_url);
            RemoteRunner::new(config.clone()).run(&session, plan).await
        }
        Environment::Local => {
            info!("Launching local Chrome (headless: {})", config.browser.headless);
            let page = ChromePage::launch(&config.browser)?;
            let actor = DisabledActor::new(
                "local runs have no hosted actor; set BROWSERBASE_API_KEY and BROWSERBASE_PROJECT_ID",
            );
            let orchestrator = RunOrchestrator::new(Arc::new(page), Arc::new(actor), config);
            Ok(orchestrator.run_plan(plan).await)
        }
    }
}
