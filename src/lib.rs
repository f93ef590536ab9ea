pub mod actions;
pub mod browser;
pub mod core;
pub mod dom;
pub mod errors;
pub mod extract;
pub mod launcher;
pub mod orchestrator;
pub mod remote;
pub mod server;
pub mod testing;
pub mod types;
pub mod utils;
pub mod verifier;

pub use crate::browser::ChromePage;
pub use crate::core::{AiActor, Config, PageCapability, SessionProvider, SettlePolicy};
pub use crate::errors::{AutomationError, Result};
pub use crate::orchestrator::{RunOrchestrator, RunOutcome};
pub use crate::types::*;
pub use crate::verifier::{SubmissionVerifier, Verification};
