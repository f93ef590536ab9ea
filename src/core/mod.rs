pub mod actor;
pub mod config;
pub mod page;
pub mod session;
pub mod settle;

pub use actor::{AgentConfig, AgentExecuteOptions, AgentResult, AiActor, DisabledActor};
pub use config::{Config, Environment, RuntimeSummary, StrategyKind};
pub use page::{LoadState, PageCapability};
pub use session::{ProvisionedSession, SessionProvider};
pub use settle::{settle, SettlePolicy};
