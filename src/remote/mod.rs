//! Clients for the hosted browser and the hosted AI actor.

pub mod browserbase;
pub mod stagehand;

pub use browserbase::BrowserbaseClient;
pub use stagehand::StagehandActor;
