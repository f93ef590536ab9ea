pub mod chrome;
pub mod navigation;

pub use chrome::ChromePage;
pub use navigation::{NavigationController, NavigationReport};
