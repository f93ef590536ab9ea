pub mod locator;
pub mod selectors;

pub use locator::{FieldLocator, SelectorHandle};
pub use selectors::{control_candidates, text_input_candidates};
