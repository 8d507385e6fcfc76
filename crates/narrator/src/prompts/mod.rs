//! Event-name keyed prompt templates.

pub mod resolver;

pub use resolver::{PromptError, PromptResolver};
