//! Prompt System - Template loading and rendering
//!
//! Agent system prompts are Handlebars templates. Built-in templates ship
//! with the crate; a configured directory can override any of them.

mod library;
mod loader;
mod render;

pub use library::{GLOBAL_PROMPT, PromptLibrary};
pub use loader::PromptLoader;
pub use render::PromptRenderer;
