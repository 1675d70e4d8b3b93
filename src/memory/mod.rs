//! Experience memory.
//!
//! Remembers which tool calls got the agent past an obstacle on a site, so
//! that the next run meeting a similar obstacle can be nudged toward the same
//! resolution.

mod signature;
mod store;

pub use signature::{MAX_TEXT_KEYWORDS, MAX_TITLE_KEYWORDS, ObstacleSignature, RecipeStep};
pub use store::{BucketInfo, ExperienceEntry, ExperienceStore};

/// Experience kind for blocking dialogs
pub const MODAL_KIND: &str = "modal";
