//! Configuration system for cartpilot.
//!
//! A single YAML document (`.cartpilot.yml` or ~/.config/cartpilot/cartpilot.yml)
//! with environment overrides layered on top.

use eyre::Result;
use std::path::PathBuf;

pub use self::global::{
    AgentsConfig, EventsConfig, GlobalConfig, LlmConfig, LoggingConfig, MemoryConfig, StoreConfig, WorkflowConfig,
};

mod global;

/// Default store when a payload names none.
pub const DEFAULT_STORE: &str = "coop_se";

/// Load configuration from the standard search paths.
///
/// Search order:
/// 1. Explicit path if provided
/// 2. .cartpilot.yml in current directory (project config)
/// 3. ~/.config/cartpilot/cartpilot.yml (user config)
/// 4. Default values
pub fn load_config(explicit_path: Option<&PathBuf>) -> Result<GlobalConfig> {
    let config = GlobalConfig::load(explicit_path)?;
    config.validate()?;
    Ok(config)
}
