//! Global configuration.
//!
//! Loaded from .cartpilot.yml or ~/.config/cartpilot/cartpilot.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Global configuration for cartpilot.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Decision loop settings.
    pub agents: AgentsConfig,

    /// Model provider settings.
    pub llm: LlmConfig,

    /// Experience memory settings.
    pub memory: MemoryConfig,

    /// Workflow retry policy.
    pub workflow: WorkflowConfig,

    /// Event broadcast settings.
    pub events: EventsConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Per-store settings keyed by store name.
    pub stores: BTreeMap<String, StoreConfig>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        let mut stores = BTreeMap::new();
        stores.insert("coop_se".to_string(), StoreConfig::coop_se());
        Self {
            agents: AgentsConfig::default(),
            llm: LlmConfig::default(),
            memory: MemoryConfig::default(),
            workflow: WorkflowConfig::default(),
            events: EventsConfig::default(),
            logging: LoggingConfig::default(),
            stores,
        }
    }
}

impl GlobalConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .cartpilot.yml in current directory
    /// 3. ~/.config/cartpilot/cartpilot.yml
    /// 4. Defaults
    ///
    /// Environment overrides are applied on top of whichever source won.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from(".cartpilot.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from .cartpilot.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load .cartpilot.yml: {}", e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("cartpilot").join("cartpilot.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Parse a config file without applying environment overrides.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (tests pass a map here).
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("CARTPILOT_MODEL").filter(|m| !m.is_empty()) {
            self.agents.model = model;
        }
        if let Some(level) = lookup("LOG_LEVEL").filter(|l| !l.is_empty()) {
            self.logging.level = level;
        }
        if let Some(enabled) = lookup("AGENT_MEMORY_ENABLED") {
            self.memory.enabled = enabled.eq_ignore_ascii_case("true");
        }
        if let Some(postcode) = lookup("COOP_DEFAULT_POSTCODE").filter(|p| !p.is_empty()) {
            self.stores
                .entry("coop_se".to_string())
                .or_insert_with(StoreConfig::coop_se)
                .default_postcode = Some(postcode);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.agents.max_total_steps == 0 {
            eyre::bail!("agents.max_total_steps must be > 0");
        }
        if self.agents.per_step_seconds == 0 {
            eyre::bail!("agents.per_step_seconds must be > 0");
        }
        if self.agents.max_idle_steps == 0 {
            eyre::bail!("agents.max_idle_steps must be > 0");
        }
        if self.agents.max_human_input_timeout_seconds == 0 {
            eyre::bail!("agents.max_human_input_timeout_seconds must be > 0");
        }
        if self.agents.human_input_timeout_seconds > self.agents.max_human_input_timeout_seconds {
            eyre::bail!("agents.human_input_timeout_seconds must not exceed agents.max_human_input_timeout_seconds");
        }
        if self.workflow.maximum_attempts == 0 {
            eyre::bail!("workflow.maximum_attempts must be > 0");
        }
        if self.memory.max_keep == 0 {
            eyre::bail!("memory.max_keep must be > 0");
        }
        Ok(())
    }

    /// Settings for a store, if configured.
    pub fn store(&self, name: &str) -> Option<&StoreConfig> {
        self.stores.get(name)
    }

    /// Look up a dotted path (e.g. `stores.coop_se.default_postcode`).
    pub fn lookup(&self, key: &str) -> Option<Value> {
        let root = serde_json::to_value(self).ok()?;
        let mut current = &root;
        for part in key.split('.') {
            current = current.as_object()?.get(part)?;
        }
        Some(current.clone())
    }
}

/// Decision loop settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Model name sent to the completion endpoint.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Timeout for a single tool call.
    pub per_step_seconds: u64,

    /// Tool-call budget per run.
    pub max_total_steps: u32,

    /// Consecutive model turns without an executed tool before the run stalls.
    pub max_idle_steps: u32,

    /// Default wait for a human response.
    pub human_input_timeout_seconds: u64,

    /// Upper bound on a wait the model asks for.
    pub max_human_input_timeout_seconds: u64,

    /// Keep a full step trace in run results.
    pub debug: bool,

    /// Directory holding prompt overrides (`<name>.md`).
    pub prompts_dir: Option<PathBuf>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            per_step_seconds: 30,
            max_total_steps: 12,
            max_idle_steps: 3,
            human_input_timeout_seconds: 120,
            max_human_input_timeout_seconds: 3600,
            debug: false,
            prompts_dir: None,
        }
    }
}

impl AgentsConfig {
    pub fn per_step_timeout(&self) -> Duration {
        Duration::from_secs(self.per_step_seconds)
    }

    pub fn human_input_timeout(&self) -> Duration {
        Duration::from_secs(self.human_input_timeout_seconds)
    }

    /// Wait for a human, `requested` seconds if given, never above the configured maximum
    pub fn human_input_wait(&self, requested: Option<u64>) -> Duration {
        let seconds = requested.unwrap_or(self.human_input_timeout_seconds);
        Duration::from_secs(seconds.min(self.max_human_input_timeout_seconds))
    }
}

/// Model provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL.
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Timeout per completion call in milliseconds.
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_ms: 120_000,
        }
    }
}

/// Experience memory settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,

    /// Entries kept per (kind, site) bucket.
    pub max_keep: usize,

    /// Most recent entries scanned on retrieval.
    pub search_n: usize,

    /// JSONL directory; in-memory only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_keep: 100,
            search_n: 50,
            dir: None,
        }
    }
}

/// Retry policy for the run activity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub maximum_attempts: u32,
    pub initial_interval_ms: u64,
    pub maximum_interval_ms: u64,
    pub backoff_coefficient: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            maximum_attempts: 2,
            initial_interval_ms: 2_000,
            maximum_interval_ms: 10_000,
            backoff_coefficient: 2.0,
        }
    }
}

/// Event broadcast settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast channel capacity; slow subscribers lag beyond this.
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Per-store settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Landing page opened before a run starts.
    pub base_url: String,

    /// CSS selectors that indicate a logged-in session.
    pub login_signals: Vec<String>,

    /// Postcode used when a delivery dialog asks for one.
    pub default_postcode: Option<String>,

    /// Environment variable names the `get_secret` tool may read.
    pub secrets: Vec<String>,

    /// Environment variable holding the login id shown to the authentication agent.
    pub login_id_env: Option<String>,

    /// Secret name the authentication agent reads the password from.
    pub password_secret: Option<String>,
}

impl StoreConfig {
    fn coop_se() -> Self {
        Self {
            base_url: "https://www.coop.se/".to_string(),
            login_signals: vec![
                "[data-test='header-user-menu']".to_string(),
                "a[href*='logga-ut']".to_string(),
            ],
            default_postcode: None,
            secrets: vec!["COOP_USERNAME".to_string(), "COOP_PASSWORD".to_string()],
            login_id_env: Some("COOP_USERNAME".to_string()),
            password_secret: Some("COOP_PASSWORD".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = GlobalConfig::default();
        assert_eq!(config.agents.model, "gpt-4o-mini");
        assert_eq!(config.agents.per_step_seconds, 30);
        assert_eq!(config.agents.max_total_steps, 12);
        assert_eq!(config.memory.max_keep, 100);
        assert_eq!(config.workflow.maximum_attempts, 2);
        assert!(config.store("coop_se").is_some());
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cartpilot.yml");
        fs::write(
            &path,
            r#"
agents:
  model: gpt-4.1
  max_total_steps: 40
memory:
  enabled: false
"#,
        )
        .unwrap();

        let config = GlobalConfig::load_from_file(&path).unwrap();
        assert_eq!(config.agents.model, "gpt-4.1");
        assert_eq!(config.agents.max_total_steps, 40);
        // Unspecified fields keep defaults
        assert_eq!(config.agents.per_step_seconds, 30);
        assert!(!config.memory.enabled);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let missing = PathBuf::from("/nonexistent/cartpilot.yml");
        assert!(GlobalConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CARTPILOT_MODEL", "gpt-4o"),
            ("AGENT_MEMORY_ENABLED", "false"),
            ("COOP_DEFAULT_POSTCODE", "11122"),
        ]);
        let mut config = GlobalConfig::default();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.agents.model, "gpt-4o");
        assert!(!config.memory.enabled);
        assert_eq!(
            config.store("coop_se").unwrap().default_postcode.as_deref(),
            Some("11122")
        );
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let mut config = GlobalConfig::default();
        config.agents.max_total_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lookup_dotted_path() {
        let mut config = GlobalConfig::default();
        config.stores.get_mut("coop_se").unwrap().default_postcode = Some("41301".to_string());

        assert_eq!(
            config.lookup("stores.coop_se.default_postcode"),
            Some(Value::String("41301".to_string()))
        );
        assert_eq!(config.lookup("agents.max_total_steps"), Some(Value::from(12)));
        assert_eq!(config.lookup("stores.nope.base_url"), None);
    }

    #[test]
    fn test_durations() {
        let agents = AgentsConfig::default();
        assert_eq!(agents.per_step_timeout(), Duration::from_secs(30));
        assert_eq!(agents.human_input_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_human_input_wait_is_capped() {
        let agents = AgentsConfig::default();
        assert_eq!(agents.human_input_wait(None), Duration::from_secs(120));
        assert_eq!(agents.human_input_wait(Some(30)), Duration::from_secs(30));
        assert_eq!(agents.human_input_wait(Some(u64::MAX)), Duration::from_secs(3600));
    }

    #[test]
    fn test_validate_default_wait_above_cap() {
        let mut config = GlobalConfig::default();
        config.agents.max_human_input_timeout_seconds = 60;
        assert!(config.validate().is_err());
    }
}
