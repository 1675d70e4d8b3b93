//! Per-run tool environment

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::browser::Page;
use crate::config::{GlobalConfig, StoreConfig};
use crate::domain::RunResult;
use crate::events::EventPublisher;
use crate::hitl::HumanIoBroker;

/// Runs a named sub-agent to completion on the same page
#[async_trait]
pub trait SubAgentInvoker: Send + Sync {
    async fn invoke(&self, name: &str, goal: &str) -> crate::Result<RunResult>;
}

/// Context handed to every tool call of one run.
#[derive(Clone)]
pub struct ToolEnv {
    pub page: Arc<dyn Page>,

    /// Store name, key into `GlobalConfig::stores`
    pub store: String,

    pub run_id: String,

    pub config: Arc<GlobalConfig>,

    pub broker: Arc<HumanIoBroker>,

    pub events: Arc<dyn EventPublisher>,

    pub subagents: Option<Arc<dyn SubAgentInvoker>>,

    /// Where screenshots are written
    pub artifacts_dir: PathBuf,
}

impl ToolEnv {
    pub fn new(
        page: Arc<dyn Page>,
        store: &str,
        run_id: &str,
        config: Arc<GlobalConfig>,
        broker: Arc<HumanIoBroker>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            page,
            store: store.to_string(),
            run_id: run_id.to_string(),
            config,
            broker,
            events,
            subagents: None,
            artifacts_dir: PathBuf::from("logs"),
        }
    }

    pub fn with_subagents(mut self, invoker: Arc<dyn SubAgentInvoker>) -> Self {
        self.subagents = Some(invoker);
        self
    }

    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    /// Same page and services, different run id (sub-agent runs)
    pub fn for_run(&self, run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            ..self.clone()
        }
    }

    pub fn store_config(&self) -> Option<&StoreConfig> {
        self.config.store(&self.store)
    }

    /// Capture `error_<tool>.png`, returning its path when the capture worked.
    pub async fn error_screenshot(&self, tool: &str) -> Option<String> {
        let path = self.artifacts_dir.join(format!("error_{}.png", tool));
        match self.page.screenshot(&path).await {
            Ok(()) => Some(path.display().to_string()),
            Err(e) => {
                log::debug!("Failed to capture error screenshot for {}: {}", tool, e);
                None
            }
        }
    }
}
