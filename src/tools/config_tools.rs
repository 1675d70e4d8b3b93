//! Config and secret lookup tools

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ToolEnv, TypedTool};
use crate::domain::Observation;

pub struct GetConfigTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetConfigArgs {
    key: String,
}

#[async_trait]
impl TypedTool for GetConfigTool {
    type Args = GetConfigArgs;

    fn name(&self) -> &'static str {
        "get_config"
    }

    fn description(&self) -> &'static str {
        "Read a configuration value by dotted path, e.g. stores.coop_se.default_postcode."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": {"type": "string", "description": "Dotted config path"}
            },
            "required": ["key"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: GetConfigArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let value = env.config.lookup(&args.key).unwrap_or(Value::Null);
        Ok(Observation::ok().with("value", value))
    }
}

pub struct GetSecretTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetSecretArgs {
    name: String,
}

#[async_trait]
impl TypedTool for GetSecretTool {
    type Args = GetSecretArgs;

    fn name(&self) -> &'static str {
        "get_secret"
    }

    fn description(&self) -> &'static str {
        "Read a secret the store allows (e.g. COOP_USERNAME, COOP_PASSWORD)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Secret name"}
            },
            "required": ["name"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: GetSecretArgs, env: &ToolEnv) -> eyre::Result<Observation> {
        let allowed = env
            .store_config()
            .is_some_and(|store| store.secrets.iter().any(|s| s == &args.name));
        if !allowed {
            log::warn!("Run {} asked for disallowed secret {}", env.run_id, args.name);
            return Ok(Observation::failure("secret not allowed"));
        }
        match std::env::var(&args.name) {
            Ok(value) if !value.is_empty() => Ok(Observation::ok().with("value", value)),
            _ => Ok(Observation::failure(format!("secret {} is empty", args.name))),
        }
    }
}
