//! Gateway configuration file loading.

use relaygate_types::{ConfigError, GatewayConfig};
use std::collections::HashSet;
use std::path::Path;
use validator::Validate;

/// Read, parse and validate the JSON configuration at `path`.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::NotFound { path: path.display().to_string() })?;
    let config: GatewayConfig = serde_json::from_str(&raw).map_err(|e| ConfigError::from_json_error(&e))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &GatewayConfig) -> Result<(), ConfigError> {
    if let Err(errors) = config.validate() {
        let mut fields: Vec<String> = errors.errors().keys().map(ToString::to_string).collect();
        fields.sort();
        return Err(ConfigError::invalid(fields.join(","), errors.to_string()));
    }

    let mut seen = HashSet::new();
    for agent in &config.agents {
        if !seen.insert(agent.id.as_str()) {
            return Err(ConfigError::DuplicateAgent { id: agent.id.clone() });
        }
    }
    Ok(())
}
