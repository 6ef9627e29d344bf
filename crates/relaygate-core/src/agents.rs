//! Agent directory: resolves an agent id to its upstream configuration.

use async_trait::async_trait;
use relaygate_types::{AgentConfig, ConfigError, ProxyError, ProxyResult};
use std::collections::HashMap;

/// Source of agent configurations.
///
/// Implementations may hit a database or a remote registry; the gateway only
/// needs a lookup by id.
#[async_trait]
pub trait AgentConfigSource: Send + Sync {
    async fn get_agent_config(&self, agent_id: &str) -> ProxyResult<AgentConfig>;

    /// Known agent ids, for listings. Sources that cannot enumerate return
    /// an empty list.
    async fn list_agent_ids(&self) -> Vec<String> {
        Vec::new()
    }
}

/// In-memory directory built from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticAgentDirectory {
    agents: HashMap<String, AgentConfig>,
}

impl StaticAgentDirectory {
    pub fn new(agents: Vec<AgentConfig>) -> Result<Self, ConfigError> {
        let mut map = HashMap::with_capacity(agents.len());
        for agent in agents {
            if map.contains_key(&agent.id) {
                return Err(ConfigError::DuplicateAgent { id: agent.id });
            }
            map.insert(agent.id.clone(), agent);
        }
        Ok(Self { agents: map })
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentConfig> {
        self.agents.get(agent_id)
    }

    /// Sorted agent ids.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[async_trait]
impl AgentConfigSource for StaticAgentDirectory {
    async fn get_agent_config(&self, agent_id: &str) -> ProxyResult<AgentConfig> {
        self.agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| ProxyError::config(format!("unknown agent: {agent_id}")))
    }

    async fn list_agent_ids(&self) -> Vec<String> {
        self.ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygate_types::ProviderKind;

    fn agent(id: &str) -> AgentConfig {
        AgentConfig::new(id, ProviderKind::OpenAiChat, "https://llm.example/v1")
    }

    #[tokio::test]
    async fn test_lookup() {
        let directory = StaticAgentDirectory::new(vec![agent("b"), agent("a")]).unwrap();
        assert_eq!(directory.ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(directory.get_agent_config("a").await.unwrap().id, "a");
        assert_eq!(directory.list_agent_ids().await.len(), 2);

        let err = directory.get_agent_config("missing").await.unwrap_err();
        assert_eq!(err.kind(), "config_error");
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let err = StaticAgentDirectory::new(vec![agent("a"), agent("a")]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAgent { id } if id == "a"));
    }
}
