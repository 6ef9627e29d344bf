//! Application State
//!
//! Shared, cheaply clonable handles to the agent directory and the core
//! services built from the configuration file.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

use relaygate_core::{
    AgentConfigSource, ChatProxyCore, ProviderRegistry, ReliabilityLayer, SessionGateway,
    StaticAgentDirectory, UpstreamClient,
};
use relaygate_types::{AgentConfig, GatewayConfig, ProxyResult};

#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub agents: Arc<dyn AgentConfigSource>,
    pub registry: Arc<ProviderRegistry>,
    pub reliability: Arc<ReliabilityLayer>,
    pub chat: ChatProxyCore,
    pub sessions: SessionGateway,
    pub started_at: Instant,
}

impl AppState {
    /// Build every service from a loaded configuration file.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let directory = StaticAgentDirectory::new(config.agents.clone())?;
        Self::new_with_components(Arc::new(directory), config)
    }

    /// Build with an externally supplied agent source.
    pub fn new_with_components(agents: Arc<dyn AgentConfigSource>, config: &GatewayConfig) -> Result<Self> {
        let registry = Arc::new(ProviderRegistry::with_defaults());
        let reliability = Arc::new(ReliabilityLayer::from_config(&config.reliability));
        let upstream = Arc::new(UpstreamClient::from_timeout(config.request_timeout())?);

        let chat = ChatProxyCore::new(
            registry.clone(),
            reliability.clone(),
            upstream.clone(),
            config.stream.clone(),
        );
        let sessions =
            SessionGateway::new(registry.clone(), reliability.clone(), upstream, config.cache.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                agents,
                registry,
                reliability,
                chat,
                sessions,
                started_at: Instant::now(),
            }),
        })
    }

    pub async fn agent(&self, agent_id: &str) -> ProxyResult<AgentConfig> {
        self.inner.agents.get_agent_config(agent_id).await
    }

    pub async fn agent_ids(&self) -> Vec<String> {
        self.inner.agents.list_agent_ids().await
    }

    pub fn chat(&self) -> &ChatProxyCore {
        &self.inner.chat
    }

    pub fn sessions(&self) -> &SessionGateway {
        &self.inner.sessions
    }

    pub fn reliability(&self) -> &ReliabilityLayer {
        &self.inner.reliability
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.inner.registry
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Evict idle limiter buckets and expired cache entries.
    pub fn sweep(&self) -> (usize, usize) {
        (self.inner.reliability.sweep_idle(), self.inner.sessions.purge_expired())
    }
}
