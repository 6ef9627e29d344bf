//! Conversation-history operations routed to the agent's provider.
//!
//! Reads go through per-resource caches so repeated or concurrent views of the
//! same listing hit the upstream once. Writes invalidate everything cached for
//! that agent.

use reqwest::header::HeaderMap;
use relaygate_types::{
    AgentConfig, AppInitInfo, CacheConfig, ConversationDetail, ConversationPage,
    ConversationQuery, FeedbackSubmission, ProviderKind, ProxyError, ProxyResult,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::proxy::cache::CacheLayer;
use crate::proxy::prometheus;
use crate::proxy::providers::{ProviderAdapter, ProviderRegistry, ProviderRequest};
use crate::proxy::reliability::ReliabilityLayer;
use crate::proxy::upstream::UpstreamClient;

fn new_trace_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn agent_prefix(kind: ProviderKind, agent_id: &str) -> String {
    format!("{}:{}:", kind.as_str(), agent_id)
}

/// One owned upstream call, movable into a cache loader.
struct UpstreamCall {
    upstream: Arc<UpstreamClient>,
    reliability: Arc<ReliabilityLayer>,
    kind: ProviderKind,
    agent_id: String,
    caller_id: String,
    operation: &'static str,
    resource: String,
    request: ProviderRequest,
    headers: HeaderMap,
}

impl UpstreamCall {
    async fn run(self) -> ProxyResult<Value> {
        let trace_id = new_trace_id();
        let started = Instant::now();
        debug!(
            "[{}] {} {} for {} -> {} {}",
            trace_id, self.operation, self.resource, self.agent_id, self.request.method, self.request.url
        );

        let (upstream, request, headers, kind) = (&self.upstream, &self.request, &self.headers, self.kind);
        let result = self
            .reliability
            .execute(&self.agent_id, &self.caller_id, &trace_id, move || upstream.send_json(kind, request, headers))
            .await
            .map_err(|err| match err {
                ProxyError::ProviderHttp { status: 404, .. } => {
                    ProxyError::SessionNotFound { resource: self.resource.clone() }
                },
                other => other,
            });

        prometheus::record_request(
            kind.as_str(),
            &self.agent_id,
            result.as_ref().map_or_else(ProxyError::kind, |_| "ok"),
            started.elapsed(),
        );
        result
    }
}

pub struct SessionGateway {
    registry: Arc<ProviderRegistry>,
    reliability: Arc<ReliabilityLayer>,
    upstream: Arc<UpstreamClient>,
    pages: CacheLayer<ConversationPage>,
    details: CacheLayer<ConversationDetail>,
    inits: CacheLayer<AppInitInfo>,
}

impl std::fmt::Debug for SessionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGateway")
            .field("pages", &self.pages)
            .field("details", &self.details)
            .field("inits", &self.inits)
            .finish_non_exhaustive()
    }
}

impl SessionGateway {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        reliability: Arc<ReliabilityLayer>,
        upstream: Arc<UpstreamClient>,
        cache: CacheConfig,
    ) -> Self {
        Self {
            registry,
            reliability,
            upstream,
            pages: CacheLayer::new("conversation_list", cache.clone()),
            details: CacheLayer::new("conversation_detail", cache.clone()),
            inits: CacheLayer::new("app_init", cache),
        }
    }

    fn adapter_for(&self, agent: &AgentConfig) -> ProxyResult<Arc<dyn ProviderAdapter>> {
        let adapter = self
            .registry
            .get(agent.provider)
            .ok_or_else(|| ProxyError::config(format!("no adapter registered for provider {}", agent.provider)))?;
        adapter.check_config(agent)?;
        Ok(adapter)
    }

    fn call(
        &self,
        adapter: &dyn ProviderAdapter,
        agent: &AgentConfig,
        caller_id: &str,
        operation: &'static str,
        resource: String,
        request: ProviderRequest,
    ) -> ProxyResult<UpstreamCall> {
        Ok(UpstreamCall {
            upstream: self.upstream.clone(),
            reliability: self.reliability.clone(),
            kind: adapter.kind(),
            agent_id: agent.id.clone(),
            caller_id: caller_id.to_string(),
            operation,
            resource,
            request,
            headers: adapter.build_headers(agent)?,
        })
    }

    fn invalidate_agent(&self, kind: ProviderKind, agent_id: &str) {
        let prefix = agent_prefix(kind, agent_id);
        let removed = self.pages.invalidate_prefix(&prefix) + self.details.invalidate_prefix(&prefix);
        debug!("Invalidated {} cached session entries for {}", removed, agent_id);
    }

    pub async fn list_conversations(
        &self,
        agent: &AgentConfig,
        caller_id: &str,
        query: &ConversationQuery,
    ) -> ProxyResult<ConversationPage> {
        let adapter = self.adapter_for(agent)?;
        let request = adapter.list_conversations_request(agent, caller_id, query)?;
        let call = self.call(adapter.as_ref(), agent, caller_id, "list", format!("conversations of {caller_id}"), request)?;

        let key = format!(
            "{}list:{}:{}:{}:{}:{}",
            agent_prefix(call.kind, &agent.id),
            caller_id,
            query.limit,
            query.cursor.as_deref().unwrap_or_default(),
            query.since.map(|t| t.timestamp_millis()).unwrap_or_default(),
            query.until.map(|t| t.timestamp_millis()).unwrap_or_default(),
        );
        let query = query.clone();
        self.pages
            .get_or_load(&key, move || async move {
                let body = call.run().await?;
                adapter.parse_conversation_list(body, &query)
            })
            .await
    }

    pub async fn get_conversation(
        &self,
        agent: &AgentConfig,
        caller_id: &str,
        conversation_id: &str,
    ) -> ProxyResult<ConversationDetail> {
        let adapter = self.adapter_for(agent)?;
        let request = adapter.get_conversation_request(agent, caller_id, conversation_id)?;
        let call = self.call(
            adapter.as_ref(),
            agent,
            caller_id,
            "get",
            format!("conversation {conversation_id}"),
            request,
        )?;

        let key = format!("{}conv:{}:{}", agent_prefix(call.kind, &agent.id), caller_id, conversation_id);
        let conversation_id = conversation_id.to_string();
        self.details
            .get_or_load(&key, move || async move {
                let body = call.run().await?;
                adapter.parse_conversation(&conversation_id, body)
            })
            .await
    }

    pub async fn delete_conversation(
        &self,
        agent: &AgentConfig,
        caller_id: &str,
        conversation_id: &str,
    ) -> ProxyResult<()> {
        let adapter = self.adapter_for(agent)?;
        let request = adapter.delete_conversation_request(agent, caller_id, conversation_id)?;
        let resource = format!("conversation {conversation_id}");
        let call = self.call(adapter.as_ref(), agent, caller_id, "delete", resource.clone(), request)?;
        let kind = call.kind;

        let body = call.run().await?;
        adapter.check_ack(&body, &resource)?;
        self.invalidate_agent(kind, &agent.id);
        info!("Deleted conversation {} of {} for {}", conversation_id, agent.id, caller_id);
        Ok(())
    }

    pub async fn submit_feedback(
        &self,
        agent: &AgentConfig,
        caller_id: &str,
        feedback: &FeedbackSubmission,
    ) -> ProxyResult<()> {
        let adapter = self.adapter_for(agent)?;
        let request = adapter.feedback_request(agent, caller_id, feedback)?;
        let resource = format!("message {} in conversation {}", feedback.message_id, feedback.conversation_id);
        let call = self.call(adapter.as_ref(), agent, caller_id, "feedback", resource.clone(), request)?;
        let kind = call.kind;

        let body = call.run().await?;
        adapter.check_ack(&body, &resource)?;
        self.invalidate_agent(kind, &agent.id);
        Ok(())
    }

    /// App welcome data. Shared by all callers of the agent.
    pub async fn initialize(&self, agent: &AgentConfig, caller_id: &str) -> ProxyResult<AppInitInfo> {
        let adapter = self.adapter_for(agent)?;
        let request = adapter.init_request(agent, caller_id)?;
        let call = self.call(adapter.as_ref(), agent, caller_id, "init", format!("app {}", agent.id), request)?;

        let key = format!("{}init", agent_prefix(call.kind, &agent.id));
        self.inits
            .get_or_load(&key, move || async move {
                let body = call.run().await?;
                adapter.parse_init(body)
            })
            .await
    }

    /// Drop expired entries from every cache.
    pub fn purge_expired(&self) -> usize {
        self.pages.purge_expired() + self.details.purge_expired() + self.inits.purge_expired()
    }

    pub fn cached_entries(&self) -> usize {
        self.pages.len() + self.details.len() + self.inits.len()
    }
}
