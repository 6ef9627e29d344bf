use relaygate_types::ProviderKind;
use std::collections::HashMap;
use std::sync::Arc;

use super::agent::AgentPlatformAdapter;
use super::anthropic::AnthropicAdapter;
use super::openai::OpenAiAdapter;
use super::workflow::WorkflowAdapter;
use super::ProviderAdapter;

/// Immutable provider-kind -> adapter map, built once at startup and shared
/// by `Arc`.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry").field("kinds", &self.kinds()).finish()
    }
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter.
    pub fn with_defaults() -> Self {
        Self::empty()
            .register(WorkflowAdapter)
            .register(AgentPlatformAdapter)
            .register(OpenAiAdapter)
            .register(AnthropicAdapter)
    }

    #[must_use]
    pub fn register(mut self, adapter: impl ProviderAdapter + 'static) -> Self {
        self.adapters.insert(adapter.kind(), Arc::new(adapter));
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL.into_iter().filter(|k| self.adapters.contains_key(k)).collect()
    }
}
