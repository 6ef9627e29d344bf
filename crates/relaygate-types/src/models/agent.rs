//! Upstream agent configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Upstream family an agent talks to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Workflow-style assistant platform (app id + caller-supplied chat id)
    #[serde(rename = "workflow-platform")]
    WorkflowPlatform,
    /// Conversational-agent platform (upstream-assigned conversation id)
    #[serde(rename = "agent-platform")]
    AgentPlatform,
    /// OpenAI-compatible chat completions
    #[serde(rename = "generic-chat-a", alias = "openai")]
    OpenAiChat,
    /// Anthropic-style messages API
    #[serde(rename = "generic-chat-b", alias = "anthropic")]
    AnthropicChat,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] =
        [Self::WorkflowPlatform, Self::AgentPlatform, Self::OpenAiChat, Self::AnthropicChat];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WorkflowPlatform => "workflow-platform",
            Self::AgentPlatform => "agent-platform",
            Self::OpenAiChat => "generic-chat-a",
            Self::AnthropicChat => "generic-chat-b",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared capability flags of an upstream agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "Capability flags map one-to-one onto upstream features"
)]
pub struct Capabilities {
    pub supports_stream: bool,
    pub supports_detail: bool,
    pub supports_files: bool,
    pub supports_images: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            supports_stream: true,
            supports_detail: false,
            supports_files: false,
            supports_images: false,
        }
    }
}

/// Generation limits forwarded to the upstream.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(default)]
pub struct ModelLimits {
    #[validate(range(min = 1_u32))]
    pub max_tokens: Option<u32>,
    #[validate(range(min = 0.0_f32, max = 2.0_f32))]
    pub temperature: Option<f32>,
}

/// One configured upstream. Supplied by the agent directory and treated as
/// immutable for the duration of a call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct AgentConfig {
    /// Gateway-side agent identifier (circuit and rate-limit key)
    #[validate(length(min = 1_u64))]
    pub id: String,
    pub provider: ProviderKind,
    /// Base URL of the upstream API
    #[validate(url)]
    pub endpoint: String,
    /// API key or token
    #[serde(default)]
    pub credential: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Upstream application identifier (required by the workflow platform)
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    #[validate(nested)]
    pub limits: ModelLimits,
}

impl AgentConfig {
    pub fn new(id: impl Into<String>, provider: ProviderKind, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider,
            endpoint: endpoint.into(),
            credential: String::new(),
            model: None,
            app_id: None,
            capabilities: Capabilities::default(),
            limits: ModelLimits::default(),
        }
    }

    #[must_use]
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = credential.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Endpoint without a trailing slash, ready for path joining.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}
