//! Core domain models for relaygate.

mod agent;
mod chat;
mod config;
mod session;
mod stream;

pub use agent::{AgentConfig, Capabilities, ModelLimits, ProviderKind};
pub use chat::{
    ChatMessage, ChatOptions, ChatRole, FileKind, FileRef, TokenUsage, UnifiedChatResponse,
    ANONYMOUS_CALLER,
};
pub use config::{
    BucketConfig, CacheConfig, CircuitBreakerConfig, GatewayConfig, RateLimitConfig,
    ReliabilityConfig, RetryConfig, StreamConfig,
};
pub use session::{
    AppInitInfo, ConversationDetail, ConversationMessage, ConversationPage, ConversationQuery,
    ConversationSummary, FeedbackRating, FeedbackSubmission,
};
pub use stream::StreamEvent;
