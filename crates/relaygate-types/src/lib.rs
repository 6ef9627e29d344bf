//! # Relaygate Types
//!
//! Core types, models, and error definitions for the relaygate gateway.
//!
//! - **`error`** - Typed error hierarchy for proxying and configuration
//! - **`models`** - Domain models (agent config, chat, stream events, sessions, tuning)
//! - **`protocol`** - Caller-facing wire contract (request/response bodies)
//!
//! ## Architecture Role
//!
//! `relaygate-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!        relaygate-types (this crate)
//!                │
//!                ▼
//!         relaygate-core
//!                │
//!                ▼
//!        relaygate-server
//! ```
//!
//! All types are serializable via serde and cheap to clone across async boundaries.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::{ConfigError, ProxyError, ProxyResult};

pub use models::{
    AgentConfig, AppInitInfo, CacheConfig, Capabilities, ChatMessage, ChatOptions, ChatRole,
    CircuitBreakerConfig, ConversationDetail, ConversationPage, ConversationQuery,
    FeedbackRating, FeedbackSubmission, FileKind, FileRef, GatewayConfig, ProviderKind,
    RateLimitConfig, ReliabilityConfig, RetryConfig, StreamConfig, StreamEvent, TokenUsage,
    UnifiedChatResponse,
};
