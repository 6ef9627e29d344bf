//! Normalized conversation-history models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::chat::ChatRole;

fn default_page_size() -> u32 {
    20
}

/// Filter and pagination for a conversation listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationQuery {
    #[serde(default = "default_page_size")]
    pub limit: u32,
    /// Opaque continuation token from a previous page
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

impl Default for ConversationQuery {
    fn default() -> Self {
        Self { limit: default_page_size(), cursor: None, since: None, until: None }
    }
}

impl ConversationQuery {
    /// Whether a conversation last touched at `at` falls inside the time filter.
    /// Conversations without a timestamp are kept.
    pub fn admits(&self, at: Option<DateTime<Utc>>) -> bool {
        let Some(at) = at else {
            return true;
        };
        self.since.map_or(true, |since| at >= since) && self.until.map_or(true, |until| at <= until)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Provider fields not modeled here
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub extra: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationPage {
    pub conversations: Vec<ConversationSummary>,
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Rating attached to one upstream message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackRating {
    Like,
    Dislike,
    /// Remove a previously submitted rating
    Clear,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackRating>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationDetail {
    pub id: String,
    pub messages: Vec<ConversationMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackSubmission {
    pub conversation_id: String,
    pub message_id: String,
    pub rating: FeedbackRating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Welcome configuration of a workflow app.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppInitInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome_text: Option<String>,
    /// Input-variable schema, passed through as the upstream describes it
    #[serde(default)]
    pub variables: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_filter() {
        let since = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single();
        let query = ConversationQuery { since, ..ConversationQuery::default() };

        assert!(query.admits(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).single()));
        assert!(!query.admits(Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).single()));
        assert!(query.admits(None));
    }
}
