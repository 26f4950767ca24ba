//! Conversation storage traits and types.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::routing::{AgentId, RoutingResult, UserContext};

/// Profile data the caller knows about the user behind a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age_group: Option<String>,
}

/// A tracked conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub profile: UserProfile,
    pub last_agent: Option<AgentId>,
}

/// One routed exchange: the inbound message, the decision, and what came back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub routing: RoutingResult,
    pub reply: Option<String>,
    pub error: Option<String>,
}

impl Turn {
    pub fn new(message: impl Into<String>, routing: RoutingResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            message: message.into(),
            routing,
            reply: None,
            error: None,
        }
    }
}

/// Filter criteria for listing conversations.
#[derive(Debug, Clone, Default)]
pub struct ConversationFilter {
    pub last_agent: Option<AgentId>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Persistent storage for conversations and their routed turns.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Routing context derived from the stored profile and turns. Unknown
    /// conversations yield an empty context.
    async fn user_context(&self, conversation_id: &str) -> Result<UserContext>;

    /// Create or update the profile of a conversation.
    async fn set_profile(&self, conversation_id: &str, profile: UserProfile) -> Result<()>;

    /// Append a turn, creating the conversation on first use.
    async fn record_turn(&self, conversation_id: &str, turn: Turn) -> Result<()>;

    /// Turns for a conversation, oldest first; `limit` keeps the most recent.
    async fn transcript(&self, conversation_id: &str, limit: Option<usize>) -> Result<Vec<Turn>>;

    async fn get(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    async fn list(&self, filter: &ConversationFilter) -> Result<Vec<Conversation>>;

    /// Delete a conversation and its turns.
    async fn delete(&self, conversation_id: &str) -> Result<()>;

    /// The name of this store implementation.
    fn name(&self) -> &str;
}
