//! In-memory conversation store implementation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::traits::{Conversation, ConversationFilter, ConversationStore, Turn, UserProfile};
use crate::routing::UserContext;

/// An in-memory conversation store backed by mutex-protected hash maps.
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<String, Conversation>>,
    turns: Mutex<HashMap<String, Vec<Turn>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            turns: Mutex::new(HashMap::new()),
        }
    }

    fn new_conversation(id: &str) -> Conversation {
        let now = Utc::now();
        Conversation {
            id: id.to_string(),
            created_at: now,
            last_activity: now,
            profile: UserProfile::default(),
            last_agent: None,
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn user_context(&self, conversation_id: &str) -> Result<UserContext> {
        let conversations = self.conversations.lock();
        let Some(conversation) = conversations.get(conversation_id) else {
            return Ok(UserContext::default());
        };
        let recent_message_count = self
            .turns
            .lock()
            .get(conversation_id)
            .map_or(0, Vec::len);

        Ok(UserContext {
            age_group: conversation.profile.age_group.clone(),
            prior_agent: conversation.last_agent,
            recent_message_count,
        })
    }

    async fn set_profile(&self, conversation_id: &str, profile: UserProfile) -> Result<()> {
        let mut conversations = self.conversations.lock();
        let conversation = conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| Self::new_conversation(conversation_id));
        conversation.profile = profile;
        conversation.last_activity = Utc::now();
        Ok(())
    }

    async fn record_turn(&self, conversation_id: &str, turn: Turn) -> Result<()> {
        {
            let mut conversations = self.conversations.lock();
            let conversation = conversations
                .entry(conversation_id.to_string())
                .or_insert_with(|| Self::new_conversation(conversation_id));
            conversation.last_activity = turn.timestamp;
            conversation.last_agent = Some(turn.routing.selected_agent);
        }

        self.turns
            .lock()
            .entry(conversation_id.to_string())
            .or_default()
            .push(turn);
        Ok(())
    }

    async fn transcript(&self, conversation_id: &str, limit: Option<usize>) -> Result<Vec<Turn>> {
        let turns = self.turns.lock();
        let entries = match turns.get(conversation_id) {
            Some(entries) => entries,
            None => return Ok(Vec::new()),
        };

        match limit {
            Some(n) => {
                let start = entries.len().saturating_sub(n);
                Ok(entries[start..].to_vec())
            }
            None => Ok(entries.clone()),
        }
    }

    async fn get(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        Ok(self.conversations.lock().get(conversation_id).cloned())
    }

    async fn list(&self, filter: &ConversationFilter) -> Result<Vec<Conversation>> {
        let conversations = self.conversations.lock();
        let mut results: Vec<Conversation> = conversations
            .values()
            .filter(|c| {
                if let Some(agent) = filter.last_agent {
                    if c.last_agent != Some(agent) {
                        return false;
                    }
                }
                if let Some(ref since) = filter.since {
                    if c.last_activity < *since {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        results.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));

        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        self.conversations.lock().remove(conversation_id);
        self.turns.lock().remove(conversation_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
