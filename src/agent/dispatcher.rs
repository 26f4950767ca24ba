//! End-to-end turn handling: route a message, invoke the selected agent and
//! record the turn in the conversation store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::prompt;
use super::traits::{AgentInvoker, AgentReply, AgentRequest, InvokeError};
use crate::routing::{AgentId, LanguageHint, Router, RoutingRequest, RoutingResult};
use crate::sessions::{ConversationStore, Turn};

/// Result of handling one inbound message end to end.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub turn_id: Uuid,
    pub routing: RoutingResult,
    pub reply: AgentReply,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The agent failed. The routing decision is kept so callers can still
    /// fall back to a fixed reply for the selected agent.
    #[error("{source}")]
    Invoke {
        routing: Box<RoutingResult>,
        #[source]
        source: InvokeError,
    },

    #[error("conversation store failed: {0}")]
    Store(#[from] anyhow::Error),
}

/// Routes a message, invokes the selected agent and records the turn.
pub struct AgentDispatcher {
    router: Arc<dyn Router>,
    invoker: Arc<dyn AgentInvoker>,
    store: Arc<dyn ConversationStore>,
    assistant_name: String,
    display_names: BTreeMap<AgentId, String>,
}

impl AgentDispatcher {
    pub fn new(
        router: Arc<dyn Router>,
        invoker: Arc<dyn AgentInvoker>,
        store: Arc<dyn ConversationStore>,
        assistant_name: impl Into<String>,
    ) -> Self {
        Self {
            router,
            invoker,
            store,
            assistant_name: assistant_name.into(),
            display_names: BTreeMap::new(),
        }
    }

    /// Per-agent names that replace the assistant name in prompts.
    pub fn with_display_names(mut self, display_names: BTreeMap<AgentId, String>) -> Self {
        self.display_names = display_names;
        self
    }

    fn name_for(&self, agent: AgentId) -> &str {
        prompt::display_name(&self.display_names, &self.assistant_name, agent)
    }

    pub async fn handle(
        &self,
        conversation_id: &str,
        message: &str,
        language_hint: Option<LanguageHint>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let user_context = self.store.user_context(conversation_id).await?;
        let request = RoutingRequest {
            message: Some(message.to_string()),
            language_hint,
            user_context: Some(user_context.clone()),
        };
        let routing = self.router.route(&request);

        let agent_request = AgentRequest {
            agent: routing.selected_agent,
            message: message.to_string(),
            language: routing.language,
            system_prompt: prompt::system_prompt(
                self.name_for(routing.selected_agent),
                routing.selected_agent,
                routing.language,
                &user_context,
            ),
            user_context,
            conversation_id: Some(conversation_id.to_string()),
        };

        let mut turn = Turn::new(message, routing.clone());
        let turn_id = turn.id;
        match self.invoker.invoke(&agent_request).await {
            Ok(reply) => {
                turn.reply = Some(reply.text.clone());
                self.store.record_turn(conversation_id, turn).await?;
                Ok(DispatchOutcome {
                    turn_id,
                    routing,
                    reply,
                })
            }
            Err(source) => {
                tracing::warn!(
                    agent = %routing.selected_agent,
                    transient = source.is_transient(),
                    invoker = self.invoker.name(),
                    "Agent invocation failed"
                );
                turn.error = Some(source.to_string());
                self.store.record_turn(conversation_id, turn).await?;
                Err(DispatchError::Invoke {
                    routing: Box::new(routing),
                    source,
                })
            }
        }
    }
}

/// Invoker that answers with the fixed per-agent reply, without a model.
#[derive(Debug, Clone, Default)]
pub struct OfflineInvoker;

#[async_trait]
impl AgentInvoker for OfflineInvoker {
    async fn invoke(&self, request: &AgentRequest) -> Result<AgentReply, InvokeError> {
        let mut reply = AgentReply::text(prompt::offline_reply(request.agent, request.language));
        reply
            .metadata
            .insert("agent".to_string(), request.agent.to_string());
        Ok(reply)
    }

    fn name(&self) -> &str {
        "offline"
    }
}
