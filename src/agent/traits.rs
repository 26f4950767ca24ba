//! Agent invocation contract: what the router hands to a specialized agent
//! and what comes back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::routing::{AgentId, Language, UserContext};

/// Everything an agent needs to produce one reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub agent: AgentId,
    pub message: String,
    pub language: Language,
    pub user_context: UserContext,
    pub system_prompt: String,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub text: String,
    pub model: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl AgentReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
            metadata: HashMap::new(),
        }
    }
}

/// Invocation failure. Callers retry or fall back only on transient errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("{agent} is temporarily unavailable: {message}")]
    Transient { agent: AgentId, message: String },

    #[error("{agent} rejected the request: {message}")]
    Fatal { agent: AgentId, message: String },
}

impl InvokeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, InvokeError::Transient { .. })
    }

    pub fn agent(&self) -> AgentId {
        match self {
            InvokeError::Transient { agent, .. } | InvokeError::Fatal { agent, .. } => *agent,
        }
    }
}

/// Produces the natural-language reply of a specialized agent.
///
/// Implementations typically template the system prompt and call a hosted
/// language model; model-tier fallback belongs to the implementation.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, request: &AgentRequest) -> Result<AgentReply, InvokeError>;

    /// The name of this invoker implementation.
    fn name(&self) -> &str;
}
