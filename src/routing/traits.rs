//! Routing types shared by the engine, the dispatcher and the conversation store.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The four specialized agents a message can be routed to.
///
/// Declaration order is the tie-break priority: when two agents end up with
/// the same confidence, the one declared first wins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    SafetyGuardian,
    IllnessMonitor,
    MentalHealth,
    WellnessCoach,
}

impl AgentId {
    /// Every agent, highest tie-break priority first.
    pub const ALL: [AgentId; 4] = [
        AgentId::SafetyGuardian,
        AgentId::IllnessMonitor,
        AgentId::MentalHealth,
        AgentId::WellnessCoach,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentId::SafetyGuardian => "safety_guardian",
            AgentId::IllnessMonitor => "illness_monitor",
            AgentId::MentalHealth => "mental_health",
            AgentId::WellnessCoach => "wellness_coach",
        }
    }

    /// Position in the tie-break order (0 is strongest).
    pub fn priority(self) -> usize {
        match self {
            AgentId::SafetyGuardian => 0,
            AgentId::IllnessMonitor => 1,
            AgentId::MentalHealth => 2,
            AgentId::WellnessCoach => 3,
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "safety_guardian" | "safety" => Ok(AgentId::SafetyGuardian),
            "illness_monitor" | "illness" => Ok(AgentId::IllnessMonitor),
            "mental_health" | "mental" => Ok(AgentId::MentalHealth),
            "wellness_coach" | "wellness" => Ok(AgentId::WellnessCoach),
            other => Err(format!(
                "unknown agent '{other}' (expected safety_guardian, illness_monitor, mental_health or wellness_coach)"
            )),
        }
    }
}

/// Caller-supplied language hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum LanguageHint {
    #[serde(rename = "en")]
    En,
    #[serde(rename = "zh-HK")]
    ZhHk,
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

/// Language the selected agent should answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Language {
    #[serde(rename = "en")]
    En,
    #[serde(rename = "zh-HK")]
    ZhHk,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::ZhHk => "zh-HK",
        }
    }
}

impl FromStr for LanguageHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(LanguageHint::En),
            "zh-hk" | "zh_hk" | "zh" | "yue" => Ok(LanguageHint::ZhHk),
            "auto" | "" => Ok(LanguageHint::Auto),
            other => Err(format!("unknown language '{other}' (expected en, zh-HK or auto)")),
        }
    }
}

/// Read-only user/conversation context supplied by the conversation store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub age_group: Option<String>,
    pub prior_agent: Option<AgentId>,
    pub recent_message_count: usize,
}

/// Immutable input to one routing decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRequest {
    /// Absent messages route exactly like empty ones.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub language_hint: Option<LanguageHint>,
    #[serde(default)]
    pub user_context: Option<UserContext>,
}

impl RoutingRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            language_hint: None,
            user_context: None,
        }
    }

    pub fn with_language(mut self, hint: LanguageHint) -> Self {
        self.language_hint = Some(hint);
        self
    }

    pub fn with_context(mut self, context: UserContext) -> Self {
        self.user_context = Some(context);
        self
    }

    pub fn text(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

/// Output of one routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub selected_agent: AgentId,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub emergency_override: bool,
    /// Normalized confidence of every agent, not only the winner.
    pub scores_by_agent: BTreeMap<AgentId, f64>,
    pub language: Language,
    pub rule_set_version: String,
}

impl RoutingResult {
    /// Whether the engine flagged this selection as weak.
    pub fn is_low_confidence(&self) -> bool {
        self.reasons.iter().any(|r| r == LOW_CONFIDENCE_REASON)
    }

    pub fn is_default_routing(&self) -> bool {
        self.reasons.iter().any(|r| r == DEFAULT_ROUTING_REASON)
    }
}

/// Selects the agent that should answer a message.
///
/// Implementations never fail per request: a message with no recognizable
/// signal still yields a (low-confidence) selection.
pub trait Router: Send + Sync {
    fn route(&self, request: &RoutingRequest) -> RoutingResult;

    /// The name of this router implementation.
    fn name(&self) -> &str;
}

pub const DEFAULT_ROUTING_REASON: &str = "no specific match; default routing";
pub const LOW_CONFIDENCE_REASON: &str = "low confidence selection";
pub const CONTINUITY_REASON: &str = "Continuity with prior agent";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_order_matches_tie_break_priority() {
        let mut sorted = AgentId::ALL;
        sorted.sort();
        assert_eq!(sorted, AgentId::ALL);
        for (i, agent) in AgentId::ALL.iter().enumerate() {
            assert_eq!(agent.priority(), i);
        }
    }

    #[test]
    fn agent_id_parses_canonical_and_short_names() {
        assert_eq!("safety_guardian".parse(), Ok(AgentId::SafetyGuardian));
        assert_eq!("Mental-Health".parse(), Ok(AgentId::MentalHealth));
        assert_eq!("wellness".parse(), Ok(AgentId::WellnessCoach));
        assert!("triage".parse::<AgentId>().is_err());
    }

    #[test]
    fn agent_id_serializes_snake_case() {
        let json = serde_json::to_string(&AgentId::IllnessMonitor).unwrap();
        assert_eq!(json, "\"illness_monitor\"");
    }

    #[test]
    fn language_hint_uses_wire_names() {
        assert_eq!(serde_json::to_string(&LanguageHint::ZhHk).unwrap(), "\"zh-HK\"");
        let hint: LanguageHint = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(hint, LanguageHint::Auto);
        assert_eq!("zh-HK".parse(), Ok(LanguageHint::ZhHk));
    }

    #[test]
    fn missing_message_reads_as_empty() {
        let request = RoutingRequest::default();
        assert_eq!(request.text(), "");
    }
}
