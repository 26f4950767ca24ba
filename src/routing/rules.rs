//! Agent rule sets: the serde document form, the compiled form, and the
//! validation that turns one into the other.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::traits::{AgentId, Language};

/// Configuration errors detected while building a rule set or engine.
///
/// These only ever surface at construction time; routing itself cannot fail.
#[derive(Debug, Error, PartialEq)]
pub enum RuleSetError {
    #[error("rule set version must not be empty")]
    EmptyVersion,

    #[error("agent '{0}' is defined more than once")]
    DuplicateAgent(AgentId),

    #[error("agent '{0}' has no definition")]
    MissingAgent(AgentId),

    #[error(
        "safety_guardian base_confidence_boost ({safety}) must be strictly greater than {other}'s ({other_boost})"
    )]
    AmbiguousSafetyBoost {
        safety: f64,
        other: AgentId,
        other_boost: f64,
    },

    #[error("{agent}: pattern '{label}' failed to compile: {message}")]
    InvalidPattern {
        agent: AgentId,
        label: String,
        message: String,
    },

    #[error("{agent}: keyword group '{label}' has no usable keywords")]
    EmptyKeywordGroup { agent: AgentId, label: String },

    #[error("{agent}: weight of '{label}' must be a positive finite number, got {value}")]
    InvalidWeight {
        agent: AgentId,
        label: String,
        value: f64,
    },

    #[error("{agent}: base_confidence_boost must be a non-negative finite number, got {value}")]
    InvalidBoost { agent: AgentId, value: f64 },

    #[error("{agent}: pattern '{label}' is flagged hard_trigger but only safety_guardian may carry hard emergency triggers")]
    HardTriggerOutsideSafety { agent: AgentId, label: String },

    #[error("safety_guardian must define at least one hard_trigger pattern")]
    NoHardTriggers,

    #[error("routing.{field} {reason}")]
    InvalidPolicy { field: &'static str, reason: String },
}

// ── Document form (what config files and the built-in table hold) ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KeywordGroupDocument {
    pub label: String,
    pub weight: f64,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PatternDocument {
    pub label: String,
    pub pattern: String,
    pub weight: f64,
    /// Matching this pattern forces an emergency override.
    #[serde(default)]
    pub hard_trigger: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentDefinitionDocument {
    pub agent_id: AgentId,
    pub base_confidence_boost: f64,
    #[serde(default)]
    pub keyword_groups: Vec<KeywordGroupDocument>,
    #[serde(default)]
    pub patterns: Vec<PatternDocument>,
}

/// A complete, versioned rule set as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RuleSetDocument {
    pub version: String,
    pub agents: Vec<AgentDefinitionDocument>,
}

impl RuleSetDocument {
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn agent_mut(&mut self, agent: AgentId) -> Option<&mut AgentDefinitionDocument> {
        self.agents.iter_mut().find(|a| a.agent_id == agent)
    }
}

// ── Compiled form ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct KeywordGroup {
    pub label: String,
    pub weight: f64,
    /// Stored lowercased; matched against the lowercased message.
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    /// Keywords present in an already-lowercased message.
    pub fn hits<'a>(&'a self, normalized: &str) -> Vec<&'a str> {
        self.keywords
            .iter()
            .filter(|k| normalized.contains(k.as_str()))
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub label: String,
    pub regex: Regex,
    pub weight: f64,
    pub hard_trigger: bool,
}

#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub agent_id: AgentId,
    pub keyword_groups: Vec<KeywordGroup>,
    pub patterns: Vec<PatternRule>,
    pub base_confidence_boost: f64,
}

/// A validated rule set holding exactly one definition per agent.
#[derive(Debug, Clone)]
pub struct RuleSet {
    version: String,
    // Indexed by AgentId::priority().
    definitions: Vec<AgentDefinition>,
}

impl RuleSet {
    pub fn compile(document: &RuleSetDocument) -> Result<Self, RuleSetError> {
        let version = document.version.trim();
        if version.is_empty() {
            return Err(RuleSetError::EmptyVersion);
        }

        let mut by_agent: BTreeMap<AgentId, AgentDefinition> = BTreeMap::new();
        for doc in &document.agents {
            if by_agent.contains_key(&doc.agent_id) {
                return Err(RuleSetError::DuplicateAgent(doc.agent_id));
            }
            by_agent.insert(doc.agent_id, compile_agent(doc)?);
        }

        let mut definitions = Vec::with_capacity(AgentId::ALL.len());
        for agent in AgentId::ALL {
            let definition = by_agent
                .remove(&agent)
                .ok_or(RuleSetError::MissingAgent(agent))?;
            definitions.push(definition);
        }

        let safety = &definitions[AgentId::SafetyGuardian.priority()];
        if !safety.patterns.iter().any(|p| p.hard_trigger) {
            return Err(RuleSetError::NoHardTriggers);
        }
        let safety_boost = safety.base_confidence_boost;
        for other in definitions.iter().filter(|d| d.agent_id != AgentId::SafetyGuardian) {
            if other.base_confidence_boost >= safety_boost {
                return Err(RuleSetError::AmbiguousSafetyBoost {
                    safety: safety_boost,
                    other: other.agent_id,
                    other_boost: other.base_confidence_boost,
                });
            }
        }

        Ok(Self {
            version: version.to_string(),
            definitions,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn get(&self, agent: AgentId) -> &AgentDefinition {
        &self.definitions[agent.priority()]
    }

    /// Definitions in tie-break priority order.
    pub fn definitions(&self) -> &[AgentDefinition] {
        &self.definitions
    }

    /// Gap between safety_guardian's boost and the largest other boost.
    pub fn safety_margin(&self) -> f64 {
        let safety = self.get(AgentId::SafetyGuardian).base_confidence_boost;
        let runner_up = self
            .definitions
            .iter()
            .filter(|d| d.agent_id != AgentId::SafetyGuardian)
            .map(|d| d.base_confidence_boost)
            .fold(0.0_f64, f64::max);
        safety - runner_up
    }
}

fn compile_agent(doc: &AgentDefinitionDocument) -> Result<AgentDefinition, RuleSetError> {
    let agent = doc.agent_id;
    if !doc.base_confidence_boost.is_finite() || doc.base_confidence_boost < 0.0 {
        return Err(RuleSetError::InvalidBoost {
            agent,
            value: doc.base_confidence_boost,
        });
    }

    let mut keyword_groups = Vec::with_capacity(doc.keyword_groups.len());
    for group in &doc.keyword_groups {
        check_weight(agent, &group.label, group.weight)?;
        let keywords: Vec<String> = group
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() || keywords.len() != group.keywords.len() {
            return Err(RuleSetError::EmptyKeywordGroup {
                agent,
                label: group.label.clone(),
            });
        }
        keyword_groups.push(KeywordGroup {
            label: group.label.clone(),
            weight: group.weight,
            keywords,
        });
    }

    let mut patterns = Vec::with_capacity(doc.patterns.len());
    for pattern in &doc.patterns {
        check_weight(agent, &pattern.label, pattern.weight)?;
        if pattern.hard_trigger && agent != AgentId::SafetyGuardian {
            return Err(RuleSetError::HardTriggerOutsideSafety {
                agent,
                label: pattern.label.clone(),
            });
        }
        let regex = Regex::new(&pattern.pattern).map_err(|e| RuleSetError::InvalidPattern {
            agent,
            label: pattern.label.clone(),
            message: e.to_string(),
        })?;
        patterns.push(PatternRule {
            label: pattern.label.clone(),
            regex,
            weight: pattern.weight,
            hard_trigger: pattern.hard_trigger,
        });
    }

    Ok(AgentDefinition {
        agent_id: agent,
        keyword_groups,
        patterns,
        base_confidence_boost: doc.base_confidence_boost,
    })
}

fn check_weight(agent: AgentId, label: &str, weight: f64) -> Result<(), RuleSetError> {
    if weight.is_finite() && weight > 0.0 {
        Ok(())
    } else {
        Err(RuleSetError::InvalidWeight {
            agent,
            label: label.to_string(),
            value: weight,
        })
    }
}

// ── Scoring policy ─────────────────────────────────────────────────

/// Named constants that turn raw rule scores into a decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingPolicy {
    /// Raw score that maps to confidence 1.0.
    pub normalization_constant: f64,
    /// Confidence reported whenever the emergency override fires.
    pub emergency_confidence_floor: f64,
    /// Confidence of the wellness_coach fallback when nothing matched.
    pub default_confidence: f64,
    /// Selections below this get a low-confidence reason attached.
    pub low_confidence_threshold: f64,
    /// Added to the prior agent's raw score when that agent matched again.
    pub continuity_boost: f64,
    /// Answer language when the hint is auto and the text is inconclusive.
    pub default_language: Language,
}

pub const DEFAULT_NORMALIZATION_CONSTANT: f64 = 1.0;
pub const DEFAULT_EMERGENCY_CONFIDENCE_FLOOR: f64 = 0.95;
pub const DEFAULT_FALLBACK_CONFIDENCE: f64 = 0.1;
pub const DEFAULT_LOW_CONFIDENCE_THRESHOLD: f64 = 0.4;
pub const DEFAULT_CONTINUITY_BOOST: f64 = 0.05;

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            normalization_constant: DEFAULT_NORMALIZATION_CONSTANT,
            emergency_confidence_floor: DEFAULT_EMERGENCY_CONFIDENCE_FLOOR,
            default_confidence: DEFAULT_FALLBACK_CONFIDENCE,
            low_confidence_threshold: DEFAULT_LOW_CONFIDENCE_THRESHOLD,
            continuity_boost: DEFAULT_CONTINUITY_BOOST,
            default_language: Language::En,
        }
    }
}

impl RoutingPolicy {
    /// Check the policy against the rule set it will score.
    pub fn validate(&self, rules: &RuleSet) -> Result<(), RuleSetError> {
        self.validate_ranges()?;
        // Continuity must never be able to outweigh safety_guardian's boost.
        let margin = rules.safety_margin();
        if self.continuity_boost >= margin {
            return Err(RuleSetError::InvalidPolicy {
                field: "continuity_boost",
                reason: format!(
                    "({}) must be smaller than the safety_guardian boost margin ({margin})",
                    self.continuity_boost
                ),
            });
        }
        Ok(())
    }

    /// Range checks that do not depend on a rule set.
    pub fn validate_ranges(&self) -> Result<(), RuleSetError> {
        if !self.normalization_constant.is_finite() || self.normalization_constant <= 0.0 {
            return Err(RuleSetError::InvalidPolicy {
                field: "normalization_constant",
                reason: format!("must be > 0, got {}", self.normalization_constant),
            });
        }
        if !(self.emergency_confidence_floor > 0.0 && self.emergency_confidence_floor <= 1.0) {
            return Err(RuleSetError::InvalidPolicy {
                field: "emergency_confidence_floor",
                reason: format!("must be in (0, 1], got {}", self.emergency_confidence_floor),
            });
        }
        if !(0.0..=1.0).contains(&self.default_confidence) {
            return Err(RuleSetError::InvalidPolicy {
                field: "default_confidence",
                reason: format!("must be in [0, 1], got {}", self.default_confidence),
            });
        }
        if !(0.0..=1.0).contains(&self.low_confidence_threshold) {
            return Err(RuleSetError::InvalidPolicy {
                field: "low_confidence_threshold",
                reason: format!("must be in [0, 1], got {}", self.low_confidence_threshold),
            });
        }
        if !self.continuity_boost.is_finite() || self.continuity_boost < 0.0 {
            return Err(RuleSetError::InvalidPolicy {
                field: "continuity_boost",
                reason: format!("must be >= 0, got {}", self.continuity_boost),
            });
        }
        Ok(())
    }
}
