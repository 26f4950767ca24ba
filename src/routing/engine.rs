//! Rule-weighted agent selection with emergency override and fixed tie-break.

use std::collections::BTreeMap;

use super::builtin;
use super::language;
use super::rules::{AgentDefinition, RoutingPolicy, RuleSet, RuleSetDocument, RuleSetError};
use super::traits::{
    AgentId, Router, RoutingRequest, RoutingResult, UserContext, CONTINUITY_REASON,
    DEFAULT_ROUTING_REASON, LOW_CONFIDENCE_REASON,
};

/// Confidences closer than this are treated as tied.
const TIE_EPSILON: f64 = 1e-9;

/// Score of one agent for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentScore {
    pub agent: AgentId,
    /// Sum of matched weights plus boosts, before normalization.
    pub raw: f64,
    pub confidence: f64,
    pub hard_trigger: bool,
    pub reasons: Vec<String>,
}

/// Score a single agent against a lowercased and an original copy of the message.
pub fn score_agent(
    definition: &AgentDefinition,
    normalized: &str,
    original: &str,
    context: Option<&UserContext>,
    policy: &RoutingPolicy,
) -> AgentScore {
    let mut raw = 0.0;
    let mut reasons = Vec::new();
    let mut hard_trigger = false;

    for group in &definition.keyword_groups {
        let hits = group.hits(normalized);
        if !hits.is_empty() {
            raw += group.weight;
            reasons.push(format!(
                "Matched keyword group: {} ({})",
                group.label,
                hits.join(", ")
            ));
        }
    }

    for pattern in &definition.patterns {
        if pattern.regex.is_match(original) {
            raw += pattern.weight;
            hard_trigger |= pattern.hard_trigger;
            if pattern.hard_trigger {
                reasons.push(format!(
                    "Matched pattern: {} (hard emergency trigger)",
                    pattern.label
                ));
            } else {
                reasons.push(format!("Matched pattern: {}", pattern.label));
            }
        }
    }

    if raw > 0.0 {
        raw += definition.base_confidence_boost;
        if context.and_then(|c| c.prior_agent) == Some(definition.agent_id)
            && policy.continuity_boost > 0.0
        {
            raw += policy.continuity_boost;
            reasons.push(CONTINUITY_REASON.to_string());
        }
    }

    AgentScore {
        agent: definition.agent_id,
        raw,
        confidence: (raw / policy.normalization_constant).clamp(0.0, 1.0),
        hard_trigger,
        reasons,
    }
}

/// Score every agent, in tie-break priority order.
pub fn score_all(
    request: &RoutingRequest,
    rules: &RuleSet,
    policy: &RoutingPolicy,
) -> Vec<AgentScore> {
    let original = request.text();
    let normalized = original.to_lowercase();
    let context = request.user_context.as_ref();
    rules
        .definitions()
        .iter()
        .map(|def| score_agent(def, &normalized, original, context, policy))
        .collect()
}

/// Pure routing decision over an already-validated rule set.
pub fn route(request: &RoutingRequest, rules: &RuleSet, policy: &RoutingPolicy) -> RoutingResult {
    let scores = score_all(request, rules, policy);
    let scores_by_agent: BTreeMap<AgentId, f64> =
        scores.iter().map(|s| (s.agent, s.confidence)).collect();
    let language = language::resolve(request.language_hint, request.text(), policy.default_language);
    let rule_set_version = rules.version().to_string();

    let safety = &scores[AgentId::SafetyGuardian.priority()];
    if safety.raw > 0.0 && safety.hard_trigger {
        let mut reasons = safety.reasons.clone();
        reasons.push("Emergency override: hard emergency pattern matched".to_string());
        push_also_matched(&mut reasons, &scores, AgentId::SafetyGuardian);
        return RoutingResult {
            selected_agent: AgentId::SafetyGuardian,
            confidence: policy.emergency_confidence_floor,
            reasons,
            emergency_override: true,
            scores_by_agent,
            language,
            rule_set_version,
        };
    }

    if scores.iter().all(|s| s.raw <= 0.0) {
        let mut reasons = vec![DEFAULT_ROUTING_REASON.to_string()];
        if policy.default_confidence < policy.low_confidence_threshold {
            reasons.push(LOW_CONFIDENCE_REASON.to_string());
        }
        return RoutingResult {
            selected_agent: AgentId::WellnessCoach,
            confidence: policy.default_confidence,
            reasons,
            emergency_override: false,
            scores_by_agent,
            language,
            rule_set_version,
        };
    }

    let winner = select_winner(&scores);
    let mut reasons = winner.reasons.clone();
    push_also_matched(&mut reasons, &scores, winner.agent);
    if winner.confidence < policy.low_confidence_threshold {
        reasons.push(LOW_CONFIDENCE_REASON.to_string());
    }

    RoutingResult {
        selected_agent: winner.agent,
        confidence: winner.confidence,
        reasons,
        emergency_override: false,
        scores_by_agent,
        language,
        rule_set_version,
    }
}

/// Highest confidence wins; the earlier agent in priority order keeps a tie.
fn select_winner(scores: &[AgentScore]) -> &AgentScore {
    let mut ordered: Vec<&AgentScore> = scores.iter().collect();
    ordered.sort_by_key(|s| s.agent.priority());

    let mut best = ordered[0];
    for &candidate in &ordered[1..] {
        if candidate.confidence > best.confidence + TIE_EPSILON {
            best = candidate;
        }
    }
    best
}

fn push_also_matched(reasons: &mut Vec<String>, scores: &[AgentScore], selected: AgentId) {
    for other in scores.iter().filter(|s| s.agent != selected && s.raw > 0.0) {
        reasons.push(format!(
            "Also matched {} (confidence {:.2})",
            other.agent, other.confidence
        ));
    }
}

/// A validated rule set bound to the policy that scores it.
#[derive(Debug, Clone)]
pub struct RoutingEngine {
    rules: RuleSet,
    policy: RoutingPolicy,
}

impl RoutingEngine {
    pub fn new(rules: RuleSet, policy: RoutingPolicy) -> Result<Self, RuleSetError> {
        policy.validate(&rules)?;
        Ok(Self { rules, policy })
    }

    pub fn from_document(
        document: &RuleSetDocument,
        policy: RoutingPolicy,
    ) -> Result<Self, RuleSetError> {
        Self::new(RuleSet::compile(document)?, policy)
    }

    /// Engine over the built-in rule table.
    pub fn builtin(policy: RoutingPolicy) -> Result<Self, RuleSetError> {
        Self::from_document(&builtin::default_document(), policy)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    pub fn version(&self) -> &str {
        self.rules.version()
    }

    pub fn scores(&self, request: &RoutingRequest) -> Vec<AgentScore> {
        score_all(request, &self.rules, &self.policy)
    }
}

impl Router for RoutingEngine {
    fn route(&self, request: &RoutingRequest) -> RoutingResult {
        let result = route(request, &self.rules, &self.policy);
        if result.emergency_override {
            tracing::warn!(
                agent = %result.selected_agent,
                confidence = result.confidence,
                rule_set = %result.rule_set_version,
                message_chars = request.text().chars().count(),
                "Emergency override routed message to safety_guardian"
            );
        } else if result.is_low_confidence() {
            tracing::info!(
                agent = %result.selected_agent,
                confidence = result.confidence,
                default_routing = result.is_default_routing(),
                rule_set = %result.rule_set_version,
                "Low confidence routing decision"
            );
        } else {
            tracing::debug!(
                agent = %result.selected_agent,
                confidence = result.confidence,
                emergency_override = false,
                rule_set = %result.rule_set_version,
                "Routing decision"
            );
        }
        result
    }

    fn name(&self) -> &str {
        "rules"
    }
}
