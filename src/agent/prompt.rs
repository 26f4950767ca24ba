//! Per-agent system prompts and offline replies.

use std::collections::BTreeMap;

use crate::routing::{AgentId, Language, UserContext};

fn persona(agent: AgentId) -> &'static str {
    match agent {
        AgentId::SafetyGuardian => {
            "You are the safety and emergency agent. Treat every message as potentially urgent. \
             Give short, concrete safety instructions first, tell the user to call 999 (Hong Kong \
             emergency services) or go to the nearest Accident & Emergency department when there \
             is any risk to life, and stay with them until help is arranged."
        }
        AgentId::IllnessMonitor => {
            "You are the illness monitoring agent. Ask about symptoms, their onset, duration and \
             severity, and track changes across the conversation. Offer general self-care guidance \
             and say clearly when a doctor should be seen. Never give a diagnosis or prescribe \
             medication."
        }
        AgentId::MentalHealth => {
            "You are the mental health support agent. Listen first, reflect feelings back without \
             judgement, and offer simple coping techniques such as slow breathing or grounding. \
             Suggest professional support when distress persists."
        }
        AgentId::WellnessCoach => {
            "You are the wellness coach. Encourage sustainable habits around exercise, nutrition, \
             sleep and hydration, with small achievable goals."
        }
    }
}

fn language_instruction(language: Language) -> &'static str {
    match language {
        Language::En => "Reply in English.",
        Language::ZhHk => "請用繁體中文（香港粵語口語）回覆。",
    }
}

/// Name the assistant uses for `agent`: its display name if one is set,
/// otherwise `assistant_name`.
pub fn display_name<'a>(
    display_names: &'a BTreeMap<AgentId, String>,
    assistant_name: &'a str,
    agent: AgentId,
) -> &'a str {
    display_names
        .get(&agent)
        .map_or(assistant_name, String::as_str)
}

/// Build the system prompt for `agent`.
pub fn system_prompt(
    assistant_name: &str,
    agent: AgentId,
    language: Language,
    context: &UserContext,
) -> String {
    let mut prompt = format!(
        "You are {assistant_name}, a healthcare support assistant.\n{}\n",
        persona(agent)
    );

    if let Some(age_group) = context.age_group.as_deref() {
        prompt.push_str(&format!(
            "The user is in the '{age_group}' age group; adjust tone and advice accordingly.\n"
        ));
    }
    if context.prior_agent.is_some_and(|prior| prior != agent) {
        prompt.push_str(
            "The conversation was previously handled by another specialist; acknowledge the handover briefly.\n",
        );
    }
    prompt.push_str(language_instruction(language));
    prompt
}

/// Fixed reply used when no language model is available.
pub fn offline_reply(agent: AgentId, language: Language) -> &'static str {
    match (agent, language) {
        (AgentId::SafetyGuardian, Language::En) => {
            "This sounds like it could be an emergency. Please call 999 now or go to the nearest \
             Accident & Emergency department. If someone is with you, ask them to stay with you."
        }
        (AgentId::SafetyGuardian, Language::ZhHk) => {
            "呢個情況可能係緊急情況。請即刻打999，或者去最近嘅急症室。如果身邊有人，請佢陪住你。"
        }
        (AgentId::IllnessMonitor, Language::En) => {
            "I'm sorry you're feeling unwell. Can you tell me when the symptoms started and how \
             severe they are? If they get worse, please see a doctor."
        }
        (AgentId::IllnessMonitor, Language::ZhHk) => {
            "唔舒服真係辛苦你。可唔可以話我知啲症狀幾時開始、有幾嚴重？如果惡化，請盡快睇醫生。"
        }
        (AgentId::MentalHealth, Language::En) => {
            "Thank you for sharing how you feel. I'm here to listen. Would you like to tell me more \
             about what's been on your mind?"
        }
        (AgentId::MentalHealth, Language::ZhHk) => {
            "多謝你願意講出你嘅感受。我喺度聽你講，你想唔想講多少少最近令你困擾嘅事？"
        }
        (AgentId::WellnessCoach, Language::En) => {
            "Small steps add up. What's one healthy habit you'd like to work on this week?"
        }
        (AgentId::WellnessCoach, Language::ZhHk) => {
            "一步一步嚟就得。你今個星期想培養邊一個健康習慣？"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_prompt_always_mentions_emergency_number() {
        for language in [Language::En, Language::ZhHk] {
            let prompt = system_prompt("CareBuddy", AgentId::SafetyGuardian, language, &UserContext::default());
            assert!(prompt.contains("999"));
            assert!(offline_reply(AgentId::SafetyGuardian, language).contains("999"));
        }
    }

    #[test]
    fn prompt_carries_name_language_and_age_group() {
        let context = UserContext {
            age_group: Some("elderly".into()),
            ..UserContext::default()
        };
        let prompt = system_prompt("CareBuddy", AgentId::IllnessMonitor, Language::ZhHk, &context);
        assert!(prompt.starts_with("You are CareBuddy"));
        assert!(prompt.contains("'elderly'"));
        assert!(prompt.ends_with("請用繁體中文（香港粵語口語）回覆。"));
    }

    #[test]
    fn handover_note_only_when_agent_changes() {
        let context = UserContext {
            prior_agent: Some(AgentId::WellnessCoach),
            ..UserContext::default()
        };
        let changed = system_prompt("CareBuddy", AgentId::MentalHealth, Language::En, &context);
        let same = system_prompt("CareBuddy", AgentId::WellnessCoach, Language::En, &context);
        assert!(changed.contains("handover"));
        assert!(!same.contains("handover"));
    }

    #[test]
    fn display_name_falls_back_to_assistant_name() {
        let names = BTreeMap::from([(AgentId::SafetyGuardian, "SafetyBuddy".to_string())]);
        assert_eq!(display_name(&names, "CareBuddy", AgentId::SafetyGuardian), "SafetyBuddy");
        assert_eq!(display_name(&names, "CareBuddy", AgentId::MentalHealth), "CareBuddy");
    }

    #[test]
    fn every_agent_has_distinct_persona() {
        let prompts: std::collections::HashSet<_> = AgentId::ALL
            .iter()
            .map(|a| system_prompt("x", *a, Language::En, &UserContext::default()))
            .collect();
        assert_eq!(prompts.len(), 4);
    }
}
