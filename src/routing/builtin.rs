//! Built-in bilingual (English / Hong Kong Traditional Chinese) rule table.
//!
//! Used whenever `routing.rules_path` is not configured. `careroute rules export`
//! prints it as TOML so operators can start a custom table from it.

use super::rules::{
    AgentDefinitionDocument, KeywordGroupDocument, PatternDocument, RuleSetDocument,
};
use super::traits::AgentId;

pub const BUILTIN_VERSION: &str = "builtin-2024.1";

type Group = (&'static str, f64, &'static [&'static str]);
// (label, regex, weight, hard_trigger)
type Pattern = (&'static str, &'static str, f64, bool);

const SAFETY_BOOST: f64 = 0.3;
const ILLNESS_BOOST: f64 = 0.2;
const MENTAL_BOOST: f64 = 0.2;
const WELLNESS_BOOST: f64 = 0.1;

const SAFETY_GROUPS: &[Group] = &[
    (
        "injury",
        0.4,
        &[
            "fell down", "fell over", "fell off", "fallen down", "fallen over", "had a fall",
            "bleeding", "broken bone", "injured", "burned myself",
            "跌倒", "跌親", "流血", "受傷", "燒傷", "骨折",
        ],
    ),
    (
        "danger",
        0.4,
        &["emergency", "danger", "unsafe", "urgent", "緊急", "危險", "好急"],
    ),
    (
        "self-harm",
        0.5,
        &["self-harm", "self harm", "hurt myself", "cut myself", "自殘", "傷害自己", "割手"],
    ),
    (
        "poisoning",
        0.4,
        &["poison", "swallowed", "中毒", "誤服", "誤食"],
    ),
];

const SAFETY_PATTERNS: &[Pattern] = &[
    (
        "suicidal intent",
        r"(?i)\b(suicid\w*|kill(ing)?\s+myself|end(ing)?\s+my\s+life|end\s+it\s+all|want\s+to\s+die|(don'?t|don’t)\s+want\s+to\s+live)",
        0.6,
        true,
    ),
    ("suicidal intent (zh)", r"自殺|想死|唔想(再)?生存|唔想活|輕生|了結(自己|生命)", 0.6, true),
    (
        "breathing difficulty",
        r"(?i)\b(can'?t|can’t|cannot|can\s+not|unable\s+to|struggling\s+to|hard\s+to)\s+breathe?\b|\bnot\s+breathing\b|唞唔到氣|透唔到氣|呼吸困難",
        0.6,
        true,
    ),
    (
        "chest pain",
        r"(?i)\bchest\s+(is\s+|feels\s+)?(pain\w*|hurt\w*|tight\w*)|\b(pain|tightness|pressure)\s+in\s+my\s+chest\b|心口痛|胸口痛|胸痛|心口翳",
        0.6,
        true,
    ),
    ("heart attack", r"(?i)\bheart\s+attack\b|心臟病(發|發作)", 0.6, true),
    (
        "stroke",
        r"(?i)\b(having|had|is|it'?s|it’s)\s+a\s+stroke\b|\bstroke\s+(symptoms?|signs?)\b|\bface\s+(is\s+)?drooping\b|中風",
        0.6,
        true,
    ),
    ("seizure", r"(?i)\bseizures?\b|\bconvuls\w*|癲癇|羊吊|全身抽搐", 0.6, true),
    ("choking", r"(?i)\bchok(e|es|ed|ing)\b|哽親|鯁親|哽住|鯁住", 0.6, true),
    (
        "ambulance",
        r"(?i)\b(call|need|get|send)\s+(me\s+)?(an?\s+)?ambulance\b|叫救護車|召救護車|要救護車",
        0.6,
        true,
    ),
    (
        "emergency number",
        r"(?i)\b(call|calling|called|dial|dialing|dialling|ring|phone)\s+(for\s+)?(the\s+)?999\b|打\s*999|^\s*999\s*[!.]*\s*$",
        0.5,
        true,
    ),
    ("cry for help (zh)", r"救命", 0.6, true),
    (
        "unconsciousness",
        r"(?i)\b(unconscious|passed\s+out|unresponsive|not\s+responding)\b|暈低|昏迷|冇反應",
        0.6,
        true,
    ),
    (
        "severe bleeding",
        r"(?i)\b(bleeding\s+(heavily|a\s+lot|badly)|(won'?t|won’t)\s+stop\s+bleeding|severe\s+bleeding)|流血不止|大量出血",
        0.6,
        true,
    ),
    ("overdose", r"(?i)\boverdos(e|ed|ing)\b|食咗好多藥|服藥過量", 0.6, true),
    ("bare help request", r"(?i)^\s*help(\s+me)?\s*[!.]*\s*$|help\s*!{2,}", 0.3, false),
];

const ILLNESS_GROUPS: &[Group] = &[
    (
        "headache/dizziness",
        0.4,
        &[
            "headache", "migraine", "dizzy", "dizziness", "lightheaded", "light-headed", "vertigo",
            "頭痛", "頭暈", "偏頭痛", "暈眩",
        ],
    ),
    (
        "fever/respiratory",
        0.4,
        &[
            "fever", "cough", "sore throat", "runny nose", "influenza", "the flu", "chills",
            "發燒", "發熱", "咳", "喉嚨痛", "流鼻水", "感冒", "傷風",
        ],
    ),
    (
        "digestive",
        0.4,
        &[
            "stomach", "nausea", "nauseous", "vomit", "diarrhea", "diarrhoea", "constipat",
            "肚痛", "嘔", "肚瀉", "便秘", "作嘔",
        ],
    ),
    ("general pain", 0.3, &["pain", "ache", "aching", "sore", "hurts", "痛"]),
    (
        "chronic conditions/medication",
        0.3,
        &[
            "diabetes", "blood pressure", "hypertension", "asthma", "medication", "medicine",
            "pills", "dosage", "symptom", "糖尿", "血壓", "哮喘", "藥", "症狀",
        ],
    ),
    (
        "feeling unwell",
        0.3,
        &["unwell", "feel ill", "feeling ill", "not feeling well", "唔舒服", "病"],
    ),
];

const ILLNESS_PATTERNS: &[Pattern] = &[
    // Anchored so "homesick" and "lovesick" stay out.
    (
        "feeling sick",
        r"(?i)\b(feel|feels|feeling|felt|am|i'm|i’m|got|getting|been)\s+(so\s+|really\s+|very\s+|a\s+bit\s+)?sick\b",
        0.3,
        false,
    ),
    (
        "body temperature reading",
        r"(?i)\b(3[89]|4[01])(\.\d)?\s*°?\s*c\b|\b10[0-4](\.\d)?\s*°?\s*f\b|(3[89]|4[01])(\.\d)?\s*度",
        0.3,
        false,
    ),
    (
        "symptom duration",
        r"(?i)\bfor\s+(\d+|a\s+few|several|two|three)\s+(days|weeks)\b|(\d+|幾|兩|三)(日|個星期)",
        0.2,
        false,
    ),
];

const MENTAL_GROUPS: &[Group] = &[
    (
        "stress/anxiety",
        0.4,
        &[
            "stress", "anxious", "anxiety", "worried", "panic", "nervous", "overwhelmed",
            "under pressure", "peer pressure", "so much pressure", "壓力", "焦慮", "擔心",
            "緊張", "驚",
        ],
    ),
    (
        "low mood",
        0.4,
        &[
            "sad", "depressed", "depression", "hopeless", "lonely", "crying", "unhappy",
            "empty inside", "唔開心", "抑鬱", "傷心", "孤獨", "寂寞", "絕望",
        ],
    ),
    (
        "sleep/rumination",
        0.3,
        &[
            "can't sleep", "cannot sleep", "insomnia", "trouble sleeping", "nightmare",
            "overthinking", "瞓唔著", "失眠", "諗太多",
        ],
    ),
    (
        "emotional support",
        0.3,
        &[
            "talk to someone", "feel alone", "no one understands", "counsel", "therapy",
            "therapist", "傾訴", "輔導", "情緒",
        ],
    ),
];

const MENTAL_PATTERNS: &[Pattern] = &[(
    "feeling statement",
    r"(?i)\bi\s*(am|'m|’m)\s+(feeling\s+)?(so\s+|really\s+|very\s+)?(sad|anxious|stressed|depressed|lonely|scared|upset)\b|我(覺得)?(好|非常|真係)?(唔開心|焦慮|驚|傷心|抑鬱)",
    0.2,
    false,
)];

const WELLNESS_GROUPS: &[Group] = &[
    (
        "exercise/fitness",
        0.4,
        &[
            "exercise", "exercising", "workout", "work out", "fitness", "gym", "jogging", "yoga",
            "stretching", "運動", "健身", "跑步", "瑜伽",
        ],
    ),
    (
        "nutrition",
        0.4,
        &[
            "diet", "nutrition", "healthy eating", "eat healthy", "vegetables", "protein",
            "calories", "lose weight", "weight loss", "飲食", "營養", "減肥", "蔬菜", "生果",
        ],
    ),
    ("sleep hygiene", 0.3, &["sleep", "bedtime", "nap", "瞓覺", "睡眠", "休息"]),
    (
        "healthy habits",
        0.3,
        &[
            "healthy", "habit", "wellness", "wellbeing", "well-being", "lifestyle", "hydrat",
            "meditat", "健康", "習慣", "生活方式", "飲水",
        ],
    ),
];

const WELLNESS_PATTERNS: &[Pattern] = &[(
    "self-improvement question",
    r"(?i)\bhow\s+(can|do|should)\s+i\s+(start|improve|get\s+better|build|keep)|點樣(可以)?(開始|改善|保持)",
    0.2,
    false,
)];

fn agent(
    agent_id: AgentId,
    boost: f64,
    groups: &[Group],
    patterns: &[Pattern],
) -> AgentDefinitionDocument {
    AgentDefinitionDocument {
        agent_id,
        base_confidence_boost: boost,
        keyword_groups: groups
            .iter()
            .map(|(label, weight, keywords)| KeywordGroupDocument {
                label: (*label).to_string(),
                weight: *weight,
                keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            })
            .collect(),
        patterns: patterns
            .iter()
            .map(|(label, pattern, weight, hard)| PatternDocument {
                label: (*label).to_string(),
                pattern: (*pattern).to_string(),
                weight: *weight,
                hard_trigger: *hard,
            })
            .collect(),
    }
}

/// The built-in rule table in document form.
pub fn default_document() -> RuleSetDocument {
    RuleSetDocument {
        version: BUILTIN_VERSION.to_string(),
        agents: vec![
            agent(AgentId::SafetyGuardian, SAFETY_BOOST, SAFETY_GROUPS, SAFETY_PATTERNS),
            agent(AgentId::IllnessMonitor, ILLNESS_BOOST, ILLNESS_GROUPS, ILLNESS_PATTERNS),
            agent(AgentId::MentalHealth, MENTAL_BOOST, MENTAL_GROUPS, MENTAL_PATTERNS),
            agent(AgentId::WellnessCoach, WELLNESS_BOOST, WELLNESS_GROUPS, WELLNESS_PATTERNS),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::rules::RuleSet;

    #[test]
    fn builtin_table_compiles() {
        let rules = RuleSet::compile(&default_document()).unwrap();
        assert_eq!(rules.version(), BUILTIN_VERSION);
    }

    #[test]
    fn boosts_keep_qualitative_ordering() {
        let rules = RuleSet::compile(&default_document()).unwrap();
        let boost = |a| rules.get(a).base_confidence_boost;
        assert!(boost(AgentId::SafetyGuardian) > boost(AgentId::IllnessMonitor));
        assert_eq!(boost(AgentId::IllnessMonitor), boost(AgentId::MentalHealth));
        assert!(boost(AgentId::MentalHealth) > boost(AgentId::WellnessCoach));
    }

    #[test]
    fn only_safety_carries_hard_triggers() {
        let doc = default_document();
        for agent in &doc.agents {
            let hard = agent.patterns.iter().filter(|p| p.hard_trigger).count();
            if agent.agent_id == AgentId::SafetyGuardian {
                assert!(hard >= 8);
            } else {
                assert_eq!(hard, 0, "{} has hard triggers", agent.agent_id);
            }
        }
    }

    #[test]
    fn every_agent_has_traditional_chinese_keywords() {
        let has_han = |s: &str| s.chars().any(|c| ('\u{4E00}'..='\u{9FFF}').contains(&c));
        for agent in default_document().agents {
            assert!(
                agent
                    .keyword_groups
                    .iter()
                    .flat_map(|g| g.keywords.iter())
                    .any(|k| has_han(k)),
                "{} lacks Chinese keywords",
                agent.agent_id
            );
        }
    }

    #[test]
    fn builtin_table_survives_toml_export() {
        let doc = default_document();
        let exported = doc.to_toml().unwrap();
        let reparsed = RuleSetDocument::from_toml(&exported).unwrap();
        assert_eq!(reparsed, doc);
        RuleSet::compile(&reparsed).unwrap();
    }
}
