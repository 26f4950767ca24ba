#![no_main]
use careroute::routing::{AgentId, LanguageHint, Router, RoutingEngine, RoutingPolicy, RoutingRequest};
use libfuzzer_sys::fuzz_target;
use std::sync::OnceLock;

static ENGINE: OnceLock<RoutingEngine> = OnceLock::new();

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let engine = ENGINE.get_or_init(|| {
        RoutingEngine::builtin(RoutingPolicy::default()).expect("built-in rules compile")
    });

    let result = engine.route(&RoutingRequest::new(text).with_language(LanguageHint::Auto));
    assert!((0.0..=1.0).contains(&result.confidence));
    assert!(!result.reasons.is_empty());
    assert_eq!(result.scores_by_agent.len(), AgentId::ALL.len());
    if result.emergency_override {
        assert_eq!(result.selected_agent, AgentId::SafetyGuardian);
    }
    assert_eq!(result, engine.route(&RoutingRequest::new(text)));
});
