#![no_main]
use careroute::routing::{RoutingEngine, RoutingPolicy, RuleSetDocument};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Parsing and compiling must reject bad input without panicking.
        if let Ok(document) = RuleSetDocument::from_toml(s) {
            let _ = RoutingEngine::from_document(&document, RoutingPolicy::default());
        }
    }
});
