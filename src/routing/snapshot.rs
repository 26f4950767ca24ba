//! Shared, hot-swappable routing engine.

use parking_lot::RwLock;
use std::sync::Arc;

use super::engine::RoutingEngine;
use super::rules::{RoutingPolicy, RuleSetDocument, RuleSetError};
use super::traits::{Router, RoutingRequest, RoutingResult};

/// Holds the current engine snapshot behind an `Arc`.
///
/// Readers clone the `Arc` and route against that snapshot for the whole
/// call, so a concurrent [`replace`](Self::replace) is never observed halfway.
pub struct RoutingEngineHandle {
    current: RwLock<Arc<RoutingEngine>>,
}

impl RoutingEngineHandle {
    pub fn new(engine: RoutingEngine) -> Self {
        Self {
            current: RwLock::new(Arc::new(engine)),
        }
    }

    pub fn snapshot(&self) -> Arc<RoutingEngine> {
        Arc::clone(&*self.current.read())
    }

    /// Swap in a new engine, returning the one it replaced.
    pub fn replace(&self, engine: RoutingEngine) -> Arc<RoutingEngine> {
        let next = Arc::new(engine);
        let previous = std::mem::replace(&mut *self.current.write(), Arc::clone(&next));
        tracing::info!(
            previous = previous.version(),
            current = next.version(),
            "Routing rule set replaced"
        );
        previous
    }

    /// Compile `document` and swap it in. On error the current snapshot stays.
    pub fn reload_from(
        &self,
        document: &RuleSetDocument,
        policy: RoutingPolicy,
    ) -> Result<Arc<RoutingEngine>, RuleSetError> {
        match RoutingEngine::from_document(document, policy) {
            Ok(engine) => Ok(self.replace(engine)),
            Err(e) => {
                tracing::warn!(
                    current = self.snapshot().version(),
                    error = %e,
                    "Rejected rule set reload; keeping current snapshot"
                );
                Err(e)
            }
        }
    }
}

impl Router for RoutingEngineHandle {
    fn route(&self, request: &RoutingRequest) -> RoutingResult {
        self.snapshot().route(request)
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::rules::tests::fixture_document;
    use crate::routing::traits::AgentId;
    use std::thread;

    fn fixture_engine(version: &str) -> RoutingEngine {
        let mut doc = fixture_document();
        doc.version = version.into();
        RoutingEngine::from_document(&doc, RoutingPolicy::default()).unwrap()
    }

    #[test]
    fn replace_swaps_whole_snapshot() {
        let handle = RoutingEngineHandle::new(fixture_engine("v1"));
        let held = handle.snapshot();

        let previous = handle.replace(fixture_engine("v2"));
        assert_eq!(previous.version(), "v1");
        assert_eq!(held.version(), "v1");
        assert_eq!(handle.snapshot().version(), "v2");
        assert_eq!(handle.route(&RoutingRequest::new("x")).rule_set_version, "v2");
    }

    #[test]
    fn failed_reload_keeps_current_snapshot() {
        let handle = RoutingEngineHandle::new(fixture_engine("v1"));
        let mut broken = fixture_document();
        broken.version = "v2".into();
        broken.agents.pop();

        let err = handle
            .reload_from(&broken, RoutingPolicy::default())
            .unwrap_err();
        assert_eq!(err, RuleSetError::MissingAgent(AgentId::WellnessCoach));
        assert_eq!(handle.snapshot().version(), "v1");
    }

    #[test]
    fn concurrent_routing_during_reload_sees_consistent_versions() {
        let handle = Arc::new(RoutingEngineHandle::new(fixture_engine("v1")));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let handle = Arc::clone(&handle);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let result = handle.route(&RoutingRequest::new("fever"));
                        assert!(result.rule_set_version == "v1" || result.rule_set_version == "v2");
                        assert_eq!(result.selected_agent, AgentId::IllnessMonitor);
                    }
                })
            })
            .collect();

        for i in 0..50 {
            let version = if i % 2 == 0 { "v2" } else { "v1" };
            handle.replace(fixture_engine(version));
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
