//! Message routing: decides which specialized agent answers a message.
//!
//! Every agent's rule set is scored independently, then the emergency
//! override is checked. Otherwise the highest confidence wins, with ties
//! broken by [`AgentId`] priority. [`RoutingEngine`] is a pure, synchronous
//! value; [`RoutingEngineHandle`] shares it across tasks and swaps whole
//! snapshots on reload.

pub mod builtin;
pub mod engine;
pub mod language;
pub mod rules;
pub mod snapshot;
pub mod traits;

pub use engine::{route, AgentScore, RoutingEngine};
pub use rules::{
    AgentDefinition, AgentDefinitionDocument, KeywordGroup, KeywordGroupDocument, PatternDocument,
    PatternRule, RoutingPolicy, RuleSet, RuleSetDocument, RuleSetError,
};
pub use snapshot::RoutingEngineHandle;
pub use traits::{
    AgentId, Language, LanguageHint, Router, RoutingRequest, RoutingResult, UserContext,
};
