//! Conversation storage: supplies routing context and records routed turns.

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemoryConversationStore;
pub use traits::{Conversation, ConversationFilter, ConversationStore, Turn, UserProfile};

/// Create a default in-memory conversation store.
pub fn create_conversation_store() -> Box<dyn ConversationStore> {
    Box::new(InMemoryConversationStore::new())
}
