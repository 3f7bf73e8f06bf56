//! In-memory conversation state, one record per admin.

use dashmap::DashMap;

use crate::course::draft::Conversation;

/// Per-admin conversations, keyed by Telegram user id.
///
/// Entries are cloned out and written back whole; no map guard is held across
/// an `.await`.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: DashMap<i64, Conversation>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, admin_id: i64) -> Option<Conversation> {
        self.conversations.get(&admin_id).map(|entry| entry.value().clone())
    }

    /// Replaces whatever the admin had in flight.
    pub fn set(&self, admin_id: i64, conversation: Conversation) {
        self.conversations.insert(admin_id, conversation);
    }

    /// Returns the removed conversation, if any.
    pub fn clear(&self, admin_id: i64) -> Option<Conversation> {
        self.conversations.remove(&admin_id).map(|(_, conversation)| conversation)
    }

    pub fn contains(&self, admin_id: i64) -> bool {
        self.conversations.contains_key(&admin_id)
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
