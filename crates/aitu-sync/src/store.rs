use tracing::warn;

use aitu_types::models::{Conversation, ConversationId};

/// Known conversations in server order, unique by id.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list with a fresh fetch. Repeated ids keep their
    /// first occurrence.
    pub fn replace_all(&mut self, conversations: Vec<Conversation>) {
        self.conversations.clear();
        for conv in conversations {
            if self.contains(&conv.id) {
                warn!("Duplicate conversation {} in list response, skipping", conv.id);
                continue;
            }
            self.conversations.push(conv);
        }
    }

    /// Add a conversation discovered outside a list fetch. Returns false if
    /// the id is already known; the stored entry is left as is.
    pub fn insert(&mut self, conversation: Conversation) -> bool {
        if self.contains(&conversation.id) {
            return false;
        }
        self.conversations.push(conversation);
        true
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.get(id).is_some()
    }

    pub fn list(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
