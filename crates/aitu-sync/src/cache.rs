use std::collections::HashMap;

use aitu_types::models::{ConversationId, Message};

/// Per-conversation transcripts.
///
/// A list only grows between bulk fetches; a fetch replaces it outright.
/// Order is arrival order, never re-sorted by timestamp, and nothing is
/// deduplicated.
#[derive(Debug, Default)]
pub struct MessageHistoryCache {
    lists: HashMap<ConversationId, Vec<Message>>,
    /// Bumped on every `replace`, so readers can tell a refetched list from
    /// one that only grew.
    generations: HashMap<ConversationId, u64>,
}

impl MessageHistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, conversation_id: ConversationId, messages: Vec<Message>) {
        *self.generations.entry(conversation_id.clone()).or_default() += 1;
        self.lists.insert(conversation_id, messages);
    }

    /// Append to the list of the conversation the message belongs to.
    pub fn append(&mut self, message: Message) {
        self.lists
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message);
    }

    pub fn messages(&self, conversation_id: &ConversationId) -> &[Message] {
        self.lists
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self, conversation_id: &ConversationId) -> usize {
        self.messages(conversation_id).len()
    }

    /// Number of times the list has been replaced outright. Appends leave it
    /// unchanged.
    pub fn generation(&self, conversation_id: &ConversationId) -> u64 {
        self.generations.get(conversation_id).copied().unwrap_or(0)
    }
}
