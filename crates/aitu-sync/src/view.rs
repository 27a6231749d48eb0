use aitu_types::models::{Conversation, Message, User};

/// Everything presentation code renders, as one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatView {
    pub current_user: Option<User>,
    pub conversations: Vec<Conversation>,
    pub active: Option<Conversation>,
    /// Transcript of the active conversation.
    pub messages: Vec<Message>,
    /// Changes whenever a fetch replaces the active transcript outright.
    pub history_generation: u64,
    pub compose: String,
    /// Users offered by the "new chat" picker.
    pub candidates: Vec<User>,
    pub new_chat_open: bool,
    pub connected: bool,
    /// True until the first conversation list fetch resolves.
    pub loading: bool,
}

impl ChatView {
    /// Whether the send control should be enabled.
    pub fn can_send(&self) -> bool {
        self.connected && self.active.is_some() && !self.compose.trim().is_empty()
    }

    pub fn is_mine(&self, message: &Message) -> bool {
        self.current_user
            .as_ref()
            .is_some_and(|u| message.is_from(&u.id))
    }
}
