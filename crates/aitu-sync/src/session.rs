use tracing::{debug, info};

use aitu_gateway::{ConnectionManager, Connector};
use aitu_types::events::ClientFrame;
use aitu_types::models::{Conversation, ConversationId};

/// The single "currently active conversation" and its join semantics.
///
/// Joins are additive: selecting a new conversation never sends a leave for
/// the previous one, so the server may keep pushing for conversations that
/// are no longer shown.
#[derive(Debug, Default)]
pub struct ConversationSession {
    active: Option<Conversation>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_ref()
    }

    pub fn active_id(&self) -> Option<&ConversationId> {
        self.active.as_ref().map(|c| &c.id)
    }

    pub fn is_active(&self, id: &ConversationId) -> bool {
        self.active_id() == Some(id)
    }

    /// Make `conversation` the active one. Returns the id whose history the
    /// caller must now fetch.
    pub fn select(&mut self, conversation: Conversation) -> ConversationId {
        info!("Selecting conversation {} ({})", conversation.id, conversation.display_name());
        let id = conversation.id.clone();
        self.active = Some(conversation);
        id
    }

    /// Send a join for the active conversation if the connection is up.
    /// Used right after `select` and again after every (re)connect, since
    /// joins don't survive a reconnect.
    pub fn join_active<C: Connector>(&self, connection: &ConnectionManager<C>) -> bool {
        let Some(conversation_id) = self.active_id() else {
            return false;
        };
        if !connection.is_connected() {
            debug!("Not connected, join for {} deferred to next open", conversation_id);
            return false;
        }

        connection.send(&ClientFrame::Join {
            conversation_id: conversation_id.clone(),
        })
    }
}
