use serde::{Deserialize, Serialize};

use crate::models::{ConversationId, Message};

/// Frames sent FROM client TO server over the chat socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Start receiving pushes for a conversation. There is no matching leave.
    Join { conversation_id: ConversationId },

    /// Post a message; the server echoes it back to every joined client.
    Message {
        conversation_id: ConversationId,
        content: String,
    },
}

impl ClientFrame {
    pub fn conversation_id(&self) -> &ConversationId {
        match self {
            Self::Join { conversation_id } | Self::Message { conversation_id, .. } => {
                conversation_id
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Frames pushed FROM server TO client.
///
/// Only `message` carries data the client acts on. Any other `type` decodes
/// as `Unrecognized` so newer servers don't break older clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Message(Message),

    #[serde(other)]
    Unrecognized,
}

impl ServerFrame {
    /// Validate a raw text frame. Non-JSON input, a missing `type`, or a
    /// `message` frame with missing fields are all errors.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
