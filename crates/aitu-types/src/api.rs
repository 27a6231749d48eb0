use serde::{Deserialize, Serialize};

use crate::models::ConversationId;

// -- Auth --

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `{"status": "ok"}` on success, `{"error": "..."}` otherwise.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// -- Chat --

#[derive(Debug, Deserialize)]
pub struct ConversationIdResponse {
    pub conversation_id: ConversationId,
}

/// Body the server returns alongside a non-2xx status.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
