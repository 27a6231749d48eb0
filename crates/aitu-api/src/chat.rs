use std::future::Future;

use aitu_types::api::ConversationIdResponse;
use aitu_types::models::{Conversation, ConversationId, Message, User, UserId};

use crate::client::ApiClient;
use crate::error::ApiError;

/// The request/response side of chat: everything the sync engine fetches
/// over REST.
///
/// Lists come back in server order. A `null` body is treated as empty.
pub trait ChatApi: Send + Sync + 'static {
    fn current_user(&self) -> impl Future<Output = Result<User, ApiError>> + Send;

    fn conversations(&self) -> impl Future<Output = Result<Vec<Conversation>, ApiError>> + Send;

    fn messages(
        &self,
        conversation_id: &ConversationId,
    ) -> impl Future<Output = Result<Vec<Message>, ApiError>> + Send;

    fn users(&self) -> impl Future<Output = Result<Vec<User>, ApiError>> + Send;

    /// Find the direct conversation with `other_user_id`, creating it if absent.
    fn direct_conversation(
        &self,
        other_user_id: &UserId,
    ) -> impl Future<Output = Result<ConversationId, ApiError>> + Send;
}

impl ChatApi for ApiClient {
    async fn current_user(&self) -> Result<User, ApiError> {
        self.get_json("/api/me", &[]).await
    }

    async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let list: Option<Vec<Conversation>> = self.get_json("/api/chat/conversations", &[]).await?;
        Ok(list.unwrap_or_default())
    }

    async fn messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, ApiError> {
        let list: Option<Vec<Message>> = self
            .get_json(
                "/api/chat/messages",
                &[("conversation_id", conversation_id.as_str())],
            )
            .await?;
        Ok(list.unwrap_or_default())
    }

    async fn users(&self) -> Result<Vec<User>, ApiError> {
        let list: Option<Vec<User>> = self.get_json("/api/chat/users", &[]).await?;
        Ok(list.unwrap_or_default())
    }

    async fn direct_conversation(&self, other_user_id: &UserId) -> Result<ConversationId, ApiError> {
        let resp: ConversationIdResponse = self
            .get_json(
                "/api/chat/conversation",
                &[("other_user_id", other_user_id.as_str())],
            )
            .await?;
        Ok(resp.conversation_id)
    }
}
