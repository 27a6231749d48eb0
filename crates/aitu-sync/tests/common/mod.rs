#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::mpsc;
use url::Url;

use aitu_api::{ApiError, ChatApi};
use aitu_gateway::{ChannelConnector, OpenedLink};
use aitu_sync::SyncOrchestrator;
use aitu_types::models::{Conversation, ConversationId, Message, User, UserId};

/// Canned REST backend. `None` for a list means the endpoint fails.
#[derive(Default)]
pub struct FakeState {
    pub me: Option<User>,
    pub conversations: Option<Vec<Conversation>>,
    pub histories: HashMap<ConversationId, Vec<Message>>,
    pub failing_histories: Vec<ConversationId>,
    pub history_delays: HashMap<ConversationId, Duration>,
    pub users: Option<Vec<User>>,
    pub direct: HashMap<UserId, ConversationId>,
    pub history_requests: Vec<ConversationId>,
    pub conversation_requests: usize,
}

#[derive(Default)]
pub struct FakeApi {
    pub state: Mutex<FakeState>,
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "boom".into(),
    }
}

impl FakeApi {
    pub fn new() -> Self {
        let api = Self::default();
        {
            let mut state = api.state.lock().unwrap();
            state.me = Some(user("me", "Aida", "Nurlan"));
            state.conversations = Some(Vec::new());
            state.users = Some(Vec::new());
        }
        api
    }

    pub fn with(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn history_requests(&self) -> Vec<ConversationId> {
        self.state.lock().unwrap().history_requests.clone()
    }

    pub fn conversation_requests(&self) -> usize {
        self.state.lock().unwrap().conversation_requests
    }
}

impl ChatApi for FakeApi {
    async fn current_user(&self) -> Result<User, ApiError> {
        self.state.lock().unwrap().me.clone().ok_or_else(server_error)
    }

    async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.conversation_requests += 1;
        state.conversations.clone().ok_or_else(server_error)
    }

    async fn messages(&self, id: &ConversationId) -> Result<Vec<Message>, ApiError> {
        let (delay, result) = {
            let mut state = self.state.lock().unwrap();
            state.history_requests.push(id.clone());
            let result = if state.failing_histories.contains(id) {
                Err(server_error())
            } else {
                Ok(state.histories.get(id).cloned().unwrap_or_default())
            };
            (state.history_delays.get(id).copied(), result)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn users(&self) -> Result<Vec<User>, ApiError> {
        self.state.lock().unwrap().users.clone().ok_or_else(server_error)
    }

    async fn direct_conversation(&self, other: &UserId) -> Result<ConversationId, ApiError> {
        self.state
            .lock()
            .unwrap()
            .direct
            .get(other)
            .cloned()
            .ok_or_else(server_error)
    }
}

pub fn user(id: &str, first: &str, last: &str) -> User {
    User {
        id: id.into(),
        first_name: first.into(),
        last_name: last.into(),
        email: format!("{id}@astanait.edu.kz"),
        role: "student".into(),
        bio: None,
    }
}

pub fn direct(id: &str, other: &User) -> Conversation {
    Conversation::direct_with(id.into(), other)
}

pub fn group(id: &str, name: &str) -> Conversation {
    Conversation {
        id: id.into(),
        is_group: true,
        name: Some(name.into()),
        created_at: None,
        other_user_id: None,
        other_user_first_name: None,
        other_user_last_name: None,
        last_message: None,
        last_message_time: None,
    }
}

pub fn message(conversation: &str, from: &str, content: &str) -> Message {
    Message {
        id: None,
        conversation_id: conversation.into(),
        user_id: from.into(),
        author_first_name: "Dana".into(),
        author_last_name: "K".into(),
        content: content.into(),
        created_at: None,
    }
}

pub fn contents(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.content.as_str()).collect()
}

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub orch: SyncOrchestrator<FakeApi, ChannelConnector>,
    pub opened: mpsc::UnboundedReceiver<OpenedLink>,
}

impl Harness {
    pub fn new(api: FakeApi) -> Self {
        let api = Arc::new(api);
        let (connector, opened) = ChannelConnector::new();
        let url = Url::parse("ws://localhost:8080/api/chat/ws").unwrap();
        let orch = SyncOrchestrator::new(api.clone(), connector, url);
        Self { api, orch, opened }
    }

    /// Apply events until nothing more is ready.
    pub async fn settle(&mut self) {
        while tokio::time::timeout(Duration::from_millis(1), self.orch.step())
            .await
            .is_ok()
        {}
    }

    /// Run bootstrap and accept the socket it opens.
    pub async fn boot(&mut self) -> OpenedLink {
        self.orch.start();
        self.settle().await;
        let link = self.opened.recv().await.unwrap();
        link.accept();
        self.settle().await;
        assert!(self.orch.connection().is_connected());
        link
    }
}
