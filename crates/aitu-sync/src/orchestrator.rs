use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use aitu_api::{ApiError, ChatApi};
use aitu_gateway::{ConnectionManager, ConnectionState, Connector, Inbound, LinkEvent};
use aitu_types::events::ClientFrame;
use aitu_types::models::{Conversation, ConversationId, Message, User};

use crate::cache::MessageHistoryCache;
use crate::handle::Command;
use crate::session::ConversationSession;
use crate::store::ConversationStore;
use crate::view::ChatView;

/// Most queued events applied before the view is published again.
const MAX_BATCH: usize = 256;

/// A completed REST request, delivered back to the engine loop.
#[derive(Debug)]
pub enum Fetched {
    CurrentUser(Result<User, ApiError>),
    Conversations(Result<Vec<Conversation>, ApiError>),
    History {
        conversation_id: ConversationId,
        result: Result<Vec<Message>, ApiError>,
    },
    Users(Result<Vec<User>, ApiError>),
    DirectConversation {
        other: User,
        result: Result<ConversationId, ApiError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    EmptyText,
    NoActiveConversation,
    NotConnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Rejected(SendRejection),
}

/// Merges REST snapshots and live pushes into one view.
///
/// All state is owned here and mutated only from the event loop, one event
/// at a time: fetch completions, socket and timer events, and presentation
/// commands never interleave.
pub struct SyncOrchestrator<A: ChatApi, C: Connector> {
    api: Arc<A>,
    connection: ConnectionManager<C>,
    link_events: mpsc::UnboundedReceiver<LinkEvent>,
    fetch_tx: mpsc::UnboundedSender<Fetched>,
    fetch_rx: mpsc::UnboundedReceiver<Fetched>,
    store: ConversationStore,
    cache: MessageHistoryCache,
    session: ConversationSession,
    current_user: Option<User>,
    candidates: Vec<User>,
    new_chat_open: bool,
    compose: String,
    loading: bool,
    closed: bool,
    view_tx: watch::Sender<ChatView>,
}

impl<A: ChatApi, C: Connector> SyncOrchestrator<A, C> {
    pub fn new(api: Arc<A>, connector: C, socket_url: url::Url) -> Self {
        let (connection, link_events) = ConnectionManager::new(connector, socket_url);
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let (view_tx, _) = watch::channel(ChatView::default());

        Self {
            api,
            connection,
            link_events,
            fetch_tx,
            fetch_rx,
            store: ConversationStore::new(),
            cache: MessageHistoryCache::new(),
            session: ConversationSession::new(),
            current_user: None,
            candidates: Vec::new(),
            new_chat_open: false,
            compose: String::new(),
            loading: false,
            closed: false,
            view_tx,
        }
    }

    // -- Accessors --

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn cache(&self) -> &MessageHistoryCache {
        &self.cache
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn compose(&self) -> &str {
        &self.compose
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatView> {
        self.view_tx.subscribe()
    }

    pub fn view(&self) -> ChatView {
        let active = self.session.active().cloned();
        let (messages, history_generation) = active
            .as_ref()
            .map(|c| (self.cache.messages(&c.id).to_vec(), self.cache.generation(&c.id)))
            .unwrap_or_default();

        ChatView {
            current_user: self.current_user.clone(),
            conversations: self.store.list().to_vec(),
            active,
            messages,
            history_generation,
            compose: self.compose.clone(),
            candidates: self.candidates.clone(),
            new_chat_open: self.new_chat_open,
            connected: self.connection.is_connected(),
            loading: self.loading,
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }

    // -- Operations --

    /// Load the signed-in user; conversations and the socket follow once it
    /// resolves.
    pub fn start(&mut self) {
        self.loading = true;
        let api = self.api.clone();
        self.spawn_fetch(async move { Fetched::CurrentUser(api.current_user().await) });
    }

    /// Open the live connection directly, without waiting for bootstrap.
    pub fn connect(&mut self) {
        self.connection.connect();
    }

    pub fn refresh_conversations(&mut self) {
        let api = self.api.clone();
        self.spawn_fetch(async move { Fetched::Conversations(api.conversations().await) });
    }

    /// Activate `conversation`: request its history and, if connected, join
    /// it right away. The join does not wait for the history to arrive.
    pub fn select_conversation(&mut self, conversation: Conversation) {
        let conversation_id = self.session.select(conversation);

        let api = self.api.clone();
        let fetch_id = conversation_id.clone();
        self.spawn_fetch(async move {
            let result = api.messages(&fetch_id).await;
            Fetched::History {
                conversation_id: fetch_id,
                result,
            }
        });

        self.session.join_active(&self.connection);
    }

    pub fn set_compose(&mut self, text: impl Into<String>) {
        self.compose = text.into();
    }

    /// Send the compose text to the active conversation.
    ///
    /// Nothing is inserted locally: the message shows up when the server
    /// echoes it back. The compose text is cleared as soon as the frame is
    /// handed to the connection.
    pub fn send_message(&mut self) -> SendOutcome {
        let content = self.compose.trim();
        if content.is_empty() {
            return SendOutcome::Rejected(SendRejection::EmptyText);
        }
        let Some(conversation_id) = self.session.active_id() else {
            return SendOutcome::Rejected(SendRejection::NoActiveConversation);
        };
        if !self.connection.is_connected() {
            debug!("Send refused while {:?}", self.connection.state());
            return SendOutcome::Rejected(SendRejection::NotConnected);
        }

        let frame = ClientFrame::Message {
            conversation_id: conversation_id.clone(),
            content: content.to_string(),
        };
        self.connection.send(&frame);
        self.compose.clear();
        SendOutcome::Sent
    }

    /// Load candidate users for the "new chat" picker.
    pub fn open_new_chat(&mut self) {
        let api = self.api.clone();
        self.spawn_fetch(async move { Fetched::Users(api.users().await) });
    }

    pub fn close_new_chat(&mut self) {
        self.new_chat_open = false;
    }

    /// Get or create the direct conversation with `other`, then select it.
    pub fn start_chat(&mut self, other: User) {
        let api = self.api.clone();
        self.spawn_fetch(async move {
            let result = api.direct_conversation(&other.id).await;
            Fetched::DirectConversation { other, result }
        });
    }

    /// Release the connection and any pending reconnect. Final: socket events
    /// and fetch results that arrive afterwards are discarded.
    pub fn shutdown(&mut self) {
        self.closed = true;
        self.connection.shutdown();
        self.publish();
    }

    // -- Event loop --

    fn spawn_fetch<F>(&self, fetch: F)
    where
        F: Future<Output = Fetched> + Send + 'static,
    {
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(fetch.await);
        });
    }

    pub fn handle_link_event(&mut self, event: LinkEvent) {
        if self.closed {
            return;
        }
        match self.connection.handle_event(event) {
            Some(Inbound::Opened) => {
                // Joins are lost across reconnects; restore the active one.
                self.session.join_active(&self.connection);
            }
            Some(Inbound::Message(message)) => self.apply_push(message),
            None => {}
        }
    }

    /// Pushes land in the conversation they name, in arrival order.
    fn apply_push(&mut self, message: Message) {
        if !self.session.is_active(&message.conversation_id) {
            debug!(
                "Push for background conversation {}, caching only",
                message.conversation_id
            );
        }
        self.cache.append(message);
    }

    pub fn apply_fetch(&mut self, fetched: Fetched) {
        if self.closed {
            debug!("Discarding {:?} after shutdown", fetched);
            return;
        }
        match fetched {
            Fetched::CurrentUser(Ok(user)) => {
                info!("Signed in as {} ({})", user.display_name(), user.id);
                self.current_user = Some(user);
                self.refresh_conversations();
                self.connection.connect();
            }
            Fetched::CurrentUser(Err(e)) => {
                warn!("Failed to load current user: {}", e);
                self.loading = false;
            }

            Fetched::Conversations(result) => {
                self.loading = false;
                match result {
                    Ok(list) => {
                        debug!("Loaded {} conversations", list.len());
                        self.store.replace_all(list);
                    }
                    Err(e) => {
                        warn!("Failed to load conversations: {}", e);
                        self.store.replace_all(Vec::new());
                    }
                }
            }

            // Applied to the conversation it was requested for, whatever is
            // active now, and regardless of pushes received meanwhile.
            Fetched::History {
                conversation_id,
                result,
            } => match result {
                Ok(messages) => {
                    debug!("Loaded {} messages for {}", messages.len(), conversation_id);
                    self.cache.replace(conversation_id, messages);
                }
                Err(e) => {
                    warn!("Failed to load messages for {}: {}", conversation_id, e);
                    self.cache.replace(conversation_id, Vec::new());
                }
            },

            Fetched::Users(Ok(users)) => {
                self.candidates = users;
                self.new_chat_open = true;
            }
            Fetched::Users(Err(e)) => {
                warn!("Failed to load users: {}", e);
                self.candidates.clear();
            }

            Fetched::DirectConversation { other, result } => match result {
                Ok(conversation_id) => {
                    self.new_chat_open = false;
                    let conversation = Conversation::direct_with(conversation_id, &other);
                    self.store.insert(conversation.clone());
                    self.refresh_conversations();
                    self.select_conversation(conversation);
                }
                Err(e) => {
                    warn!("Failed to start chat with {}: {}", other.id, e);
                }
            },
        }
    }

    /// Apply events that are already queued, up to one batch, so a burst of
    /// pushes costs a single publish.
    fn drain_ready(&mut self) {
        for _ in 0..MAX_BATCH {
            if let Ok(event) = self.link_events.try_recv() {
                self.handle_link_event(event);
            } else if let Ok(fetched) = self.fetch_rx.try_recv() {
                self.apply_fetch(fetched);
            } else {
                break;
            }
        }
    }

    /// Wait for the next socket, timer, or fetch event, apply it along with
    /// anything else already queued, then publish.
    pub async fn step(&mut self) {
        tokio::select! {
            biased;
            Some(event) = self.link_events.recv() => self.handle_link_event(event),
            Some(fetched) = self.fetch_rx.recv() => self.apply_fetch(fetched),
            else => {}
        }
        self.drain_ready();
        self.publish();
    }

    pub fn handle_command(&mut self, command: Command) {
        match command {
            Command::SelectConversation(conversation) => self.select_conversation(conversation),
            Command::SetCompose(text) => self.set_compose(text),
            Command::SendMessage { reply } => {
                let outcome = self.send_message();
                // Callers awaiting the reply see the cleared compose text
                self.publish();
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            Command::OpenNewChat => self.open_new_chat(),
            Command::CloseNewChat => self.close_new_chat(),
            Command::StartChat(user) => self.start_chat(user),
            Command::RefreshConversations => self.refresh_conversations(),
            Command::Shutdown => self.shutdown(),
        }
    }

    /// Drive the engine until `Shutdown` arrives or every handle is dropped.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.publish();

        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.link_events.recv() => self.handle_link_event(event),
                Some(fetched) = self.fetch_rx.recv() => self.apply_fetch(fetched),
            }
            self.drain_ready();
            self.publish();
        }

        self.shutdown();
        info!("Sync engine stopped");
    }
}
