use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use url::Url;

use aitu_api::ChatApi;
use aitu_gateway::Connector;
use aitu_types::models::{Conversation, User};

use crate::orchestrator::{SendOutcome, SyncOrchestrator};
use crate::view::ChatView;

/// Presentation requests, applied by the engine in the order sent.
#[derive(Debug)]
pub enum Command {
    SelectConversation(Conversation),
    SetCompose(String),
    SendMessage {
        reply: Option<oneshot::Sender<SendOutcome>>,
    },
    OpenNewChat,
    CloseNewChat,
    StartChat(User),
    RefreshConversations,
    Shutdown,
}

/// Cloneable front door to a running engine.
#[derive(Clone)]
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<ChatView>,
}

impl SyncHandle {
    fn command(&self, command: Command) {
        // Engine already gone; nothing left to drive.
        let _ = self.commands.send(command);
    }

    pub fn select_conversation(&self, conversation: Conversation) {
        self.command(Command::SelectConversation(conversation));
    }

    pub fn set_compose(&self, text: impl Into<String>) {
        self.command(Command::SetCompose(text.into()));
    }

    /// Send the current compose text and wait for the engine's verdict.
    /// Returns `None` if the engine stopped first.
    pub async fn send_message(&self) -> Option<SendOutcome> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::SendMessage { reply: Some(reply) });
        rx.await.ok()
    }

    /// Replace the compose text and send it.
    pub async fn submit(&self, text: impl Into<String>) -> Option<SendOutcome> {
        self.set_compose(text);
        self.send_message().await
    }

    pub fn open_new_chat(&self) {
        self.command(Command::OpenNewChat);
    }

    pub fn close_new_chat(&self) {
        self.command(Command::CloseNewChat);
    }

    pub fn start_chat(&self, other: User) {
        self.command(Command::StartChat(other));
    }

    pub fn refresh_conversations(&self) {
        self.command(Command::RefreshConversations);
    }

    pub fn shutdown(&self) {
        self.command(Command::Shutdown);
    }

    /// Latest published snapshot.
    pub fn view(&self) -> ChatView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatView> {
        self.view.clone()
    }
}

/// Start an engine on the current runtime and begin bootstrapping.
pub fn spawn<A, C>(api: Arc<A>, connector: C, socket_url: Url) -> (SyncHandle, JoinHandle<()>)
where
    A: ChatApi,
    C: Connector,
{
    let (commands, rx) = mpsc::unbounded_channel();
    let mut orchestrator = SyncOrchestrator::new(api, connector, socket_url);
    let view = orchestrator.subscribe();

    orchestrator.start();
    let task = tokio::spawn(orchestrator.run(rx));

    (SyncHandle { commands, view }, task)
}
