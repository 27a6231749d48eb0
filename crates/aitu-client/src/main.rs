mod config;
mod console;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use aitu_api::{ApiClient, Session};
use aitu_gateway::{WsConnector, chat_socket_url};
use aitu_sync::{SendOutcome, SendRejection, SyncHandle};

use config::ClientConfig;
use console::{Input, Renderer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aitu=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env()?;

    // Session + REST client
    let session = match &config.session_id {
        Some(sid) => Session::with_session_id(config.base_url.clone(), sid),
        None => Session::new(config.base_url.clone()),
    };
    let api = ApiClient::new(session.clone())?;

    if !session.is_signed_in() {
        match config.credentials() {
            Some((email, password)) => api.sign_in(email, password).await?,
            None => warn!("No AITU_SESSION or AITU_EMAIL/AITU_PASSWORD set, requests will be unauthenticated"),
        }
    }

    // Sync engine
    let socket_url = chat_socket_url(&config.base_url)?;
    info!("Chat server {} (socket {})", config.base_url, socket_url);
    let api = Arc::new(api);
    let (handle, engine) = aitu_sync::spawn(api.clone(), WsConnector::new(session), socket_url);

    let printer = tokio::spawn(print_updates(handle.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !dispatch(&handle, console::parse(&line)).await {
            break;
        }
    }

    handle.shutdown();
    engine.await?;
    printer.abort();

    if config.session_id.is_none() && config.credentials().is_some() {
        if let Err(e) = api.sign_out().await {
            warn!("Sign-out failed: {}", e);
        }
    }

    Ok(())
}

/// Apply one line of input. Returns false when the user asked to quit.
async fn dispatch(handle: &SyncHandle, input: Input) -> bool {
    let view = handle.view();

    match input {
        Input::Quit => return false,
        Input::Empty => {}
        Input::Usage(usage) => println!("usage: {usage}"),
        Input::List => {
            for line in console::conversation_lines(&view) {
                println!("{line}");
            }
        }
        Input::Refresh => handle.refresh_conversations(),
        Input::Users => handle.open_new_chat(),
        Input::Open(n) => match view.conversations.get(n - 1) {
            Some(conv) => handle.select_conversation(conv.clone()),
            None => println!("no conversation {n}, /list to see them"),
        },
        Input::Start(n) => match view.candidates.get(n - 1) {
            Some(user) => handle.start_chat(user.clone()),
            None => println!("no user {n}, /users to see them"),
        },
        Input::Say(text) => match handle.submit(text).await {
            Some(SendOutcome::Sent) | None => {}
            Some(SendOutcome::Rejected(SendRejection::NoActiveConversation)) => {
                println!("(open a conversation first)");
            }
            Some(SendOutcome::Rejected(SendRejection::NotConnected)) => {
                println!("(offline, message not sent)");
            }
            Some(SendOutcome::Rejected(SendRejection::EmptyText)) => {}
        },
    }

    true
}

async fn print_updates(handle: SyncHandle) {
    let mut views = handle.subscribe();
    let mut renderer = Renderer::new();

    loop {
        let view = views.borrow_and_update().clone();
        for line in renderer.render(&view) {
            println!("{line}");
        }
        if views.changed().await.is_err() {
            break;
        }
    }
}
