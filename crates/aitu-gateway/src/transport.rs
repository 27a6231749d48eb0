//! Socket plumbing beneath [`ConnectionManager`](crate::connection::ConnectionManager).
//!
//! A [`Connector`] opens one [`Link`] per connection attempt. The link's
//! task reports everything that happens to it as [`LinkEvent`]s tagged with
//! its [`ConnectionId`], so the manager can tell a live link's events from a
//! replaced one's.

use std::fmt;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::COOKIE};
use tracing::{debug, info, warn};
use url::Url;

use aitu_api::Session;
#[cfg(any(test, feature = "test-support"))]
use aitu_types::events::ClientFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a single link, in the order a socket reports it.
/// A failed handshake reports `Error` then `Closed`, never `Opened`.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Opened,
    Data(String),
    Error(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Socket {
        connection: ConnectionId,
        event: SocketEvent,
    },
    /// A scheduled reconnect attempt is due.
    ReconnectDue { timer: u64 },
}

pub type LinkEventSender = mpsc::UnboundedSender<LinkEvent>;

/// One open (or opening) connection. Dropping it tears the socket down.
pub struct Link {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<String>,
    task: Option<AbortHandle>,
}

impl Link {
    pub fn new(
        id: ConnectionId,
        outbound: mpsc::UnboundedSender<String>,
        task: Option<AbortHandle>,
    ) -> Self {
        Self { id, outbound, task }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a text frame for the socket writer. False once the writer is gone.
    pub fn send_text(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    pub fn close(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.abort();
    }
}

pub trait Connector: Send + 'static {
    /// Begin opening a connection to `url`. Must not block: progress is
    /// reported later through `events`.
    fn open(&self, id: ConnectionId, url: &Url, events: LinkEventSender) -> Link;
}

// -- WebSocket --

/// Opens real WebSocket connections, carrying the session cookie on the
/// upgrade request.
#[derive(Clone)]
pub struct WsConnector {
    session: Session,
}

impl WsConnector {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

impl Connector for WsConnector {
    fn open(&self, id: ConnectionId, url: &Url, events: LinkEventSender) -> Link {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cookie = self.session.cookie_header();
        let url = url.clone();

        let task = tokio::spawn(run_socket(id, url, cookie, events, outbound_rx));
        Link::new(id, outbound_tx, Some(task.abort_handle()))
    }
}

fn build_request(url: &Url, cookie: Option<&str>) -> Result<Request> {
    let mut request = url.as_str().into_client_request()?;
    if let Some(cookie) = cookie {
        request
            .headers_mut()
            .insert(COOKIE, HeaderValue::from_str(cookie)?);
    }
    Ok(request)
}

async fn run_socket(
    id: ConnectionId,
    url: Url,
    cookie: Option<String>,
    events: LinkEventSender,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let report = |event: SocketEvent| {
        let _ = events.send(LinkEvent::Socket {
            connection: id,
            event,
        });
    };

    let request = match build_request(&url, cookie.as_deref()) {
        Ok(request) => request,
        Err(e) => {
            report(SocketEvent::Error(e.to_string()));
            report(SocketEvent::Closed);
            return;
        }
    };

    let stream = match tokio_tungstenite::connect_async(request).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!("Chat socket {} connect failed: {}", id, e);
            report(SocketEvent::Error(e.to_string()));
            report(SocketEvent::Closed);
            return;
        }
    };

    info!("Chat socket {} open to {}", id, url);
    report(SocketEvent::Opened);

    let (mut sink, mut stream) = stream.split();

    loop {
        tokio::select! {
            text = outbound.recv() => {
                let Some(text) = text else {
                    // Link dropped by its owner
                    let _ = sink.close().await;
                    break;
                };
                if let Err(e) = sink.send(Message::text(text)).await {
                    report(SocketEvent::Error(e.to_string()));
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        report(SocketEvent::Data(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Chat socket {} closed by server: {:?}", id, frame);
                        break;
                    }
                    // Ping/pong are answered by tungstenite; binary frames carry nothing for us
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        report(SocketEvent::Error(e.to_string()));
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    report(SocketEvent::Closed);
}

// -- In-process --

/// Connector that opens no sockets. Each link is handed to the caller as an
/// [`OpenedLink`], which plays the server side: it sees every frame the
/// client writes and can inject socket events back.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone)]
pub struct ChannelConnector {
    opened: mpsc::UnboundedSender<OpenedLink>,
}

#[cfg(any(test, feature = "test-support"))]
impl ChannelConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OpenedLink>) {
        let (opened, rx) = mpsc::unbounded_channel();
        (Self { opened }, rx)
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Connector for ChannelConnector {
    fn open(&self, id: ConnectionId, url: &Url, events: LinkEventSender) -> Link {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let _ = self.opened.send(OpenedLink {
            id,
            url: url.clone(),
            outbound: outbound_rx,
            events,
        });
        Link::new(id, outbound_tx, None)
    }
}

/// Server side of a [`ChannelConnector`] link.
#[cfg(any(test, feature = "test-support"))]
pub struct OpenedLink {
    pub id: ConnectionId,
    pub url: Url,
    outbound: mpsc::UnboundedReceiver<String>,
    events: LinkEventSender,
}

#[cfg(any(test, feature = "test-support"))]
impl OpenedLink {
    pub fn event(&self, event: SocketEvent) {
        let _ = self.events.send(LinkEvent::Socket {
            connection: self.id,
            event,
        });
    }

    pub fn accept(&self) {
        self.event(SocketEvent::Opened);
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.event(SocketEvent::Data(text.into()));
    }

    /// Push `message` as a `message` frame, in the shape the server sends.
    pub fn push(&self, message: &aitu_types::models::Message) {
        let mut value = serde_json::to_value(message).expect("message serializes to JSON");
        if let Some(obj) = value.as_object_mut() {
            obj.insert("type".into(), "message".into());
        }
        self.push_text(value.to_string());
    }

    /// Error followed by close, the way a dropped socket reports it.
    pub fn drop_connection(&self) {
        self.event(SocketEvent::Error("connection reset".into()));
        self.event(SocketEvent::Closed);
    }

    /// Every frame the client has written so far. Unparseable text is skipped.
    pub fn written(&mut self) -> Vec<ClientFrame> {
        let mut frames = Vec::new();
        while let Ok(text) = self.outbound.try_recv() {
            if let Ok(frame) = serde_json::from_str(&text) {
                frames.push(frame);
            }
        }
        frames
    }
}
