use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use url::Url;

use aitu_types::events::{ClientFrame, ServerFrame};
use aitu_types::models::Message;

use crate::transport::{ConnectionId, Connector, Link, LinkEvent, SocketEvent};

/// Fixed delay between an unexpected close and the next connection attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What the owner of the manager has to react to after an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The current link finished its handshake.
    Opened,
    /// A validated `message` push.
    Message(Message),
}

/// The one pending reconnect attempt, if any.
struct ReconnectTimer {
    id: u64,
    deadline: Instant,
    handle: AbortHandle,
}

/// Owns the single live connection to the chat socket.
///
/// All transitions happen through `connect`, `handle_event`, and `shutdown`.
/// Link and timer events come back on the receiver returned by [`new`]
/// and must be fed to [`handle_event`] by the owner's event loop.
///
/// [`new`]: ConnectionManager::new
/// [`handle_event`]: ConnectionManager::handle_event
pub struct ConnectionManager<C: Connector> {
    connector: C,
    url: Url,
    state: ConnectionState,
    link: Option<Link>,
    last_connection: u64,
    reconnect: Option<ReconnectTimer>,
    last_timer: u64,
    reconnect_delay: Duration,
    events_tx: mpsc::UnboundedSender<LinkEvent>,
    closed: bool,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, url: Url) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let manager = Self {
            connector,
            url,
            state: ConnectionState::Disconnected,
            link: None,
            last_connection: 0,
            reconnect: None,
            last_timer: 0,
            reconnect_delay: RECONNECT_DELAY,
            events_tx,
            closed: false,
        };
        (manager, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn current_connection(&self) -> Option<ConnectionId> {
        self.link.as_ref().map(Link::id)
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.reconnect.is_some()
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect.as_ref().map(|t| t.deadline)
    }

    /// True once [`shutdown`](Self::shutdown) has run. A closed manager never
    /// opens another link.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Open a fresh connection unless one is already opening or open.
    /// Any pending reconnect attempt is cancelled first.
    pub fn connect(&mut self) {
        self.cancel_reconnect();

        if self.closed {
            debug!("connect() after shutdown, ignoring");
            return;
        }

        if self.link.is_some() && self.state != ConnectionState::Disconnected {
            debug!("connect() while {:?}, keeping current link", self.state);
            return;
        }

        self.last_connection += 1;
        let id = ConnectionId(self.last_connection);
        info!("Connecting to {} (connection {})", self.url, id);

        // Replacing the link drops (and aborts) any half-dead predecessor.
        self.link = Some(self.connector.open(id, &self.url, self.events_tx.clone()));
        self.state = ConnectionState::Connecting;
    }

    /// Write a frame to the live connection. Does nothing unless Connected;
    /// frames are never buffered for later.
    pub fn send(&self, frame: &ClientFrame) -> bool {
        if self.state != ConnectionState::Connected {
            debug!("Dropping {:?} frame while {:?}", frame, self.state);
            return false;
        }
        let Some(link) = &self.link else {
            return false;
        };

        let text = match frame.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode frame: {}", e);
                return false;
            }
        };

        let sent = link.send_text(text);
        if !sent {
            debug!("Link {} writer gone, frame lost", link.id());
        }
        sent
    }

    pub fn handle_event(&mut self, event: LinkEvent) -> Option<Inbound> {
        match event {
            LinkEvent::ReconnectDue { timer } => {
                if self.reconnect.as_ref().is_some_and(|t| t.id == timer) {
                    self.reconnect = None;
                    self.connect();
                } else {
                    trace!("Ignoring cancelled reconnect timer {}", timer);
                }
                None
            }
            LinkEvent::Socket { connection, event } => {
                if self.current_connection() != Some(connection) {
                    trace!("Ignoring {:?} from replaced connection {}", event, connection);
                    return None;
                }
                self.handle_socket_event(connection, event)
            }
        }
    }

    fn handle_socket_event(&mut self, id: ConnectionId, event: SocketEvent) -> Option<Inbound> {
        match event {
            SocketEvent::Opened => {
                info!("Connection {} established", id);
                self.state = ConnectionState::Connected;
                Some(Inbound::Opened)
            }
            // An errored link may still flush buffered frames before it closes
            SocketEvent::Data(_) if self.state != ConnectionState::Connected => {
                trace!("Ignoring data on {} while {:?}", id, self.state);
                None
            }
            SocketEvent::Data(text) => match ServerFrame::parse(&text) {
                Ok(ServerFrame::Message(msg)) => Some(Inbound::Message(msg)),
                Ok(ServerFrame::Unrecognized) => {
                    trace!("Ignoring unrecognized frame on {}", id);
                    None
                }
                Err(e) => {
                    warn!(
                        "Bad frame on {}: {} -- raw: {}",
                        id,
                        e,
                        text.chars().take(200).collect::<String>()
                    );
                    None
                }
            },
            SocketEvent::Error(reason) => {
                warn!("Connection {} error: {}", id, reason);
                self.state = ConnectionState::Disconnected;
                None
            }
            SocketEvent::Closed => {
                info!("Connection {} closed", id);
                self.state = ConnectionState::Disconnected;
                self.link = None;
                if !self.closed {
                    self.schedule_reconnect();
                }
                None
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        self.cancel_reconnect();

        self.last_timer += 1;
        let id = self.last_timer;
        let delay = self.reconnect_delay;
        let events = self.events_tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(LinkEvent::ReconnectDue { timer: id });
        })
        .abort_handle();

        info!("Reconnecting in {}ms", delay.as_millis());
        self.reconnect = Some(ReconnectTimer {
            id,
            deadline: Instant::now() + delay,
            handle,
        });
    }

    pub fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect.take() {
            debug!("Cancelling reconnect timer {}", timer.id);
            timer.handle.abort();
        }
    }

    /// Release the connection and any pending timer together. Final: later
    /// `connect` calls and timer events are ignored.
    pub fn shutdown(&mut self) {
        self.closed = true;
        self.cancel_reconnect();
        if let Some(link) = self.link.take() {
            info!("Closing connection {}", link.id());
            link.close();
        }
        self.state = ConnectionState::Disconnected;
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
