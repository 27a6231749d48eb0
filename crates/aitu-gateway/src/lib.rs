//! Client side of the chat socket: one managed connection with fixed-delay
//! reconnect, and the transports it runs over.

pub mod connection;
pub mod endpoint;
pub mod transport;

pub use connection::{ConnectionManager, ConnectionState, Inbound, RECONNECT_DELAY};
pub use endpoint::chat_socket_url;
pub use transport::{ConnectionId, Connector, LinkEvent, SocketEvent, WsConnector};
#[cfg(any(test, feature = "test-support"))]
pub use transport::{ChannelConnector, OpenedLink};
