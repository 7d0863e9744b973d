//! `gossip`: an event-driven connector over UDP.
//!
//! # Architecture
//!
//! ```text
//!   send / send_to                                   handlers
//!        │                                               ▲
//!  ┌─────▼─────┐    datagrams     ┌──────────┐      ┌────┴───────┐
//!  │  Sender   │───────┐ ┌───────▶│ Receiver │─────▶│ Dispatcher │
//!  └─────┬─────┘       │ │        └────┬─────┘      └────────────┘
//!        │         ┌───▼─┴───┐         │
//!        │         │ Socket  │         │  faults
//!        │         └─────────┘         │
//!        └──────────▶ error stream ◀───┘
//! ```
//!
//! A [`Conn`] either listens on a local port (any peer may talk to it) or
//! dials one fixed peer.  Connecting spawns three tasks: the sender drains
//! the outbound queue onto the socket, the receiver turns datagrams into
//! [`Packet`]s, and the dispatcher launches every registered
//! [`EventHandler`] for each packet.  Runtime faults arrive on an
//! [`ErrorStream`]; I/O faults are fatal and disconnect automatically.
//!
//! Modules:
//! - [`packet`]: message and packet model
//! - [`connection`]: lifecycle and public API
//! - [`state`]: lifecycle states
//! - `sender`: outbound worker
//! - `receiver`: inbound worker
//! - `dispatcher`: handler fan-out worker
//! - [`handler`]: handler trait and registry
//! - [`error`]: error kinds and error stream
//! - [`config`]: queue bounds
//! - [`socket`]: async UDP socket abstraction
//!
//! ```ignore
//! let conn = Conn::new();
//! conn.add_handler(|conn: Conn, packet: Arc<Packet>| async move {
//!     if let Some(src) = packet.addr {
//!         let _ = conn.send_to(b"pong", src).await;
//!     }
//! });
//! conn.listen(9999).await?;
//! ```

pub mod config;
pub mod connection;
mod dispatcher;
pub mod error;
pub mod handler;
pub mod packet;
mod receiver;
mod sender;
pub mod socket;
pub mod state;

pub use config::ConnConfig;
pub use connection::Conn;
pub use error::{ConnError, ErrorStream};
pub use handler::{EventHandler, HandlerFuture};
pub use packet::{Message, Packet, MESSAGE_SIZE};
pub use socket::resolve;
pub use state::ConnectionState;
