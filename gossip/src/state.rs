//! Connection lifecycle states.
//!
//! ```text
//!                  listen(port)
//!   DISCONNECTED ───────────────▶ LISTENING
//!        │  ▲                         │
//!        │  └──── disconnect / fault ─┤
//!        │                            │
//!        └──────▶ DIALED ─────────────┘
//!     dial(addr)
//! ```
//!
//! `listen` and `dial` are only legal from `Disconnected`.  Every other
//! state returns to `Disconnected` on `disconnect` or on a fatal I/O fault.

use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket; initial state.
    #[default]
    Disconnected,
    /// Bound to `local`, accepting datagrams from any source.
    Listening { local: SocketAddr },
    /// Bound to `local` and connected to the single peer `peer`.
    Dialed { local: SocketAddr, peer: SocketAddr },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match *self {
            Self::Disconnected => None,
            Self::Listening { local } | Self::Dialed { local, .. } => Some(local),
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match *self {
            Self::Dialed { peer, .. } => Some(peer),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Listening { local } => write!(f, "listening on {local}"),
            Self::Dialed { local, peer } => write!(f, "dialed {peer} from {local}"),
        }
    }
}
