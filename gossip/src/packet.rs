//! Message and packet model.
//!
//! A [`Message`] is an opaque datagram payload; a [`Packet`] tags it with a
//! peer address.  This library owns no header or framing: the bytes of a
//! [`Message`] are exactly the bytes of the UDP datagram on the wire.
//!
//! The only I/O here is address resolution in [`Packet::resolve`].

use std::net::SocketAddr;

use crate::error::ConnError;
use crate::socket;

/// Maximum payload size of a single datagram in bytes.
///
/// See RFC 1035 §4.2.1, the classic UDP DNS message limit.
pub const MESSAGE_SIZE: usize = 512;

/// Payload carried by one UDP datagram.
pub type Message = Vec<u8>;

/// A [`Message`] together with a peer address.
///
/// On inbound packets `addr` is the **source** and always present.  On
/// outbound packets it is the **destination**; `None` means "the peer fixed by
/// [`crate::Conn::dial`]".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub addr: Option<SocketAddr>,
    pub msg: Message,
}

impl Packet {
    /// Build an outbound packet addressed to `addr`.
    pub fn to(addr: SocketAddr, msg: impl Into<Message>) -> Self {
        Self {
            addr: Some(addr),
            msg: msg.into(),
        }
    }

    /// Build an outbound packet for the dialed peer.
    pub fn to_peer(msg: impl Into<Message>) -> Self {
        Self {
            addr: None,
            msg: msg.into(),
        }
    }

    /// Resolve `addr` (`host:port`) and build a packet for it.
    ///
    /// Returns `None` if the address cannot be resolved.  Handing the result
    /// straight to [`crate::Conn::send_packet`] reports a
    /// [`ConnError::NilPacket`] on the error stream in that case.
    pub async fn resolve(addr: &str, msg: impl Into<Message>) -> Option<Self> {
        match socket::resolve(addr).await {
            Ok(dest) => Some(Self::to(dest, msg)),
            Err(e) => {
                log::debug!("[packet] {e}");
                None
            }
        }
    }

    /// Check the payload against [`MESSAGE_SIZE`].
    pub fn validate(&self) -> Result<(), ConnError> {
        check_size(&self.msg)
    }
}

/// Reject payloads that cannot fit in a single [`MESSAGE_SIZE`] datagram.
pub(crate) fn check_size(msg: &[u8]) -> Result<(), ConnError> {
    if msg.len() > MESSAGE_SIZE {
        return Err(ConnError::MessageTooLarge { len: msg.len() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addressed_and_peer_packets() {
        let dest: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let p = Packet::to(dest, "hello");
        assert_eq!(p.addr, Some(dest));
        assert_eq!(p.msg, b"hello");

        let p = Packet::to_peer(&b"raw"[..]);
        assert_eq!(p.addr, None);
        assert_eq!(p.msg, b"raw");
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert!(check_size(&[0u8; MESSAGE_SIZE]).is_ok());
        assert!(check_size(&[]).is_ok());

        let err = check_size(&[0u8; MESSAGE_SIZE + 1]).unwrap_err();
        assert!(matches!(err, ConnError::MessageTooLarge { len } if len == MESSAGE_SIZE + 1));

        let big = Packet::to_peer(vec![7u8; 600]);
        assert!(big.validate().is_err());
    }

    #[tokio::test]
    async fn resolve_literal_address() {
        let p = Packet::resolve("127.0.0.1:8100", "x").await.expect("resolves");
        assert_eq!(p.addr, Some("127.0.0.1:8100".parse().unwrap()));
    }

    #[tokio::test]
    async fn resolve_garbage_yields_none() {
        assert!(Packet::resolve("not an address", "x").await.is_none());
    }
}
