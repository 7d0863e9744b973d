//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` covering the
//! handful of primitives the pipeline needs: bind, bind-and-connect, read
//! with sender address, write, write-to.  Every socket may send to broadcast
//! addresses.  The socket closes when the last handle is dropped.  All
//! pipeline logic lives elsewhere.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::{lookup_host, UdpSocket};

use crate::error::ConnError;

/// Resolve `addr` (`host:port`) to a single endpoint, preferring IPv4.
pub async fn resolve(addr: &str) -> Result<SocketAddr, ConnError> {
    let resolve_err = |reason: String| ConnError::Resolve {
        addr: addr.to_string(),
        reason,
    };
    let candidates: Vec<SocketAddr> = lookup_host(addr)
        .await
        .map_err(|e| resolve_err(e.to_string()))?
        .collect();

    candidates
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| resolve_err("no addresses found".into()))
}

fn allow_broadcast(inner: &UdpSocket) -> Result<(), ConnError> {
    inner
        .set_broadcast(true)
        .map_err(|e| ConnError::network("set_broadcast", e))
}

#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    /// Fixed remote end-point for connected sockets.
    pub peer: Option<SocketAddr>,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a socket that accepts datagrams from any source.
    ///
    /// Port `0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, ConnError> {
        let inner = UdpSocket::bind(local_addr)
            .await
            .map_err(|e| ConnError::network(format!("bind [{local_addr}]"), e))?;
        allow_broadcast(&inner)?;
        let local_addr = inner
            .local_addr()
            .map_err(|e| ConnError::network("local_addr", e))?;
        Ok(Self {
            local_addr,
            peer: None,
            inner,
        })
    }

    /// Bind an ephemeral socket and associate it with `peer`.
    ///
    /// Datagrams from any other source are filtered out by the OS.
    pub async fn connect(peer: SocketAddr) -> Result<Self, ConnError> {
        let any: IpAddr = match peer {
            SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
            SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
        };
        let inner = UdpSocket::bind(SocketAddr::new(any, 0))
            .await
            .map_err(|e| ConnError::network("bind [ephemeral]", e))?;
        allow_broadcast(&inner)?;
        inner
            .connect(peer)
            .await
            .map_err(|e| ConnError::network(format!("connect [{peer}]"), e))?;
        // Only meaningful after connect: the OS has picked the source IP.
        let local_addr = inner
            .local_addr()
            .map_err(|e| ConnError::network("local_addr", e))?;
        Ok(Self {
            local_addr,
            peer: Some(peer),
            inner,
        })
    }

    /// Write `msg` as one datagram to the connected peer.
    pub async fn send(&self, msg: &[u8]) -> Result<usize, ConnError> {
        self.inner.send(msg).await.map_err(|e| {
            let peer = self.peer.map_or_else(|| "-".to_string(), |p| p.to_string());
            ConnError::network(format!("send [{peer}]"), e)
        })
    }

    /// Write `msg` as one datagram to `dest`.
    pub async fn send_to(&self, msg: &[u8], dest: SocketAddr) -> Result<usize, ConnError> {
        self.inner
            .send_to(msg, dest)
            .await
            .map_err(|e| ConnError::network(format!("send_to [{dest}]"), e))
    }

    /// Read the next datagram into `buf`.
    ///
    /// Returns `(bytes_read, sender_address)`.  Datagrams longer than `buf`
    /// are truncated.
    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), ConnError> {
        self.inner
            .recv_from(buf)
            .await
            .map_err(|e| ConnError::network("recv_from", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_literal_address() {
        let a = resolve("127.0.0.1:53").await.unwrap();
        assert_eq!(a, "127.0.0.1:53".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn resolve_reports_input() {
        let err = resolve("missing-port").await.unwrap_err();
        assert!(matches!(err, ConnError::Resolve { ref addr, .. } if addr == "missing-port"));
    }

    #[tokio::test]
    async fn sockets_may_broadcast() {
        let server = Socket::bind("0.0.0.0:0".parse().unwrap()).await.unwrap();
        assert!(server.inner.broadcast().unwrap());
        let client = Socket::connect("127.0.0.1:9".parse().unwrap()).await.unwrap();
        assert!(client.inner.broadcast().unwrap());
    }

    #[tokio::test]
    async fn connected_pair_exchanges_datagrams() {
        let server = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let client = Socket::connect(server.local_addr).await.unwrap();
        assert_eq!(client.peer, Some(server.local_addr));
        assert_eq!(client.local_addr.ip(), server.local_addr.ip());

        client.send(b"ping").await.unwrap();
        let mut buf = [0u8; 16];
        let (n, from) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(from, client.local_addr);

        server.send_to(b"pong", from).await.unwrap();
        let (n, from) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"pong");
        assert_eq!(from, server.local_addr);
    }
}
