//! Shared helpers for the loopback integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gossip::{Conn, ConnConfig, Packet};
use tokio::sync::mpsc;

/// Upper bound for anything that should happen "promptly" on loopback.
pub const WAIT: Duration = Duration::from_secs(5);

/// Listen on an OS-chosen port and return the connection together with a
/// loopback address peers can send to.
pub async fn listening(config: ConnConfig) -> (Conn, SocketAddr) {
    let conn = Conn::with_config(config);
    conn.listen(0).await.expect("listen");
    let port = conn.local_addr().expect("bound").port();
    (conn, SocketAddr::from(([127, 0, 0, 1], port)))
}

/// Register a handler that forwards every inbound packet into a channel.
pub fn collect(conn: &Conn) -> mpsc::UnboundedReceiver<Arc<Packet>> {
    let (tx, rx) = mpsc::unbounded_channel();
    conn.add_handler(move |_conn: Conn, packet: Arc<Packet>| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(packet);
        }
    });
    rx
}

/// Next collected packet, failing the test if none arrives in time.
pub async fn next(rx: &mut mpsc::UnboundedReceiver<Arc<Packet>>) -> Arc<Packet> {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a packet")
        .expect("handler channel closed")
}
