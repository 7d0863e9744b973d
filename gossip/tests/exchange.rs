//! Integration tests for packet exchange between in-process peers.
//!
//! Every peer is a real `Conn` bound to a loopback UDP socket on an
//! OS-chosen port, so the tests can run in parallel.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use gossip::{Conn, ConnConfig, Packet};

use common::{collect, listening, next};

const REQUEST: &str = "Hi, I am client!";
const REPLY: &str = "Nice to meet you. I am server!";

/// Handler that answers the greeting and turns everyone else away.
fn greeter(conn: &Conn) {
    conn.add_handler(|conn: Conn, packet: Arc<Packet>| async move {
        let Some(src) = packet.addr else { return };
        let answer = if packet.msg == REQUEST.as_bytes() {
            REPLY
        } else {
            "Go away!"
        };
        conn.send_to(answer, src).await.expect("reply");
    });
}

// ---------------------------------------------------------------------------
// Dialed peer → listening peer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dialed_send_reaches_listener_with_source_address() {
    let (server, server_addr) = listening(ConnConfig::default()).await;
    let mut inbox = collect(&server);

    let client = Conn::new();
    client.dial(&server_addr.to_string()).await.expect("dial");
    assert_eq!(client.peer_addr(), Some(server_addr));

    client.send("X").await.expect("send");

    let packet = next(&mut inbox).await;
    assert_eq!(packet.msg, b"X");
    assert_eq!(packet.addr, client.local_addr());

    client.disconnect().await;
    server.disconnect().await;
}

#[tokio::test]
async fn client_server_greeting() {
    let (server, server_addr) = listening(ConnConfig::default()).await;
    greeter(&server);

    let client = Conn::new();
    let mut replies = collect(&client);
    client.dial(&server_addr.to_string()).await.expect("dial");
    client.send(REQUEST).await.expect("send");

    let reply = next(&mut replies).await;
    assert_eq!(reply.msg, REPLY.as_bytes());
    assert_eq!(reply.addr, Some(server_addr));

    client.disconnect().await;
    server.disconnect().await;
}

// ---------------------------------------------------------------------------
// Listening peer ↔ listening peer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn peers_exchange_greeting_via_send_to() {
    let (peer0, _) = listening(ConnConfig::default()).await;
    let mut replies = collect(&peer0);

    let (peer1, peer1_addr) = listening(ConnConfig::default()).await;
    greeter(&peer1);

    peer0.send_to(REQUEST, peer1_addr).await.expect("send_to");

    let reply = next(&mut replies).await;
    assert_eq!(reply.msg, REPLY.as_bytes());
    assert_eq!(reply.addr, Some(peer1_addr));

    peer0.disconnect().await;
    peer1.disconnect().await;
}

#[tokio::test]
async fn unknown_request_is_turned_away() {
    let (peer0, _) = listening(ConnConfig::default()).await;
    let mut replies = collect(&peer0);
    let (peer1, peer1_addr) = listening(ConnConfig::default()).await;
    greeter(&peer1);

    peer0.send_to("Who are you?", peer1_addr).await.unwrap();
    assert_eq!(next(&mut replies).await.msg, b"Go away!");

    peer0.disconnect().await;
    peer1.disconnect().await;
}

#[tokio::test]
async fn dialed_conn_can_still_address_explicitly() {
    let (target, _) = listening(ConnConfig::default()).await;
    let (other, other_addr) = listening(ConnConfig::default()).await;
    let mut inbox = collect(&other);

    let client = Conn::new();
    client.dial(&target.local_addr().unwrap().to_string()).await.unwrap();
    client.send_to("detour", other_addr).await.unwrap();

    assert_eq!(next(&mut inbox).await.msg, b"detour");

    for conn in [client, target, other] {
        conn.disconnect().await;
    }
}

// ---------------------------------------------------------------------------
// Ordering and fan-out
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_producer_order_is_preserved() {
    const COUNT: usize = 20;

    // One handler slot serialises handler runs, making arrival order visible.
    let (server, server_addr) = listening(ConnConfig::default().with_max_handler_tasks(1)).await;
    let mut inbox = collect(&server);

    let client = Conn::new();
    client.dial(&server_addr.to_string()).await.unwrap();
    for i in 0..COUNT {
        client.send(format!("msg-{i:02}")).await.unwrap();
    }

    for i in 0..COUNT {
        let packet = next(&mut inbox).await;
        assert_eq!(packet.msg, format!("msg-{i:02}").as_bytes(), "message {i} out of order");
    }

    client.disconnect().await;
    server.disconnect().await;
}

#[tokio::test]
async fn every_handler_sees_every_packet() {
    let (server, server_addr) = listening(ConnConfig::default()).await;
    let mut first = collect(&server);
    let mut second = collect(&server);
    assert_eq!(server.handler_count(), 2);

    let client = Conn::new();
    client.dial(&server_addr.to_string()).await.unwrap();
    client.send("a").await.unwrap();
    client.send("b").await.unwrap();

    for inbox in [&mut first, &mut second] {
        let mut seen = vec![next(inbox).await.msg.clone(), next(inbox).await.msg.clone()];
        seen.sort();
        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    client.disconnect().await;
    server.disconnect().await;
}

#[tokio::test]
async fn full_size_message_arrives_intact() {
    let (server, server_addr) = listening(ConnConfig::default()).await;
    let mut inbox = collect(&server);

    let payload: Vec<u8> = (0..gossip::MESSAGE_SIZE).map(|i| (i % 251) as u8).collect();
    let client = Conn::new();
    client.dial(&server_addr.to_string()).await.unwrap();
    client.send(payload.clone()).await.unwrap();

    let packet = next(&mut inbox).await;
    assert_eq!(packet.msg.len(), gossip::MESSAGE_SIZE);
    assert_eq!(packet.msg, payload);

    client.disconnect().await;
    server.disconnect().await;
}

#[tokio::test]
async fn resolved_packet_is_delivered() {
    let (server, server_addr) = listening(ConnConfig::default()).await;
    let mut inbox = collect(&server);
    let (client, _) = listening(ConnConfig::default()).await;

    let packet = Packet::resolve(&server_addr.to_string(), "via resolve").await;
    assert!(packet.is_some());
    client.send_packet(packet).await.unwrap();

    let got = next(&mut inbox).await;
    assert_eq!(got.msg, b"via resolve");
    assert_eq!(got.addr.map(|a: SocketAddr| a.port()), client.local_addr().map(|a| a.port()));

    client.disconnect().await;
    server.disconnect().await;
}
