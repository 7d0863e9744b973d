//! Outbound pipeline worker.
//!
//! Drains the outbound queue in FIFO order and writes each packet to the
//! socket.  Contract:
//! - `None` (nil packet) → report [`ConnError::NilPacket`], keep going.
//! - No destination on a peer-bound socket → write to the dialed peer.
//! - No destination on a listening socket → report [`ConnError::NoPeer`],
//!   keep going.
//! - Explicit destination → write there, in either mode.
//! - Any write fault → report it, tear the connection down, stop.  Nothing
//!   is retried.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::connection::{stopped, WeakConn};
use crate::error::{ConnError, Reporter};
use crate::packet::Packet;
use crate::socket::Socket;

pub(crate) async fn run(
    owner: WeakConn,
    socket: Arc<Socket>,
    mut outbound: mpsc::Receiver<Option<Packet>>,
    mut errors: Reporter,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let item = tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => break,
            item = outbound.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        let Some(packet) = item else {
            errors.report(ConnError::NilPacket).await;
            continue;
        };

        let written = match (packet.addr, socket.peer) {
            (Some(dest), _) => socket.send_to(&packet.msg, dest).await,
            (None, Some(_)) => socket.send(&packet.msg).await,
            (None, None) => {
                errors.report(ConnError::NoPeer).await;
                continue;
            }
        };

        match written {
            Ok(n) => log::debug!(
                "[sender] → {n} bytes to {}",
                packet.addr.or(socket.peer).map_or_else(String::new, |a| a.to_string())
            ),
            Err(e) => {
                errors.report(e).await;
                owner.fail();
                break;
            }
        }
    }
    log::debug!("[sender] stopped");
}
