//! Inbound pipeline worker.
//!
//! Reads datagrams into a [`MESSAGE_SIZE`] buffer, copies exactly the bytes
//! received into a fresh [`Packet`] tagged with the source address, and
//! hands it to the dispatcher.  A read fault is reported and tears the
//! connection down.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::connection::{stopped, WeakConn};
use crate::error::Reporter;
use crate::packet::{Packet, MESSAGE_SIZE};
use crate::socket::Socket;

pub(crate) async fn run(
    owner: WeakConn,
    socket: Arc<Socket>,
    inbound: mpsc::Sender<Packet>,
    mut errors: Reporter,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; MESSAGE_SIZE];
    loop {
        let read = tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => break,
            read = socket.recv_from(&mut buf) => read,
        };

        let (n, src) = match read {
            Ok(v) => v,
            Err(e) => {
                errors.report(e).await;
                owner.fail();
                break;
            }
        };
        log::debug!("[receiver] ← {n} bytes from {src}");

        let packet = Packet {
            addr: Some(src),
            msg: buf[..n].to_vec(),
        };
        tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => break,
            queued = inbound.send(packet) => {
                if queued.is_err() {
                    break;
                }
            }
        }
    }
    log::debug!("[receiver] stopped");
}
