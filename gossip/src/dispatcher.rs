//! Inbound dispatch worker.
//!
//! Takes packets off the inbound queue in arrival order and launches one
//! task per registered handler, in registration order.  It never waits for
//! a handler to finish, only for a free slot in the handler pool, so
//! completions are unordered both within and across packets.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Semaphore};

use crate::connection::{stopped, WeakConn};
use crate::packet::Packet;

pub(crate) async fn run(
    owner: WeakConn,
    mut inbound: mpsc::Receiver<Packet>,
    pool: Arc<Semaphore>,
    mut shutdown: watch::Receiver<bool>,
) {
    'packets: loop {
        let packet = tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => break,
            packet = inbound.recv() => match packet {
                Some(packet) => Arc::new(packet),
                None => break,
            },
        };

        let Some(conn) = owner.upgrade() else {
            break;
        };
        let handlers = conn.handlers();
        log::debug!("[dispatch] packet → {} handler(s)", handlers.len());

        for handler in handlers {
            let permit = tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break 'packets,
                permit = pool.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break 'packets,
                },
            };
            let conn = conn.clone();
            let packet = packet.clone();
            tokio::spawn(async move {
                handler.handle(conn, packet).await;
                drop(permit);
            });
        }
    }
    log::debug!("[dispatch] stopped");
}
