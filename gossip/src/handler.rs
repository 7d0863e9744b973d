//! Event handlers and their registry.
//!
//! An [`EventHandler`] is invoked once per inbound [`Packet`] with the owning
//! [`Conn`].  Handlers run as independent tasks, so several invocations of
//! the same handler may overlap; the packet is shared read-only between them.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use crate::connection::Conn;
use crate::packet::Packet;

/// Future returned by [`EventHandler::handle`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Side effect performed for every inbound packet.
///
/// Implemented for any `Fn(Conn, Arc<Packet>) -> impl Future<Output = ()>`:
///
/// ```ignore
/// conn.add_handler(|conn: Conn, packet: Arc<Packet>| async move {
///     if let Some(src) = packet.addr {
///         let _ = conn.send_to(packet.msg.clone(), src).await;
///     }
/// });
/// ```
pub trait EventHandler: Send + Sync + 'static {
    fn handle(&self, conn: Conn, packet: Arc<Packet>) -> HandlerFuture;
}

impl<F, Fut> EventHandler for F
where
    F: Fn(Conn, Arc<Packet>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, conn: Conn, packet: Arc<Packet>) -> HandlerFuture {
        Box::pin(self(conn, packet))
    }
}

/// Append-only, ordered list of handlers.
#[derive(Default)]
pub(crate) struct Registry {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl Registry {
    pub(crate) fn push(&self, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Handlers in registration order, detached from the lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn clear(&self) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
