//! Error kinds and the asynchronous error stream.
//!
//! Lifecycle failures (`listen`, `dial`, direct misuse of `send*`) are
//! returned synchronously.  Everything that goes wrong inside the pipeline
//! after that is piped down a bounded queue that the caller drains through
//! an [`ErrorStream`].
//!
//! The queue is deliberately small.  When it is full, the worker that wants
//! to report blocks until the caller catches up; a pending report is
//! abandoned only when the connection shuts down.

use std::io;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::connection::stopped;
use crate::packet::MESSAGE_SIZE;

#[derive(Error, Debug)]
pub enum ConnError {
    /// `listen` or `dial` on a connection that is already open.
    #[error("socket is already open")]
    AlreadyConnected,
    /// Send on a disconnected connection.
    #[error("socket has been closed")]
    Closed,
    /// `None` reached the sender.
    #[error("encountered nil packet")]
    NilPacket,
    /// Address-less packet on a socket that was not dialed.
    #[error("no destination address and the socket is not bound to a peer")]
    NoPeer,
    /// Payload longer than [`MESSAGE_SIZE`].
    #[error("message of {len} bytes exceeds the {max}-byte limit", max = MESSAGE_SIZE)]
    MessageTooLarge { len: usize },
    /// `host:port` could not be turned into an address.
    #[error("cannot resolve {addr}: {reason}")]
    Resolve { addr: String, reason: String },
    /// Socket I/O failure; fatal inside the pipeline.
    #[error("{context}: {source}")]
    Network {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ConnError {
    pub(crate) fn network(context: impl Into<String>, source: io::Error) -> Self {
        Self::Network {
            context: context.into(),
            source,
        }
    }

    /// `true` for faults that tear the connection down when they happen
    /// inside the pipeline.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

// ---------------------------------------------------------------------------
// ErrorStream
// ---------------------------------------------------------------------------

/// Caller side of a connection's error queue.
///
/// Obtained from [`crate::Conn::errors`].  Yields `None` once the connection
/// has been disconnected and its workers have stopped.
#[derive(Debug)]
pub struct ErrorStream {
    rx: mpsc::Receiver<ConnError>,
}

impl ErrorStream {
    pub(crate) fn new(rx: mpsc::Receiver<ConnError>) -> Self {
        Self { rx }
    }

    /// Wait for the next error.
    pub async fn recv(&mut self) -> Option<ConnError> {
        self.rx.recv().await
    }

    /// Take an already queued error without waiting.
    pub fn try_recv(&mut self) -> Option<ConnError> {
        self.rx.try_recv().ok()
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

/// Worker side of the error queue.
pub(crate) struct Reporter {
    tx: mpsc::Sender<ConnError>,
    shutdown: watch::Receiver<bool>,
}

impl Reporter {
    pub(crate) fn new(tx: mpsc::Sender<ConnError>, shutdown: watch::Receiver<bool>) -> Self {
        Self { tx, shutdown }
    }

    /// Queue `err` for the caller, waiting while the queue is full.
    pub(crate) async fn report(&mut self, err: ConnError) {
        log::warn!("[conn] {err}");
        tokio::select! {
            biased;
            _ = stopped(&mut self.shutdown) => {
                log::debug!("[conn] shutting down; dropped report");
            }
            result = self.tx.send(err) => {
                if result.is_err() {
                    log::debug!("[conn] error stream dropped by caller");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn messages_carry_context() {
        let e = ConnError::network(
            "send_to [127.0.0.1:9]",
            io::Error::new(io::ErrorKind::Other, "boom"),
        );
        assert_eq!(e.to_string(), "send_to [127.0.0.1:9]: boom");
        assert!(e.is_fatal());

        let e = ConnError::MessageTooLarge { len: 513 };
        assert_eq!(e.to_string(), "message of 513 bytes exceeds the 512-byte limit");
        assert!(!e.is_fatal());
        assert!(!ConnError::NilPacket.is_fatal());
    }

    #[tokio::test]
    async fn report_reaches_stream() {
        let (tx, rx) = mpsc::channel(4);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let mut reporter = Reporter::new(tx, stop_rx);
        let mut stream = ErrorStream::new(rx);

        reporter.report(ConnError::NilPacket).await;
        assert!(matches!(stream.try_recv(), Some(ConnError::NilPacket)));
        assert!(stream.try_recv().is_none());

        drop(reporter);
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn full_queue_blocks_until_shutdown() {
        let (tx, mut rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut reporter = Reporter::new(tx, stop_rx);

        reporter.report(ConnError::NilPacket).await;

        let pending = tokio::spawn(async move {
            reporter.report(ConnError::Closed).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished(), "report should block on a full queue");

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("report should give up on shutdown")
            .unwrap();

        assert!(matches!(rx.recv().await, Some(ConnError::NilPacket)));
    }
}
