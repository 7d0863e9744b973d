//! Connection lifecycle manager.
//!
//! A [`Conn`] is a cheap, cloneable handle to one UDP endpoint.  Its
//! responsibilities are:
//! - Opening the socket with [`Conn::listen`] or [`Conn::dial`] and spawning
//!   the three pipeline workers (sender, receiver, dispatcher).
//! - Accepting outbound packets from application code.
//! - Holding the handler registry the dispatcher fans packets out to.
//! - Tearing everything down again on [`Conn::disconnect`] or on a fatal
//!   I/O fault, leaving the handle ready for the next `listen`/`dial`.
//!
//! Workers only hold a `WeakConn`, so dropping the last `Conn` handle stops
//! the pipeline as well.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;

use crate::config::ConnConfig;
use crate::error::{ConnError, ErrorStream, Reporter};
use crate::handler::{EventHandler, Registry};
use crate::packet::{check_size, Message, Packet};
use crate::socket::{self, Socket};
use crate::state::ConnectionState;
use crate::{dispatcher, receiver, sender};

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

pub(crate) struct Shared {
    config: ConnConfig,
    handlers: Registry,
    state: Mutex<State>,
}

struct State {
    /// `Some` exactly while connected.
    session: Option<Session>,
    /// Error queue of the current generation; replaced on every teardown.
    errors_tx: mpsc::Sender<ConnError>,
    errors_rx: Option<mpsc::Receiver<ConnError>>,
    /// Workers of torn-down sessions that `disconnect` has not awaited yet.
    retired: Vec<JoinHandle<()>>,
    next_generation: u64,
}

/// Everything that exists only while connected.
struct Session {
    generation: u64,
    state: ConnectionState,
    _socket: Arc<Socket>,
    outbound: mpsc::Sender<Option<Packet>>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = state.session.take() {
            log::debug!("[conn] last handle dropped; stopping workers ({})", session.state);
            let _ = session.shutdown.send(true);
        }
    }
}

// ---------------------------------------------------------------------------
// WeakConn
// ---------------------------------------------------------------------------

/// Non-owning reference held by the workers of one session.
#[derive(Clone)]
pub(crate) struct WeakConn {
    shared: Weak<Shared>,
    generation: u64,
}

impl WeakConn {
    pub(crate) fn upgrade(&self) -> Option<Conn> {
        self.shared.upgrade().map(|shared| Conn { shared })
    }

    /// Tear down the session this worker belongs to after a fatal fault.
    ///
    /// No-op if that session is already gone, even when the connection has
    /// since been re-established.
    pub(crate) fn fail(&self) {
        if let Some(conn) = self.upgrade() {
            conn.teardown(Some(self.generation));
        }
    }
}

/// Resolves once the session's shutdown signal is raised or its sender is
/// gone.  Workers race it against every blocking operation.
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

// ---------------------------------------------------------------------------
// Conn
// ---------------------------------------------------------------------------

/// Handle to an event-driven UDP connector.
///
/// Once connected, runtime errors are piped down the stream returned by
/// [`Conn::errors`]; that stream ends on disconnect.
#[derive(Clone)]
pub struct Conn {
    shared: Arc<Shared>,
}

impl Default for Conn {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("state", &self.state())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl Conn {
    /// Allocate a disconnected connection with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ConnConfig::default())
    }

    /// Allocate a disconnected connection with `config`.
    pub fn with_config(config: ConnConfig) -> Self {
        let config = config.normalized();
        let (errors_tx, errors_rx) = mpsc::channel(config.error_capacity);
        Self {
            shared: Arc::new(Shared {
                config,
                handlers: Registry::default(),
                state: Mutex::new(State {
                    session: None,
                    errors_tx,
                    errors_rx: Some(errors_rx),
                    retired: Vec::new(),
                    next_generation: 0,
                }),
            }),
        }
    }

    /// Configuration in effect, capacities already clamped.
    pub fn config(&self) -> &ConnConfig {
        &self.shared.config
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Listen for datagrams from any source on `port` of the configured
    /// bind address.  Port `0` picks an ephemeral port; see
    /// [`Conn::local_addr`].
    ///
    /// Call [`Conn::disconnect`] to release the socket.
    pub async fn listen(&self, port: u16) -> Result<(), ConnError> {
        if self.is_connected() {
            return Err(ConnError::AlreadyConnected);
        }
        let socket = Socket::bind(SocketAddr::new(self.shared.config.bind_ip, port)).await?;
        let state = ConnectionState::Listening {
            local: socket.local_addr,
        };
        self.establish(socket, state)
    }

    /// Bind a socket to the single remote end-point `remote` (`host:port`).
    ///
    /// Afterwards [`Conn::send`] needs no address.  Call [`Conn::disconnect`]
    /// to release the socket.
    pub async fn dial(&self, remote: &str) -> Result<(), ConnError> {
        if self.is_connected() {
            return Err(ConnError::AlreadyConnected);
        }
        let peer = socket::resolve(remote).await?;
        let socket = Socket::connect(peer).await?;
        let state = ConnectionState::Dialed {
            local: socket.local_addr,
            peer,
        };
        self.establish(socket, state)
    }

    /// Stop the workers, release the socket and get ready for the next
    /// `listen`/`dial`.  Handlers stay registered.
    ///
    /// Returns once every worker of the closed session has exited.  Safe to
    /// call when already disconnected, including after a fatal fault tore
    /// the connection down.
    pub async fn disconnect(&self) {
        self.teardown(None);
        let retired = std::mem::take(&mut self.shared.lock_state().retired);
        for worker in retired {
            let _ = worker.await;
        }
    }

    /// `true` while listening or dialed.
    pub fn is_connected(&self) -> bool {
        self.shared.lock_state().session.is_some()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.shared
            .lock_state()
            .session
            .as_ref()
            .map_or(ConnectionState::Disconnected, |s| s.state)
    }

    /// Address the socket is bound to, if connected.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state().local_addr()
    }

    /// Dialed peer, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.state().peer_addr()
    }

    /// Take the error stream of the current connection generation.
    ///
    /// Returns `None` if it was already taken.  A fresh stream becomes
    /// available after every disconnect.
    pub fn errors(&self) -> Option<ErrorStream> {
        self.shared.lock_state().errors_rx.take().map(ErrorStream::new)
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Send `msg` to the end-point fixed by [`Conn::dial`].
    pub async fn send(&self, msg: impl Into<Message>) -> Result<(), ConnError> {
        let msg = msg.into();
        check_size(&msg)?;
        match self.state() {
            ConnectionState::Disconnected => Err(ConnError::Closed),
            ConnectionState::Listening { .. } => Err(ConnError::NoPeer),
            ConnectionState::Dialed { .. } => self.enqueue(Some(Packet::to_peer(msg))).await,
        }
    }

    /// Send `msg` to `addr`, whether listening or dialed.
    pub async fn send_to(&self, msg: impl Into<Message>, addr: SocketAddr) -> Result<(), ConnError> {
        let msg = msg.into();
        check_size(&msg)?;
        self.enqueue(Some(Packet::to(addr, msg))).await
    }

    /// Queue a prepared packet as is.
    ///
    /// Faults the sender detects are reported on the error stream: `None`
    /// as [`ConnError::NilPacket`], an address-less packet on a listening
    /// socket as [`ConnError::NoPeer`].  Neither stops the connection.
    pub async fn send_packet(&self, packet: Option<Packet>) -> Result<(), ConnError> {
        if let Some(p) = &packet {
            p.validate()?;
        }
        self.enqueue(packet).await
    }

    async fn enqueue(&self, item: Option<Packet>) -> Result<(), ConnError> {
        let outbound = self
            .shared
            .lock_state()
            .session
            .as_ref()
            .map(|s| s.outbound.clone())
            .ok_or(ConnError::Closed)?;
        // Fails only when the sender stopped in the meantime.
        outbound.send(item).await.map_err(|_| ConnError::Closed)
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    /// Register a handler invoked for every inbound packet.
    ///
    /// Handlers are launched in registration order but run concurrently.
    pub fn add_handler<H: EventHandler>(&self, handler: H) {
        self.shared.handlers.push(Arc::new(handler));
    }

    /// Remove every registered handler.
    pub fn clear_handlers(&self) {
        self.shared.handlers.clear();
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.shared.handlers.len()
    }

    pub(crate) fn handlers(&self) -> Vec<Arc<dyn EventHandler>> {
        self.shared.handlers.snapshot()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Install a session around `socket` and spawn its workers.
    fn establish(&self, socket: Socket, state: ConnectionState) -> Result<(), ConnError> {
        let mut guard = self.shared.lock_state();
        if guard.session.is_some() {
            // Lost a race with a concurrent listen/dial; `socket` closes here.
            return Err(ConnError::AlreadyConnected);
        }
        guard.retired.retain(|worker| !worker.is_finished());

        let config = &self.shared.config;
        let generation = guard.next_generation;
        guard.next_generation += 1;

        let socket = Arc::new(socket);
        let (out_tx, out_rx) = mpsc::channel(config.outbound_capacity);
        let (in_tx, in_rx) = mpsc::channel(config.inbound_capacity);
        let (stop_tx, stop_rx) = watch::channel(false);
        let pool = Arc::new(Semaphore::new(config.max_handler_tasks));
        let owner = WeakConn {
            shared: Arc::downgrade(&self.shared),
            generation,
        };

        let workers = vec![
            tokio::spawn(sender::run(
                owner.clone(),
                socket.clone(),
                out_rx,
                Reporter::new(guard.errors_tx.clone(), stop_rx.clone()),
                stop_rx.clone(),
            )),
            tokio::spawn(receiver::run(
                owner.clone(),
                socket.clone(),
                in_tx,
                Reporter::new(guard.errors_tx.clone(), stop_rx.clone()),
                stop_rx.clone(),
            )),
            tokio::spawn(dispatcher::run(owner, in_rx, pool, stop_rx)),
        ];

        log::info!("[conn] {state}");
        guard.session = Some(Session {
            generation,
            state,
            _socket: socket,
            outbound: out_tx,
            shutdown: stop_tx,
            workers,
        });
        Ok(())
    }

    /// Signal shutdown and reset the error queue.
    ///
    /// With `Some(generation)` only that session is torn down.  Returns
    /// `false` if there was nothing to tear down.
    pub(crate) fn teardown(&self, generation: Option<u64>) -> bool {
        let mut guard = self.shared.lock_state();
        let matches = match (&guard.session, generation) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(session), Some(g)) => session.generation == g,
        };
        if !matches {
            return false;
        }
        let Some(session) = guard.session.take() else {
            return false;
        };

        let _ = session.shutdown.send(true);

        // Dropping the old sender ends the caller's stream once the workers
        // holding clones of it have exited.
        let (errors_tx, errors_rx) = mpsc::channel(self.shared.config.error_capacity);
        guard.errors_tx = errors_tx;
        guard.errors_rx = Some(errors_rx);
        guard.retired.extend(session.workers);

        log::info!("[conn] disconnected ({})", session.state);
        true
    }
}
