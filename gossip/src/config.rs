//! Tunable queue bounds for a [`crate::Conn`].

use std::net::{IpAddr, Ipv4Addr};

/// Capacity of the error queue.  A full queue blocks the reporting worker.
pub const DEFAULT_ERROR_CAPACITY: usize = 4;

const DEFAULT_QUEUE_CAPACITY: usize = 64;
const DEFAULT_MAX_HANDLER_TASKS: usize = 256;

/// Queue capacities, handler pool size and bind address.
///
/// Every capacity is at least 1; the `with_*` builders clamp smaller values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnConfig {
    /// Pending runtime errors before a worker blocks on reporting.
    pub error_capacity: usize,
    /// Packets accepted by `send*` before callers wait for the sender.
    pub outbound_capacity: usize,
    /// Datagrams buffered between the receiver and the dispatcher.
    pub inbound_capacity: usize,
    /// Handler invocations allowed to run at the same time.
    pub max_handler_tasks: usize,
    /// Local address `listen` binds to.
    pub bind_ip: IpAddr,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            error_capacity: DEFAULT_ERROR_CAPACITY,
            outbound_capacity: DEFAULT_QUEUE_CAPACITY,
            inbound_capacity: DEFAULT_QUEUE_CAPACITY,
            max_handler_tasks: DEFAULT_MAX_HANDLER_TASKS,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

impl ConnConfig {
    /// Set [`ConnConfig::error_capacity`].
    pub fn with_error_capacity(mut self, capacity: usize) -> Self {
        self.error_capacity = capacity.max(1);
        self
    }

    /// Set [`ConnConfig::outbound_capacity`].
    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Set [`ConnConfig::inbound_capacity`].
    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }

    /// Set [`ConnConfig::max_handler_tasks`].
    pub fn with_max_handler_tasks(mut self, tasks: usize) -> Self {
        self.max_handler_tasks = tasks.max(1);
        self
    }

    /// Set the address `listen` binds to.
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Copy of `self` with every capacity raised to at least 1.
    ///
    /// Fields are public, so this runs again when a connection is built.
    pub(crate) fn normalized(&self) -> Self {
        Self {
            error_capacity: self.error_capacity.max(1),
            outbound_capacity: self.outbound_capacity.max(1),
            inbound_capacity: self.inbound_capacity.max(1),
            max_handler_tasks: self.max_handler_tasks.max(1),
            bind_ip: self.bind_ip,
        }
    }
}
