//! Change counters.
//!
//! The reconciler reports each create/delete/modify call it makes to a
//! [`Telemetry`] sink. Sinks must never fail the run: [`GraphiteTelemetry`]
//! swallows every error after logging it.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Connect/write timeout for the Graphite sender.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(3);

/// A state change worth counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// A load balancer was created.
    LoadBalancerCreated,
    /// A load balancer was deleted.
    LoadBalancerDeleted,
    /// A pool was created.
    PoolCreated,
    /// A pool was deleted.
    PoolDeleted,
    /// A pool's node set was submitted.
    PoolModified,
}

impl Event {
    /// Metric path below the configured prefix.
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            Self::LoadBalancerCreated => "loadbalancer.create",
            Self::LoadBalancerDeleted => "loadbalancer.delete",
            Self::PoolCreated => "loadbalancer.pool.create",
            Self::PoolDeleted => "loadbalancer.pool.delete",
            Self::PoolModified => "loadbalancer.pool.modify",
        }
    }
}

/// Sink for change events.
pub trait Telemetry: Send + Sync {
    /// Record one occurrence of `event`. Must not panic or block for long.
    fn record(&self, event: Event);
}

/// Telemetry sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTelemetry;

impl Telemetry for NoTelemetry {
    fn record(&self, _event: Event) {}
}

/// Fire-and-forget counter push in Graphite plaintext format.
///
/// Each event opens a short-lived TCP connection and writes one line:
/// `<prefix>.<path> 1 <unix-seconds>`.
#[derive(Debug, Clone)]
pub struct GraphiteTelemetry {
    addr: String,
    prefix: String,
}

impl GraphiteTelemetry {
    /// Create a sender for `addr` (`host:port`).
    #[must_use]
    pub fn new(addr: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            prefix: prefix.into(),
        }
    }

    /// The line that would be sent for `event` at `timestamp`.
    #[must_use]
    pub fn line(&self, event: Event, timestamp: u64) -> String {
        format!("{}.{} 1 {}\n", self.prefix, event.path(), timestamp)
    }

    fn send(&self, line: &str) -> std::io::Result<()> {
        let addr = self
            .addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved"))?;
        let mut stream = TcpStream::connect_timeout(&addr, SOCKET_TIMEOUT)?;
        stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;
        stream.write_all(line.as_bytes())
    }
}

impl Telemetry for GraphiteTelemetry {
    fn record(&self, event: Event) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        if let Err(e) = self.send(&self.line(event, timestamp)) {
            log::debug!("Dropping metric {} for {}: {e}", event.path(), self.addr);
        }
    }
}
