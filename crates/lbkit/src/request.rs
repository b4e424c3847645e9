//! Caller-facing request and report.

use crate::error::{Error, Result};
use crate::types::{Method, NodeSpec, Outcome, Persistence, Scope, Status};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ports a pool may listen on.
pub const ALLOWED_PORTS: [u16; 2] = [80, 443];

/// Target state of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Load balancer exists; with a port, so does the pool; with nodes, the
    /// pool holds exactly those nodes.
    #[default]
    Present,
    /// Load balancer does not exist.
    Absent,
    /// Pool on the given port does not exist.
    PortAbsent,
    /// Given nodes are members of the pool.
    NodesPresent,
    /// Given nodes are not members of the pool.
    NodesAbsent,
}

impl State {
    /// Wire name of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::PortAbsent => "port_absent",
            Self::NodesPresent => "nodes_present",
            Self::NodesAbsent => "nodes_absent",
        }
    }

    /// Whether the state addresses a pool and therefore needs a port.
    #[must_use]
    pub fn needs_port(&self) -> bool {
        matches!(self, Self::PortAbsent | Self::NodesPresent | Self::NodesAbsent)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "port_absent" => Ok(Self::PortAbsent),
            "nodes_present" => Ok(Self::NodesPresent),
            "nodes_absent" => Ok(Self::NodesAbsent),
            other => Err(Error::invalid("state", other)),
        }
    }
}

/// What the caller wants reconciled.
///
/// # Example
///
/// ```
/// use lbkit::{NodeSpec, Request, State};
///
/// let request = Request::new("test", "TEST", "WA1")
///     .port(443)
///     .nodes(vec![NodeSpec::new("10.11.22.234", 80)])
///     .state(State::NodesPresent);
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Load balancer name.
    pub name: String,
    /// Account alias.
    pub alias: String,
    /// Datacenter location.
    pub location: String,
    /// Description used when creating; defaults to the name.
    #[serde(default)]
    pub description: Option<String>,
    /// Pool port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Pool balancing method used when creating.
    #[serde(default)]
    pub method: Option<Method>,
    /// Pool persistence used when creating.
    #[serde(default)]
    pub persistence: Option<Persistence>,
    /// Pool nodes.
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    /// Load balancer status used when creating.
    #[serde(default)]
    pub status: Status,
    /// Target state.
    #[serde(default)]
    pub state: State,
}

impl Request {
    /// Create a `present` request with no pool.
    #[must_use]
    pub fn new(name: impl Into<String>, alias: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            location: location.into(),
            description: None,
            port: None,
            method: None,
            persistence: None,
            nodes: Vec::new(),
            status: Status::Enabled,
            state: State::Present,
        }
    }

    /// Set the pool port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the pool nodes.
    #[must_use]
    pub fn nodes(mut self, nodes: Vec<NodeSpec>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Set the target state.
    #[must_use]
    pub fn state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The scope the request is addressed to.
    #[must_use]
    pub fn scope(&self) -> Scope {
        Scope::new(self.alias.clone(), self.location.clone())
    }

    /// The pool port, required by pool-level states.
    pub fn required_port(&self) -> Result<u16> {
        self.port
            .ok_or_else(|| Error::config(format!("state {} requires a port", self.state)))
    }

    /// Check the request before any remote call is made.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("alias", &self.alias),
            ("location", &self.location),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config(format!("{field} is required")));
            }
        }

        if let Some(port) = self.port
            && !ALLOWED_PORTS.contains(&port)
        {
            return Err(Error::invalid("port", port.to_string()));
        }

        if self.state.needs_port() {
            self.required_port()?;
        }

        // Without a port there is no pool to put the nodes in.
        if self.state == State::Present && self.port.is_none() && !self.nodes.is_empty() {
            return Err(Error::config("nodes require a port"));
        }

        Ok(())
    }
}

/// What a reconciliation run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Whether any step changed remote state.
    pub changed: bool,
    /// Outcome of the load-balancer level step (or the only step).
    pub loadbalancer: Outcome,
    /// Outcome of the pool step of a `present` request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<Outcome>,
    /// Outcome of the node step of a `present` request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Outcome>,
}

impl Report {
    /// Report for a single-step request.
    #[must_use]
    pub fn single(outcome: Outcome) -> Self {
        Self::from_steps(outcome, None, None)
    }

    /// Report for a multi-step request; `changed` is true if any step changed.
    #[must_use]
    pub fn from_steps(loadbalancer: Outcome, pool: Option<Outcome>, nodes: Option<Outcome>) -> Self {
        let changed = loadbalancer.is_change()
            || pool.as_ref().is_some_and(Outcome::is_change)
            || nodes.as_ref().is_some_and(Outcome::is_change);
        Self {
            changed,
            loadbalancer,
            pool,
            nodes,
        }
    }
}
