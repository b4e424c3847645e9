//! Core types for load-balancer reconciliation.
//!
//! This module contains the resource records the API reports (load
//! balancers, pools, nodes), the payloads used to create them, and the
//! tagged [`Outcome`] every reconciliation step returns.

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account alias + datacenter pair that every API call is addressed to.
///
/// # Example
///
/// ```
/// use lbkit::Scope;
///
/// let scope = Scope::new("TEST", "WA1");
/// assert_eq!(scope.to_string(), "TEST/WA1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Account alias.
    pub alias: String,
    /// Datacenter location (e.g., "WA1").
    pub location: String,
}

impl Scope {
    /// Create a new scope.
    #[must_use]
    pub fn new(alias: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.alias, self.location)
    }
}

/// Enabled/disabled flag shared by load balancers and nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Accepting traffic.
    #[default]
    Enabled,
    /// Not accepting traffic.
    Disabled,
}

impl Status {
    /// Wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(Self::Enabled),
            "disabled" => Ok(Self::Disabled),
            other => Err(Error::invalid("status", other)),
        }
    }
}

/// Balancing method of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    /// Rotate through nodes in order.
    #[default]
    RoundRobin,
    /// Prefer the node with the fewest open connections.
    LeastConnection,
    /// Pin clients to a node.
    Sticky,
}

impl Method {
    /// Wire name of the method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "roundRobin",
            Self::LeastConnection => "leastConnection",
            Self::Sticky => "sticky",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "roundRobin" => Ok(Self::RoundRobin),
            "leastConnection" => Ok(Self::LeastConnection),
            "sticky" => Ok(Self::Sticky),
            other => Err(Error::invalid("method", other)),
        }
    }
}

/// Session persistence of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Persistence {
    /// No client affinity.
    #[default]
    Standard,
    /// Client affinity.
    Sticky,
}

impl Persistence {
    /// Wire name of the persistence type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Sticky => "sticky",
        }
    }
}

impl fmt::Display for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persistence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "sticky" => Ok(Self::Sticky),
            other => Err(Error::invalid("persistence", other)),
        }
    }
}

/// A shared load balancer as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancer {
    /// API identifier.
    pub id: String,
    /// Name, unique within a [`Scope`].
    pub name: String,
    /// Free-form description. The API may send `null`, read as empty.
    #[serde(default, deserialize_with = "de_null_string")]
    pub description: String,
    /// Whether the load balancer is enabled.
    #[serde(default)]
    pub status: Status,
    /// Public address, once the API has assigned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// A pool listening on one port of a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    /// API identifier.
    pub id: String,
    /// Public port; the API reports it as a number or a numeric string.
    #[serde(deserialize_with = "de_port")]
    pub port: u16,
    /// Balancing method.
    #[serde(default)]
    pub method: Method,
    /// Session persistence.
    #[serde(default)]
    pub persistence: Persistence,
}

/// A node attached to a pool.
///
/// Nodes have no identifier of their own: two nodes are the same node only
/// when address, port and status all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Private address of the backend server.
    pub ip_address: String,
    /// Port on the backend server.
    #[serde(deserialize_with = "de_port")]
    pub private_port: u16,
    /// Whether the node receives traffic. Missing on the wire means enabled.
    #[serde(default)]
    pub status: Status,
}

impl Node {
    /// Create an enabled node.
    #[must_use]
    pub fn new(ip_address: impl Into<String>, private_port: u16) -> Self {
        Self {
            ip_address: ip_address.into(),
            private_port,
            status: Status::Enabled,
        }
    }

    /// Set the node status.
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.ip_address, self.private_port, self.status)
    }
}

/// A desired node as written by the caller; status may be left out.
///
/// Parses from `IP:PORT` or `IP:PORT:STATUS`:
///
/// ```
/// use lbkit::{NodeSpec, Status};
///
/// let spec: NodeSpec = "10.11.22.234:80".parse().unwrap();
/// assert_eq!(spec.status, None);
/// assert_eq!(spec.materialize().status, Status::Enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    /// Private address of the backend server.
    pub ip_address: String,
    /// Port on the backend server.
    #[serde(deserialize_with = "de_port")]
    pub private_port: u16,
    /// Requested status, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl NodeSpec {
    /// Create a spec without an explicit status.
    #[must_use]
    pub fn new(ip_address: impl Into<String>, private_port: u16) -> Self {
        Self {
            ip_address: ip_address.into(),
            private_port,
            status: None,
        }
    }

    /// Fill the default status so the spec compares against API records.
    #[must_use]
    pub fn materialize(&self) -> Node {
        Node {
            ip_address: self.ip_address.clone(),
            private_port: self.private_port,
            status: self.status.unwrap_or_default(),
        }
    }
}

impl FromStr for NodeSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let ip_address = parts
            .next()
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| Error::invalid("node", s))?;
        let private_port = parts
            .next()
            .and_then(|port| port.parse::<u16>().ok())
            .ok_or_else(|| Error::invalid("node", s))?;
        let status = parts.next().map(str::parse).transpose()?;
        if parts.next().is_some() {
            return Err(Error::invalid("node", s));
        }

        Ok(Self {
            ip_address: ip_address.to_string(),
            private_port,
            status,
        })
    }
}

/// Payload for creating a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLoadBalancer {
    /// Name of the new load balancer.
    pub name: String,
    /// Description of the new load balancer.
    pub description: String,
    /// Initial status.
    pub status: Status,
}

/// Payload for creating a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPool {
    /// Public port.
    pub port: u16,
    /// Balancing method.
    pub method: Method,
    /// Session persistence.
    pub persistence: Persistence,
}

/// Remote operations of the load-balancer API, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Exchange username/password for a bearer token.
    Login,
    /// List load balancers in a scope.
    ListLoadBalancers,
    /// List pools of a load balancer.
    ListPools,
    /// List nodes of a pool.
    ListNodes,
    /// Create a load balancer.
    CreateLoadBalancer,
    /// Create a pool.
    CreatePool,
    /// Delete a load balancer.
    DeleteLoadBalancer,
    /// Delete a pool.
    DeletePool,
    /// Replace the node set of a pool.
    SetPoolNodes,
}

impl Operation {
    /// Stable snake_case name of the operation.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::ListLoadBalancers => "list_load_balancers",
            Self::ListPools => "list_pools",
            Self::ListNodes => "list_nodes",
            Self::CreateLoadBalancer => "create_load_balancer",
            Self::CreatePool => "create_pool",
            Self::DeleteLoadBalancer => "delete_load_balancer",
            Self::DeletePool => "delete_pool",
            Self::SetPoolNodes => "set_pool_nodes",
        }
    }

    /// Whether the operation changes remote state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateLoadBalancer
                | Self::CreatePool
                | Self::DeleteLoadBalancer
                | Self::DeletePool
                | Self::SetPoolNodes
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The resource a reconciliation step acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// A load balancer record.
    LoadBalancer(LoadBalancer),
    /// A pool record.
    Pool(Pool),
    /// The full node set of a pool.
    Nodes(Vec<Node>),
}

/// Result of one reconciliation step.
///
/// Absence is a normal outcome, not an error: steps that need a parent
/// resource which does not exist return [`Outcome::NotFound`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// The resource was created.
    Created(Resource),
    /// The resource already matched.
    Unchanged(Resource),
    /// The resource was modified in place.
    Updated(Resource),
    /// The resource was deleted.
    Deleted(Resource),
    /// Nothing to act on.
    NotFound(String),
}

impl Outcome {
    /// Whether the step changed remote state.
    #[must_use]
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created(_) | Self::Updated(_) | Self::Deleted(_))
    }

    /// The resource carried by the outcome, if any.
    #[must_use]
    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Self::Created(r) | Self::Unchanged(r) | Self::Updated(r) | Self::Deleted(r) => Some(r),
            Self::NotFound(_) => None,
        }
    }

    /// Short lowercase label ("created", "unchanged", ...).
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Unchanged(_) => "unchanged",
            Self::Updated(_) => "updated",
            Self::Deleted(_) => "deleted",
            Self::NotFound(_) => "not found",
        }
    }
}

fn de_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Number(u16),
        Text(String),
    }

    match PortRepr::deserialize(deserializer)? {
        PortRepr::Number(port) => Ok(port),
        PortRepr::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port {text:?}"))),
    }
}

fn de_null_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
