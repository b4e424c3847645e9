//! Idempotent reconciliation of load balancers, pools and nodes.
//!
//! A [`Session`] is one run against one scope: it fetches the load-balancer
//! listing once, then each `ensure_*` step compares desired and actual state
//! and issues at most one create, delete or bulk node update.
//!
//! Any remote failure aborts the run. Steps already applied are not rolled
//! back, and nothing is retried.

use crate::backend::Backend;
use crate::config::ApiConfig;
use crate::error::Result;
use crate::nodes::{add_nodes, remove_nodes, same_set};
use crate::request::{Report, Request, State};
use crate::resolver::{Listing, lookup_pool, lookup_pool_id};
use crate::telemetry::{Event, NoTelemetry, Telemetry};
use crate::types::{
    Method, NewLoadBalancer, NewPool, Node, NodeSpec, Outcome, Persistence, Resource, Scope,
    Status,
};
use std::thread;
use std::time::Duration;

/// Reason reported when the named load balancer does not exist.
pub const LOAD_BALANCER_NOT_FOUND: &str = "Load balancer doesn't exist";
/// Reason reported when no pool listens on the requested port.
pub const POOL_NOT_FOUND: &str = "Pool doesn't exist";

/// Default wait after creating a load balancer.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Tunables for a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Fixed pause after creating a load balancer.
    ///
    /// The API does not always resolve a freshly created load balancer right
    /// away, and pool creation needs it. This is a heuristic delay, not a
    /// visibility check. Zero disables it.
    pub settle_delay: Duration,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl ReconcileOptions {
    /// Set the settle delay.
    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// Entry point for reconciling load-balancer state.
///
/// # Example
///
/// ```
/// use lbkit::{MockBackend, ReconcileOptions, Reconciler, Request};
/// use std::time::Duration;
///
/// let reconciler = Reconciler::new(Box::new(MockBackend::new()))
///     .with_options(ReconcileOptions::default().settle_delay(Duration::ZERO));
///
/// let request = Request::new("test", "TEST", "WA1").port(443);
/// let report = reconciler.apply(&request).unwrap();
/// assert!(report.changed);
///
/// let again = reconciler.apply(&request).unwrap();
/// assert!(!again.changed);
/// ```
pub struct Reconciler {
    backend: Box<dyn Backend>,
    telemetry: Box<dyn Telemetry>,
    options: ReconcileOptions,
}

impl Reconciler {
    /// Create a reconciler over a backend, with no telemetry.
    #[must_use]
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            telemetry: Box::new(NoTelemetry),
            options: ReconcileOptions::default(),
        }
    }

    /// Create a reconciler talking to the CenturyLink Cloud API.
    pub fn connect(config: &ApiConfig) -> Result<Self> {
        let backend = crate::backend::clc::ClcBackend::new(config)?;
        Ok(Self::new(Box::new(backend)))
    }

    /// Report changes to a telemetry sink.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Box<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Replace the run options.
    #[must_use]
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// The backend in use.
    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Start a run against `scope`, fetching its load-balancer listing.
    pub fn session(&self, scope: Scope) -> Result<Session<'_>> {
        let listing = Listing::fetch(self.backend.as_ref(), &scope)?;
        Ok(Session {
            backend: self.backend.as_ref(),
            telemetry: self.telemetry.as_ref(),
            options: &self.options,
            scope,
            listing,
        })
    }

    /// Validate and reconcile one request in a fresh session.
    pub fn apply(&self, request: &Request) -> Result<Report> {
        request.validate()?;
        let mut session = self.session(request.scope())?;
        session.apply(request)
    }
}

/// Where a pool-level step found its target.
enum Located<T> {
    Found { lb_id: String, target: T },
    Missing(&'static str),
}

/// One reconciliation run bound to a scope and its cached listing.
pub struct Session<'a> {
    backend: &'a dyn Backend,
    telemetry: &'a dyn Telemetry,
    options: &'a ReconcileOptions,
    scope: Scope,
    listing: Listing,
}

impl Session<'_> {
    /// The scope of this run.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The cached load-balancer listing.
    #[must_use]
    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    /// Dispatch a request on its target state.
    pub fn apply(&mut self, request: &Request) -> Result<Report> {
        log::info!(
            "Reconciling load balancer {:?} in {} to {}",
            request.name,
            self.scope,
            request.state
        );

        match request.state {
            State::Present => self.apply_present(request),
            State::Absent => Ok(Report::single(
                self.ensure_load_balancer_absent(&request.name)?,
            )),
            State::PortAbsent => Ok(Report::single(
                self.ensure_pool_absent(&request.name, request.required_port()?)?,
            )),
            State::NodesPresent => Ok(Report::single(self.ensure_nodes_present(
                &request.name,
                request.required_port()?,
                &request.nodes,
            )?)),
            State::NodesAbsent => Ok(Report::single(self.ensure_nodes_absent(
                &request.name,
                request.required_port()?,
                &request.nodes,
            )?)),
        }
    }

    fn apply_present(&mut self, request: &Request) -> Result<Report> {
        let (lb, lb_id) = self.ensure_load_balancer_present(
            &request.name,
            request.description.as_deref(),
            request.status,
        )?;

        let Some(port) = request.port else {
            return Ok(Report::single(lb));
        };

        let (pool, pool_id) =
            self.ensure_pool_present(&lb_id, request.method, request.persistence, port)?;

        let nodes = if request.nodes.is_empty() {
            None
        } else {
            Some(self.replace_pool_nodes(&lb_id, &pool_id, &request.nodes)?)
        };

        Ok(Report::from_steps(lb, Some(pool), nodes))
    }

    /// Make sure a load balancer with `name` exists.
    ///
    /// Returns the outcome and the load balancer id. A created load balancer
    /// is followed by the configured settle delay and added to the cached
    /// listing, so calling this again in the same run is a no-op.
    pub fn ensure_load_balancer_present(
        &mut self,
        name: &str,
        description: Option<&str>,
        status: Status,
    ) -> Result<(Outcome, String)> {
        if let Some(lb) = self.listing.lookup_load_balancer(name)? {
            log::debug!("Load balancer {name:?} exists as {}", lb.id);
            return Ok((Outcome::Unchanged(Resource::LoadBalancer(lb.clone())), lb.id.clone()));
        }

        let spec = NewLoadBalancer {
            name: name.to_string(),
            description: description.unwrap_or(name).to_string(),
            status,
        };
        let lb = self.backend.create_load_balancer(&self.scope, &spec)?;
        log::info!("Created load balancer {name:?} ({})", lb.id);
        self.telemetry.record(Event::LoadBalancerCreated);
        self.settle();

        let id = lb.id.clone();
        self.listing.insert(lb.clone());
        Ok((Outcome::Created(Resource::LoadBalancer(lb)), id))
    }

    /// Make sure load balancer `lb_id` has a pool on `port`.
    ///
    /// Method and persistence apply only when creating and default to
    /// round robin and standard. An existing pool is returned unchanged even
    /// if its method or persistence differ.
    pub fn ensure_pool_present(
        &self,
        lb_id: &str,
        method: Option<Method>,
        persistence: Option<Persistence>,
        port: u16,
    ) -> Result<(Outcome, String)> {
        if let Some(pool) = lookup_pool(self.backend, &self.scope, lb_id, port)? {
            let id = pool.id.clone();
            return Ok((Outcome::Unchanged(Resource::Pool(pool)), id));
        }

        let spec = NewPool {
            port,
            method: method.unwrap_or_default(),
            persistence: persistence.unwrap_or_default(),
        };
        let pool = self.backend.create_pool(&self.scope, lb_id, &spec)?;
        log::info!("Created pool {} on port {port} of {lb_id}", pool.id);
        self.telemetry.record(Event::PoolCreated);

        let id = pool.id.clone();
        Ok((Outcome::Created(Resource::Pool(pool)), id))
    }

    /// Make sure no load balancer named `name` exists.
    pub fn ensure_load_balancer_absent(&mut self, name: &str) -> Result<Outcome> {
        let lb = match self.listing.lookup_load_balancer(name)? {
            Some(lb) => lb.clone(),
            None => return Ok(Outcome::NotFound(LOAD_BALANCER_NOT_FOUND.to_string())),
        };

        self.backend.delete_load_balancer(&self.scope, &lb.id)?;
        log::info!("Deleted load balancer {name:?} ({})", lb.id);
        self.telemetry.record(Event::LoadBalancerDeleted);
        self.listing.remove(&lb.id);

        Ok(Outcome::Deleted(Resource::LoadBalancer(lb)))
    }

    /// Make sure load balancer `name` has no pool on `port`.
    pub fn ensure_pool_absent(&self, name: &str, port: u16) -> Result<Outcome> {
        let located = self.locate_pool(name, |lb_id| lookup_pool(self.backend, &self.scope, lb_id, port))?;
        let (lb_id, pool) = match located {
            Located::Found { lb_id, target: pool } => (lb_id, pool),
            Located::Missing(reason) => return Ok(Outcome::NotFound(reason.to_string())),
        };

        self.backend.delete_pool(&self.scope, &lb_id, &pool.id)?;
        log::info!("Deleted pool {} on port {port} of {lb_id}", pool.id);
        self.telemetry.record(Event::PoolDeleted);

        Ok(Outcome::Deleted(Resource::Pool(pool)))
    }

    /// Make sure every node in `nodes` is a member of the pool on `port`.
    ///
    /// The resulting node list is always submitted, even if nothing changed.
    pub fn ensure_nodes_present(&self, name: &str, port: u16, nodes: &[NodeSpec]) -> Result<Outcome> {
        match self.locate_pool_id(name, port)? {
            Located::Found { lb_id, target: pool_id } => {
                self.update_nodes(&lb_id, &pool_id, |current| add_nodes(current, nodes))
            }
            Located::Missing(reason) => Ok(Outcome::NotFound(reason.to_string())),
        }
    }

    /// Make sure no node in `nodes` is a member of the pool on `port`.
    ///
    /// The resulting node list is always submitted, even if nothing changed.
    pub fn ensure_nodes_absent(&self, name: &str, port: u16, nodes: &[NodeSpec]) -> Result<Outcome> {
        match self.locate_pool_id(name, port)? {
            Located::Found { lb_id, target: pool_id } => {
                self.update_nodes(&lb_id, &pool_id, |current| remove_nodes(current, nodes))
            }
            Located::Missing(reason) => Ok(Outcome::NotFound(reason.to_string())),
        }
    }

    /// Make the pool hold exactly `nodes`.
    ///
    /// Counts as a change only if the node set differs from the current one.
    pub fn replace_pool_nodes(&self, lb_id: &str, pool_id: &str, nodes: &[NodeSpec]) -> Result<Outcome> {
        let mut desired: Vec<Node> = Vec::with_capacity(nodes.len());
        for node in nodes.iter().map(NodeSpec::materialize) {
            if !desired.contains(&node) {
                desired.push(node);
            }
        }

        self.update_nodes(lb_id, pool_id, move |current| {
            let changed = !same_set(current, &desired);
            (changed, desired)
        })
    }

    fn update_nodes<F>(&self, lb_id: &str, pool_id: &str, diff: F) -> Result<Outcome>
    where
        F: FnOnce(&[Node]) -> (bool, Vec<Node>),
    {
        let current = self.backend.list_nodes(&self.scope, lb_id, pool_id)?;
        let (changed, nodes) = diff(&current);

        self.backend.set_pool_nodes(&self.scope, lb_id, pool_id, &nodes)?;
        self.telemetry.record(Event::PoolModified);

        if changed {
            log::info!("Updated pool {pool_id}: {} -> {} nodes", current.len(), nodes.len());
            Ok(Outcome::Updated(Resource::Nodes(nodes)))
        } else {
            log::debug!("Pool {pool_id} nodes already match");
            Ok(Outcome::Unchanged(Resource::Nodes(nodes)))
        }
    }

    /// Resolve load balancer `name`, then its pool with `find`.
    fn locate_pool<T, F>(&self, name: &str, find: F) -> Result<Located<T>>
    where
        F: FnOnce(&str) -> Result<Option<T>>,
    {
        let Some(lb_id) = self.listing.lookup_load_balancer_id(name)? else {
            return Ok(Located::Missing(LOAD_BALANCER_NOT_FOUND));
        };

        Ok(match find(&lb_id)? {
            Some(target) => Located::Found { lb_id, target },
            None => Located::Missing(POOL_NOT_FOUND),
        })
    }

    fn locate_pool_id(&self, name: &str, port: u16) -> Result<Located<String>> {
        self.locate_pool(name, |lb_id| lookup_pool_id(self.backend, &self.scope, lb_id, port))
    }

    fn settle(&self) {
        let delay = self.options.settle_delay;
        if !delay.is_zero() {
            log::debug!("Waiting {delay:?} for the new load balancer to settle");
            thread::sleep(delay);
        }
    }
}
