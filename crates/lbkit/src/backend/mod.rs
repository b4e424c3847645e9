//! Backend traits and implementations for the load-balancer API.
//!
//! This module provides the [`Backend`] trait, the contract the reconciler
//! uses to read and change remote state, and two implementations:
//! [`clc::ClcBackend`] talks to the CenturyLink Cloud v2 API over HTTPS, and
//! [`MockBackend`] keeps everything in memory.
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use lbkit::backend::{Backend, MockBackend};
//! use lbkit::{NewLoadBalancer, Scope, Status};
//!
//! let mock = MockBackend::new();
//! let scope = Scope::new("TEST", "WA1");
//! let lb = mock
//!     .create_load_balancer(&scope, &NewLoadBalancer {
//!         name: "test".to_string(),
//!         description: "test".to_string(),
//!         status: Status::Enabled,
//!     })
//!     .unwrap();
//!
//! let listed = mock.list_load_balancers(&scope).unwrap();
//! assert_eq!(listed, vec![lb]);
//! ```

pub mod clc;

use crate::error::{Error, Result};
use crate::types::{LoadBalancer, NewLoadBalancer, NewPool, Node, Operation, Pool, Scope};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Remote calls against the load-balancer/pool/node API.
///
/// Every call is synchronous. Any failure is fatal to the reconciliation run
/// and carries the [`Operation`] that failed.
pub trait Backend: Send + Sync {
    /// List all load balancers in a scope.
    fn list_load_balancers(&self, scope: &Scope) -> Result<Vec<LoadBalancer>>;

    /// List the pools of a load balancer.
    fn list_pools(&self, scope: &Scope, lb_id: &str) -> Result<Vec<Pool>>;

    /// List the nodes of a pool.
    fn list_nodes(&self, scope: &Scope, lb_id: &str, pool_id: &str) -> Result<Vec<Node>>;

    /// Create a load balancer and return the record the API assigned.
    fn create_load_balancer(&self, scope: &Scope, spec: &NewLoadBalancer) -> Result<LoadBalancer>;

    /// Create a pool on a load balancer.
    fn create_pool(&self, scope: &Scope, lb_id: &str, spec: &NewPool) -> Result<Pool>;

    /// Delete a load balancer together with its pools.
    fn delete_load_balancer(&self, scope: &Scope, lb_id: &str) -> Result<()>;

    /// Delete a pool.
    fn delete_pool(&self, scope: &Scope, lb_id: &str, pool_id: &str) -> Result<()>;

    /// Replace the complete node set of a pool.
    ///
    /// The API has no incremental add/remove endpoint; whatever is passed
    /// here becomes the pool's node set.
    fn set_pool_nodes(&self, scope: &Scope, lb_id: &str, pool_id: &str, nodes: &[Node]) -> Result<()>;
}

/// A call observed by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Which operation was invoked.
    pub operation: Operation,
    /// Scope the call was addressed to.
    pub scope: Scope,
    /// Node set submitted, for [`Operation::SetPoolNodes`].
    pub nodes: Option<Vec<Node>>,
}

#[derive(Debug, Default)]
struct MockState {
    load_balancers: Vec<(Scope, LoadBalancer)>,
    pools: HashMap<String, Vec<Pool>>,
    nodes: HashMap<(String, String), Vec<Node>>,
    calls: Vec<Call>,
    fail_on: Option<Operation>,
    next_id: u64,
}

impl MockState {
    fn record(&mut self, operation: Operation, scope: &Scope, nodes: Option<Vec<Node>>) -> Result<()> {
        self.calls.push(Call {
            operation,
            scope: scope.clone(),
            nodes,
        });
        if self.fail_on == Some(operation) {
            return Err(Error::transport(operation, "injected failure", Some(500)));
        }
        Ok(())
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{:04}", self.next_id)
    }

    fn has_load_balancer(&self, scope: &Scope, lb_id: &str) -> bool {
        self.load_balancers
            .iter()
            .any(|(s, lb)| s == scope && lb.id == lb_id)
    }

    fn has_pool(&self, lb_id: &str, pool_id: &str) -> bool {
        self.pools
            .get(lb_id)
            .is_some_and(|pools| pools.iter().any(|p| p.id == pool_id))
    }
}

fn not_found(operation: Operation, what: &str) -> Error {
    Error::transport(operation, format!("HTTP 404: {what} not found"), Some(404))
}

/// Mock backend for testing without network access.
///
/// State lives behind an `Arc`, so a clone handed to the reconciler and the
/// clone kept by the test observe the same load balancers and call log.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an existing load balancer.
    pub fn add_load_balancer(&self, scope: &Scope, lb: LoadBalancer) {
        self.state().load_balancers.push((scope.clone(), lb));
    }

    /// Seed an existing pool on a load balancer.
    pub fn add_pool(&self, lb_id: &str, pool: Pool) {
        self.state().pools.entry(lb_id.to_string()).or_default().push(pool);
    }

    /// Seed the node set of a pool.
    pub fn put_nodes(&self, lb_id: &str, pool_id: &str, nodes: Vec<Node>) {
        self.state()
            .nodes
            .insert((lb_id.to_string(), pool_id.to_string()), nodes);
    }

    /// Make every call of `operation` fail with a transport error.
    pub fn fail_on(&self, operation: Operation) {
        self.state().fail_on = Some(operation);
    }

    /// Current node set of a pool.
    #[must_use]
    pub fn nodes(&self, lb_id: &str, pool_id: &str) -> Vec<Node> {
        self.state()
            .nodes
            .get(&(lb_id.to_string(), pool_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Current pools of a load balancer.
    #[must_use]
    pub fn pools(&self, lb_id: &str) -> Vec<Pool> {
        self.state().pools.get(lb_id).cloned().unwrap_or_default()
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Number of calls of one operation.
    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Operations that changed state, in order.
    #[must_use]
    pub fn mutations(&self) -> Vec<Operation> {
        self.state()
            .calls
            .iter()
            .map(|c| c.operation)
            .filter(Operation::is_mutation)
            .collect()
    }
}

impl Backend for MockBackend {
    fn list_load_balancers(&self, scope: &Scope) -> Result<Vec<LoadBalancer>> {
        let mut state = self.state();
        state.record(Operation::ListLoadBalancers, scope, None)?;
        Ok(state
            .load_balancers
            .iter()
            .filter(|(s, _)| s == scope)
            .map(|(_, lb)| lb.clone())
            .collect())
    }

    fn list_pools(&self, scope: &Scope, lb_id: &str) -> Result<Vec<Pool>> {
        let mut state = self.state();
        state.record(Operation::ListPools, scope, None)?;
        if !state.has_load_balancer(scope, lb_id) {
            return Err(not_found(Operation::ListPools, "load balancer"));
        }
        Ok(state.pools.get(lb_id).cloned().unwrap_or_default())
    }

    fn list_nodes(&self, scope: &Scope, lb_id: &str, pool_id: &str) -> Result<Vec<Node>> {
        let mut state = self.state();
        state.record(Operation::ListNodes, scope, None)?;
        if !state.has_pool(lb_id, pool_id) {
            return Err(not_found(Operation::ListNodes, "pool"));
        }
        Ok(state
            .nodes
            .get(&(lb_id.to_string(), pool_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn create_load_balancer(&self, scope: &Scope, spec: &NewLoadBalancer) -> Result<LoadBalancer> {
        let mut state = self.state();
        state.record(Operation::CreateLoadBalancer, scope, None)?;
        let lb = LoadBalancer {
            id: state.next_id("lb"),
            name: spec.name.clone(),
            description: spec.description.clone(),
            status: spec.status,
            ip_address: None,
        };
        state.load_balancers.push((scope.clone(), lb.clone()));
        Ok(lb)
    }

    fn create_pool(&self, scope: &Scope, lb_id: &str, spec: &NewPool) -> Result<Pool> {
        let mut state = self.state();
        state.record(Operation::CreatePool, scope, None)?;
        if !state.has_load_balancer(scope, lb_id) {
            return Err(not_found(Operation::CreatePool, "load balancer"));
        }
        let pool = Pool {
            id: state.next_id("pool"),
            port: spec.port,
            method: spec.method,
            persistence: spec.persistence,
        };
        state.pools.entry(lb_id.to_string()).or_default().push(pool.clone());
        Ok(pool)
    }

    fn delete_load_balancer(&self, scope: &Scope, lb_id: &str) -> Result<()> {
        let mut state = self.state();
        state.record(Operation::DeleteLoadBalancer, scope, None)?;
        if !state.has_load_balancer(scope, lb_id) {
            return Err(not_found(Operation::DeleteLoadBalancer, "load balancer"));
        }
        state
            .load_balancers
            .retain(|(s, lb)| !(s == scope && lb.id == lb_id));
        state.pools.remove(lb_id);
        state.nodes.retain(|(lb, _), _| lb != lb_id);
        Ok(())
    }

    fn delete_pool(&self, scope: &Scope, lb_id: &str, pool_id: &str) -> Result<()> {
        let mut state = self.state();
        state.record(Operation::DeletePool, scope, None)?;
        if !state.has_pool(lb_id, pool_id) {
            return Err(not_found(Operation::DeletePool, "pool"));
        }
        if let Some(pools) = state.pools.get_mut(lb_id) {
            pools.retain(|p| p.id != pool_id);
        }
        state.nodes.remove(&(lb_id.to_string(), pool_id.to_string()));
        Ok(())
    }

    fn set_pool_nodes(&self, scope: &Scope, lb_id: &str, pool_id: &str, nodes: &[Node]) -> Result<()> {
        let mut state = self.state();
        state.record(Operation::SetPoolNodes, scope, Some(nodes.to_vec()))?;
        if !state.has_pool(lb_id, pool_id) {
            return Err(not_found(Operation::SetPoolNodes, "pool"));
        }
        state
            .nodes
            .insert((lb_id.to_string(), pool_id.to_string()), nodes.to_vec());
        Ok(())
    }
}
