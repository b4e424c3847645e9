//! Existence lookups for load balancers and pools.
//!
//! Load balancers are resolved against a [`Listing`] fetched once per run;
//! pools are always listed fresh from the API.
//!
//! Lookups and the actions that follow them are not atomic. If another
//! process creates or deletes the same named resource between the lookup and
//! the create/delete call, this run acts on stale information. There is no
//! distributed lock; reconciliation is at-most-once per invocation.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{LoadBalancer, Pool, Scope};

/// Cached load-balancer listing for one scope.
///
/// Never refreshed from the API. Records created or deleted through the
/// owning session are applied locally so later steps of the same run see
/// them.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    load_balancers: Vec<LoadBalancer>,
}

impl Listing {
    /// Fetch the listing for a scope.
    pub fn fetch(backend: &dyn Backend, scope: &Scope) -> Result<Self> {
        let load_balancers = backend.list_load_balancers(scope)?;
        log::debug!("Fetched {} load balancers in {scope}", load_balancers.len());
        Ok(Self { load_balancers })
    }

    /// Build a listing from known records.
    #[must_use]
    pub fn from_records(load_balancers: Vec<LoadBalancer>) -> Self {
        Self { load_balancers }
    }

    /// All cached records.
    #[must_use]
    pub fn records(&self) -> &[LoadBalancer] {
        &self.load_balancers
    }

    /// Find the load balancer with exactly this name (case-sensitive).
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousName`] if more than one record matches.
    pub fn lookup_load_balancer(&self, name: &str) -> Result<Option<&LoadBalancer>> {
        let mut matches = self.load_balancers.iter().filter(|lb| lb.name == name);
        let first = matches.next();
        let extra = matches.count();
        if extra > 0 {
            return Err(Error::AmbiguousName {
                name: name.to_string(),
                count: extra + 1,
            });
        }
        Ok(first)
    }

    /// Id of the load balancer with this name.
    pub fn lookup_load_balancer_id(&self, name: &str) -> Result<Option<String>> {
        Ok(self.lookup_load_balancer(name)?.map(|lb| lb.id.clone()))
    }

    /// Record a load balancer created during this run.
    pub fn insert(&mut self, lb: LoadBalancer) {
        self.load_balancers.push(lb);
    }

    /// Forget a load balancer deleted during this run.
    pub fn remove(&mut self, lb_id: &str) {
        self.load_balancers.retain(|lb| lb.id != lb_id);
    }
}

/// Find the pool listening on `port`, listing pools fresh from the API.
///
/// Ports are compared as integers, so a pool the API reports with port
/// `"443"` matches a request for `443`. Should the API ever report two pools
/// on one port, the last one wins.
pub fn lookup_pool(backend: &dyn Backend, scope: &Scope, lb_id: &str, port: u16) -> Result<Option<Pool>> {
    let pools = backend.list_pools(scope, lb_id)?;
    let found = pools.into_iter().rev().find(|pool| pool.port == port);
    log::debug!(
        "Pool on port {port} of {lb_id}: {}",
        found.as_ref().map_or("none", |p| p.id.as_str())
    );
    Ok(found)
}

/// Id of the pool listening on `port`.
pub fn lookup_pool_id(backend: &dyn Backend, scope: &Scope, lb_id: &str, port: u16) -> Result<Option<String>> {
    Ok(lookup_pool(backend, scope, lb_id, port)?.map(|pool| pool.id))
}
