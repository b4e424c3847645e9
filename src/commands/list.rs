//! `clc-lb list`: read-only inventory of a scope.

use anyhow::{Context as _, Result};
use colored::Colorize;
use lbkit::resolver::Listing;
use lbkit::{ApiConfig, Backend, LoadBalancer, Node, Pool, Reconciler, Scope};
use serde::Serialize;

use crate::Context;
use crate::cli::ListArgs;
use crate::ui;

#[derive(Debug, Serialize)]
struct PoolEntry {
    #[serde(flatten)]
    pool: Pool,
    nodes: Vec<Node>,
}

#[derive(Debug, Serialize)]
struct LoadBalancerEntry {
    #[serde(flatten)]
    load_balancer: LoadBalancer,
    pools: Vec<PoolEntry>,
}

pub fn run(ctx: &Context, args: &ListArgs) -> Result<()> {
    let scope = Scope::new(args.alias.as_str(), args.location.as_str());
    let api = ApiConfig::from_env()?;
    let reconciler = Reconciler::connect(&api)?;

    let inventory = collect(reconciler.backend(), &scope)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
        return Ok(());
    }

    print_inventory(ctx, &scope, &inventory);
    Ok(())
}

fn collect(backend: &dyn Backend, scope: &Scope) -> Result<Vec<LoadBalancerEntry>> {
    let listing = Listing::fetch(backend, scope)?;
    let mut inventory = Vec::new();

    for load_balancer in listing.records().iter().cloned() {
        let mut pools = Vec::new();
        for pool in backend.list_pools(scope, &load_balancer.id)? {
            let nodes = backend
                .list_nodes(scope, &load_balancer.id, &pool.id)
                .with_context(|| format!("Listing nodes of pool {}", pool.id))?;
            pools.push(PoolEntry { pool, nodes });
        }
        inventory.push(LoadBalancerEntry {
            load_balancer,
            pools,
        });
    }

    inventory.sort_by(|a, b| a.load_balancer.name.cmp(&b.load_balancer.name));
    Ok(inventory)
}

fn print_inventory(ctx: &Context, scope: &Scope, inventory: &[LoadBalancerEntry]) {
    if !ctx.quiet {
        ui::header(&format!("Load balancers in {scope}"));
    }

    if inventory.is_empty() {
        ui::dim("No load balancers");
        return;
    }

    for entry in inventory {
        let lb = &entry.load_balancer;
        ui::section(&lb.name);
        ui::kv("Id", &lb.id);
        ui::kv("Status", &lb.status.to_string());
        if let Some(ip) = &lb.ip_address {
            ui::kv("Address", ip);
        }
        if !lb.description.is_empty() && lb.description != lb.name {
            ui::kv("Description", &lb.description);
        }

        if entry.pools.is_empty() {
            ui::dim("no pools");
        }
        for pool in &entry.pools {
            ui::kv(
                &format!("Pool {}", pool.pool.port),
                &format!(
                    "{} {} -> {}",
                    pool.pool.method,
                    pool.pool.persistence.to_string().dimmed(),
                    ui::node_list(&pool.nodes)
                ),
            );
        }
    }
}
