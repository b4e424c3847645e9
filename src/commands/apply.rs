//! `clc-lb apply`: reconcile one request against the API.

use anyhow::Result;
use lbkit::{ApiConfig, Outcome, ReconcileOptions, Reconciler, Report, Request, Resource};

use crate::Context;
use crate::cli::ApplyArgs;
use crate::config;
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let request = config::build_request(args)?;

    let mut options = ReconcileOptions::default();
    if let Some(delay) = config::settle_delay(args) {
        options = options.settle_delay(delay);
    }

    let api = ApiConfig::from_env()?;
    let reconciler = Reconciler::connect(&api)?
        .with_options(options)
        .with_telemetry(config::telemetry_from_env());

    let report = reconciler.apply(&request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(ctx, &request, &report);
    }
    Ok(())
}

fn print_report(ctx: &Context, request: &Request, report: &Report) {
    if !ctx.quiet {
        ui::header(&format!(
            "{} {} in {}",
            request.state,
            request.name,
            request.scope()
        ));
    }

    print_step(&report.loadbalancer);
    for step in [&report.pool, &report.nodes].into_iter().flatten() {
        print_step(step);
    }

    if report.changed {
        ui::success("Changes applied");
    } else if !ctx.quiet {
        ui::dim("No changes");
    }
}

fn print_step(outcome: &Outcome) {
    let Some(resource) = outcome.resource() else {
        if let Outcome::NotFound(reason) = outcome {
            ui::warn(reason);
        }
        return;
    };

    let line = format!("{} {}: {}", kind(resource), outcome.label(), describe(resource));
    if outcome.is_change() {
        ui::success(&line);
    } else {
        ui::info(&line);
    }
}

fn kind(resource: &Resource) -> &'static str {
    match resource {
        Resource::LoadBalancer(_) => "Load balancer",
        Resource::Pool(_) => "Pool",
        Resource::Nodes(_) => "Nodes",
    }
}

fn describe(resource: &Resource) -> String {
    match resource {
        Resource::LoadBalancer(lb) => format!("{} ({})", lb.name, lb.id),
        Resource::Pool(pool) => format!(
            "port {} {} ({}, {})",
            pool.port, pool.id, pool.method, pool.persistence
        ),
        Resource::Nodes(nodes) => ui::node_list(nodes),
    }
}
