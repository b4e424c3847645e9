use crate::cli::ApplyArgs;
use anyhow::{Context, Result, bail};
use lbkit::{GraphiteTelemetry, Method, NodeSpec, NoTelemetry, Persistence, Request, State, Status, Telemetry};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Graphite `host:port` to push change counters to.
pub const ENV_METRICS_ADDR: &str = "CLC_LB_METRICS_ADDR";
/// Metric path prefix.
pub const ENV_METRICS_PREFIX: &str = "CLC_LB_METRICS_PREFIX";

const DEFAULT_METRICS_PREFIX: &str = "stats_counts.clc";

// ============================================================================
// Request file
// ============================================================================

/// A request as written in a TOML or JSON file.
///
/// Every field is optional so that command-line flags can supply or
/// override any of them.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestFile {
    pub name: Option<String>,
    pub alias: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub port: Option<u16>,
    pub method: Option<Method>,
    pub persistence: Option<Persistence>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    pub status: Option<Status>,
    pub state: Option<State>,
}

impl RequestFile {
    /// Load a request file, picking the format from the extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display())),
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display())),
            _ => bail!(
                "Unsupported request file {}: expected .toml or .json",
                path.display()
            ),
        }
    }
}

/// Build the request from `--file` (if any) and the command-line flags.
///
/// Flags win over file values. Nodes given on the command line replace the
/// file's node list rather than extending it.
pub fn build_request(args: &ApplyArgs) -> Result<Request> {
    let file = match &args.file {
        Some(path) => RequestFile::load(path)?,
        None => RequestFile::default(),
    };

    let nodes = if args.nodes.is_empty() {
        file.nodes
    } else {
        args.nodes.clone()
    };

    let request = Request {
        name: args.name.clone().or(file.name).unwrap_or_default(),
        alias: args.alias.clone().or(file.alias).unwrap_or_default(),
        location: args.location.clone().or(file.location).unwrap_or_default(),
        description: args.description.clone().or(file.description),
        port: args.port.or(file.port),
        method: args.method.or(file.method),
        persistence: args.persistence.or(file.persistence),
        nodes,
        status: args.status.or(file.status).unwrap_or_default(),
        state: args.state.or(file.state).unwrap_or_default(),
    };

    request.validate().context("Invalid request")?;
    Ok(request)
}

// ============================================================================
// Run settings
// ============================================================================

/// Settle delay from `--settle-ms` (or `CLC_LB_SETTLE_MS`).
pub fn settle_delay(args: &ApplyArgs) -> Option<Duration> {
    args.settle_ms.map(Duration::from_millis)
}

/// Telemetry sink configured from the environment.
pub fn telemetry_from_env() -> Box<dyn Telemetry> {
    match metrics_sink(|key| std::env::var(key).ok()) {
        Some(sink) => Box::new(sink),
        None => Box::new(NoTelemetry),
    }
}

fn metrics_sink<F>(lookup: F) -> Option<GraphiteTelemetry>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let addr = non_empty(ENV_METRICS_ADDR)?;
    let prefix = non_empty(ENV_METRICS_PREFIX).unwrap_or_else(|| DEFAULT_METRICS_PREFIX.to_string());
    log::debug!("Pushing change counters to {addr} under {prefix}");
    Some(GraphiteTelemetry::new(addr, prefix))
}
