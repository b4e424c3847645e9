use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use lbkit::{Method, NodeSpec, Persistence, State, Status};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clc-lb")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Idempotent management of CenturyLink Cloud shared load balancers", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile a load balancer, pool and nodes to the requested state
    Apply(ApplyArgs),

    /// List load balancers with their pools and nodes
    List(ListArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Args, Default)]
pub struct ApplyArgs {
    /// Load balancer name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Account alias
    #[arg(short, long)]
    pub alias: Option<String>,

    /// Datacenter location (e.g. WA1)
    #[arg(short, long)]
    pub location: Option<String>,

    /// Description used when creating the load balancer (defaults to the name)
    #[arg(short, long)]
    pub description: Option<String>,

    /// Pool port: 80 or 443
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Pool balancing method: roundRobin, leastConnection or sticky
    #[arg(short, long)]
    pub method: Option<Method>,

    /// Pool persistence: standard or sticky
    #[arg(long)]
    pub persistence: Option<Persistence>,

    /// Pool node as IP:PORT or IP:PORT:STATUS (repeatable)
    #[arg(long = "node", value_name = "IP:PORT[:STATUS]")]
    pub nodes: Vec<NodeSpec>,

    /// Load balancer status used when creating: enabled or disabled
    #[arg(long)]
    pub status: Option<Status>,

    /// Target state: present, absent, port_absent, nodes_present, nodes_absent
    #[arg(short, long)]
    pub state: Option<State>,

    /// Read the request from a TOML or JSON file; flags override its values
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Wait after creating a load balancer, in milliseconds
    #[arg(long, value_name = "MS", env = "CLC_LB_SETTLE_MS")]
    pub settle_ms: Option<u64>,
}

// ============================================================================
// List
// ============================================================================

#[derive(Args)]
pub struct ListArgs {
    /// Account alias
    #[arg(short, long)]
    pub alias: String,

    /// Datacenter location (e.g. WA1)
    #[arg(short, long)]
    pub location: String,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}
