//! # lbkit
//!
//! Pure Rust library for reconciling CenturyLink Cloud shared load balancers.
//!
//! Callers describe the desired state of a load balancer, one of its pools
//! and that pool's nodes. The library compares it with what the API reports
//! and issues only the create, delete and node-update calls needed to close
//! the gap. Running the same request twice changes nothing the second time.
//!
//! ## Example
//!
//! ```
//! use lbkit::{MockBackend, NodeSpec, ReconcileOptions, Reconciler, Request, State};
//! use std::time::Duration;
//!
//! let reconciler = Reconciler::new(Box::new(MockBackend::new()))
//!     .with_options(ReconcileOptions::default().settle_delay(Duration::ZERO));
//!
//! // Load balancer "test" with a pool on 443 holding one node
//! let request = Request::new("test", "TEST", "WA1")
//!     .port(443)
//!     .nodes(vec![NodeSpec::new("10.11.22.123", 80)]);
//! assert!(reconciler.apply(&request).unwrap().changed);
//!
//! // Add a second node
//! let request = request
//!     .nodes(vec![NodeSpec::new("10.11.22.234", 80)])
//!     .state(State::NodesPresent);
//! assert!(reconciler.apply(&request).unwrap().changed);
//! ```
//!
//! ## Target states
//!
//! | State           | Effect                                            |
//! |-----------------|---------------------------------------------------|
//! | `present`       | load balancer exists; pool and nodes if given     |
//! | `absent`        | load balancer is deleted                          |
//! | `port_absent`   | pool on the port is deleted                       |
//! | `nodes_present` | given nodes are added to the pool                 |
//! | `nodes_absent`  | given nodes are removed from the pool             |
//!
//! Against the real API, build the reconciler with [`Reconciler::connect`]
//! and an [`ApiConfig`] read from the environment:
//!
//! ```no_run
//! use lbkit::{ApiConfig, Reconciler, Request};
//!
//! let config = ApiConfig::from_env().expect("credentials");
//! let reconciler = Reconciler::connect(&config).expect("login");
//! let report = reconciler.apply(&Request::new("web", "ACCT", "WA1")).expect("apply");
//! println!("changed: {}", report.changed);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod error;
pub mod nodes;
pub mod reconciler;
pub mod request;
pub mod resolver;
pub mod telemetry;
pub mod types;

pub use backend::clc::ClcBackend;
pub use backend::{Backend, MockBackend};
pub use config::{ApiConfig, Credentials};
pub use error::{Error, ErrorCategory, Result};
pub use reconciler::{ReconcileOptions, Reconciler, Session};
pub use request::{Report, Request, State};
pub use telemetry::{Event, GraphiteTelemetry, NoTelemetry, Telemetry};
pub use types::{
    LoadBalancer, Method, NewLoadBalancer, NewPool, Node, NodeSpec, Operation, Outcome,
    Persistence, Pool, Resource, Scope, Status,
};
