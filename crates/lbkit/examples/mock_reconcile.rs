//! Example: reconcile against the in-memory backend
//!
//! Run with: cargo run -p lbkit --example mock_reconcile

use lbkit::{MockBackend, NodeSpec, ReconcileOptions, Reconciler, Request, State};
use std::time::Duration;

fn main() {
    println!("Load balancer reconcile (mock)");
    println!("==============================\n");

    let mock = MockBackend::new();
    let reconciler = Reconciler::new(Box::new(mock.clone()))
        .with_options(ReconcileOptions::default().settle_delay(Duration::ZERO));

    let steps = [
        Request::new("test", "TEST", "WA1")
            .port(443)
            .nodes(vec![NodeSpec::new("10.11.22.123", 80)]),
        Request::new("test", "TEST", "WA1").port(443),
        Request::new("test", "TEST", "WA1")
            .port(443)
            .nodes(vec![NodeSpec::new("10.11.22.234", 80)])
            .state(State::NodesPresent),
        Request::new("test", "TEST", "WA1")
            .port(443)
            .nodes(vec![NodeSpec::new("10.11.22.123", 80)])
            .state(State::NodesAbsent),
        Request::new("test", "TEST", "WA1").state(State::Absent),
    ];

    for request in &steps {
        match reconciler.apply(request) {
            Ok(report) => println!(
                "{:<14} changed={:<5} {}",
                request.state,
                report.changed,
                report.loadbalancer.label()
            ),
            Err(e) => {
                eprintln!("{:<14} failed: {e}", request.state);
                std::process::exit(1);
            }
        }
    }

    println!("\nMutating calls:");
    for op in mock.mutations() {
        println!("  {op}");
    }
}
