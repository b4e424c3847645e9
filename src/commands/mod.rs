// Reconcile one request
pub mod apply;

// Read-only inventory
pub mod list;
