//! Top-level reconciliation of declared node configuration against the
//! running workload. Each configuration event triggers one pass that diffs
//! the desired state against durable stored state, applies ordered
//! install/migrate/reconfigure/start steps, and reports a coarse unit
//! status.

pub mod actions;
mod config;
mod controller;
mod state;
mod status;

pub use config::DesiredConfig;
pub use controller::{Controller, ReconcileOutcome};
pub use state::{RelayEndpointSet, StateStore};
pub use status::UnitStatus;
