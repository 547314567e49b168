//! Reconciliation core for DaemonJobs.
//!
//! One parent resource, N per-node child jobs, continuously reconciled:
//! the engine re-derives the correct set of child jobs whenever the declared
//! intent, the node population, or the set of already-created jobs changes.
//! Event delivery is external; each inbound identity triggers exactly one
//! level-triggered pass.

pub mod config;
pub mod desired;
pub mod fanin;
pub mod reconciler;
pub mod status;

pub use reconciler::{DaemonJobReconciler, ReconcileError};
