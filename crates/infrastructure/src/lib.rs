//! Infrastructure layer: in-memory cluster state.
//!
//! `InMemoryCluster` implements the `ClusterStateProvider` port with
//! versioned in-process stores, an owner index and a broadcast watch hub.
//! It backs the test suites and doubles as a reference for what a real
//! provider has to guarantee.

pub mod cluster;

#[cfg(test)]
mod tests;

pub use cluster::*;
