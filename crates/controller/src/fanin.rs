//! Event fan-in: resolving watch events back to the owning DaemonJob.

use daemonjob_domain::cluster::ClusterStateProvider;
use daemonjob_domain::resources::{DaemonJob, Job};
use daemonjob_domain::shared_kernel::NamespacedName;
use tracing::error;

/// Owner-index extraction function, installed into the provider via
/// `register_job_owner_index`.
///
/// Resolves a child job to the name of the DaemonJob that controls it.
/// Only the controller owner reference counts, and only when its declared
/// kind and API group match this controller's parent type exactly, so a
/// same-named owner of an unrelated kind never lands in the index.
pub fn job_owner_key(job: &Job) -> Option<String> {
    let owner = job.metadata.controller_ref()?;
    if owner.api_version != DaemonJob::API_VERSION || owner.kind != DaemonJob::KIND {
        return None;
    }
    Some(owner.name.clone())
}

/// Node fan-in: a node has no owner reference, so any node topology change
/// maps to every currently known DaemonJob. Intentionally coarse; the cost
/// is bounded by the number of parents, not nodes.
///
/// A list failure degrades to an empty mapping with a logged error - the
/// next node or parent event re-triggers delivery.
pub async fn daemon_jobs_for_node_event(
    cluster: &dyn ClusterStateProvider,
) -> Vec<NamespacedName> {
    match cluster.list_daemon_jobs().await {
        Ok(daemon_jobs) => daemon_jobs
            .iter()
            .map(|dj| dj.metadata.namespaced_name())
            .collect(),
        Err(error) => {
            error!(%error, "unable to list DaemonJobs for node event");
            Vec::new()
        }
    }
}
