//! The reconciliation engine: one level-triggered pass per inbound identity.

use crate::desired::desired_jobs;
use crate::fanin::job_owner_key;
use crate::status::{daemon_job_status, status_changed};
use daemonjob_domain::cluster::{ClusterError, ClusterStateProvider};
use daemonjob_domain::resources::{DaemonJob, Job};
use daemonjob_domain::shared_kernel::NamespacedName;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A reconciliation pass failed and should be re-delivered.
///
/// Every variant is retryable; backoff is owned by the event-delivery
/// layer, not by the engine.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("unable to read cluster state: {0}")]
    Read(#[source] ClusterError),

    #[error("unable to update DaemonJob status: {0}")]
    StatusUpdate(#[source] ClusterError),

    #[error("{failed} of {attempted} desired Job creates failed, first error: {first}")]
    CreateJobs {
        attempted: usize,
        failed: usize,
        #[source]
        first: ClusterError,
    },
}

/// Reconciles one DaemonJob identity per call.
///
/// The engine is re-entrant and stateless across invocations: all state a
/// pass needs is re-read at its start, so redundant, concurrent and stale
/// deliveries of the same identity each independently converge.
pub struct DaemonJobReconciler {
    cluster: Arc<dyn ClusterStateProvider>,
}

impl DaemonJobReconciler {
    /// Wires the reconciler to a provider and installs the owner-index
    /// extraction function so indexed child lookups work from the start.
    pub fn new(cluster: Arc<dyn ClusterStateProvider>) -> Self {
        cluster.register_job_owner_index(Arc::new(job_owner_key));
        Self { cluster }
    }

    /// Perform one reconciliation pass for the given DaemonJob identity.
    ///
    /// A missing parent is success: the object was deleted and child
    /// cleanup is the provider's cascading deletion, not ours. The pass
    /// does no re-queue scheduling of its own; if convergence is
    /// incomplete, re-delivery of the same identity finishes the work.
    pub async fn reconcile(&self, id: &NamespacedName) -> Result<(), ReconcileError> {
        info!(daemon_job = %id, "reconciling DaemonJob");

        let Some(daemon_job) = self
            .cluster
            .get_daemon_job(id)
            .await
            .map_err(ReconcileError::Read)?
        else {
            debug!(daemon_job = %id, "DaemonJob no longer exists, nothing to do");
            return Ok(());
        };

        let child_jobs = self
            .cluster
            .list_owned_jobs(id)
            .await
            .map_err(ReconcileError::Read)?;

        let nodes = self.cluster.list_nodes().await.map_err(ReconcileError::Read)?;

        // Status visibility takes priority over spawning more work: a failed
        // status write aborts the pass before any creates.
        let status = daemon_job_status(&daemon_job, &child_jobs, &nodes);
        if status_changed(&daemon_job.status, &status) {
            info!(daemon_job = %id, %status, "updating DaemonJob status");
            self.cluster
                .update_daemon_job_status(id, status, daemon_job.metadata.resource_version)
                .await
                .map_err(ReconcileError::StatusUpdate)?;
        }

        let desired = desired_jobs(&daemon_job, &nodes);
        self.create_missing_jobs(&daemon_job, desired, &child_jobs)
            .await
    }

    /// Create every desired job not present among the observed children,
    /// matched by deterministic name.
    ///
    /// `AlreadyExists` is absorbed as success - it is how duplicate and
    /// overlapping passes collapse into one create. Any other failure is
    /// accumulated and the remaining creates are still attempted; partial
    /// progress is preferred over none.
    async fn create_missing_jobs(
        &self,
        daemon_job: &DaemonJob,
        desired: Vec<Job>,
        observed: &[Job],
    ) -> Result<(), ReconcileError> {
        let observed_names: HashSet<&str> =
            observed.iter().map(|job| job.metadata.name.as_str()).collect();

        let mut attempted = 0;
        let mut failures = Vec::new();

        for mut job in desired {
            if observed_names.contains(job.metadata.name.as_str()) {
                continue;
            }
            attempted += 1;

            job.metadata
                .owner_references
                .push(daemon_job.controller_owner_ref());

            let job_id = job.metadata.namespaced_name();
            match self.cluster.create_job(job).await {
                Ok(()) => {
                    debug!(job = %job_id, "created desired Job");
                }
                Err(ClusterError::AlreadyExists { .. }) => {
                    debug!(job = %job_id, "desired Job already exists");
                }
                Err(err) => {
                    error!(job = %job_id, error = %err, "unable to create desired Job");
                    failures.push(err);
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            let failed = failures.len();
            Err(ReconcileError::CreateJobs {
                attempted,
                failed,
                first: failures.swap_remove(0),
            })
        }
    }
}
