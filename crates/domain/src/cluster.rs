//! ClusterStateProvider - the boundary to the cluster.
//!
//! The reconciliation core consumes cluster state exclusively through this
//! port. Real watch delivery, storage, schema validation and leader election
//! live behind it; tests plug in an in-memory implementation.

use crate::resources::{DaemonJob, DaemonJobStatus, Job, Node};
use crate::shared_kernel::NamespacedName;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Errors surfaced by a cluster state provider.
///
/// `NotFound` on a parent read and `AlreadyExists` on a child create are
/// benign to the reconciler; everything else is retryable and bubbles up so
/// the event-delivery layer can reschedule with its own backoff.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClusterError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: NamespacedName },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: ResourceKind, id: NamespacedName },

    #[error("version conflict on {id}: expected {expected}, current {current}")]
    VersionConflict {
        id: NamespacedName,
        expected: u64,
        current: u64,
    },

    #[error("transient provider error: {message}")]
    Transient { message: String },
}

pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// The three resource kinds the controller works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    DaemonJob,
    Job,
    Node,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::DaemonJob => write!(f, "DaemonJob"),
            ResourceKind::Job => write!(f, "Job"),
            ResourceKind::Node => write!(f, "Node"),
        }
    }
}

/// What happened to a watched object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
}

/// One entry of a provider's change stream.
///
/// Carries enough identity to resolve the affected parent: for job events
/// the provider stamps `owner` using the registered owner-index extraction
/// function (last-known object for deletions); node and DaemonJob events
/// leave it empty.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ResourceKind,
    pub event_type: EventType,
    pub identity: NamespacedName,
    pub owner: Option<NamespacedName>,
}

/// Extraction function installed by the controller: resolves a child job to
/// the name of the owning parent, or `None` when the job is unowned or owned
/// by a foreign kind. The provider keeps its owner index current with it.
pub type JobOwnerExtractor = Arc<dyn Fn(&Job) -> Option<String> + Send + Sync>;

/// Read/watch/write access to DaemonJobs, their child jobs, and nodes.
#[async_trait]
pub trait ClusterStateProvider: Send + Sync {
    async fn get_daemon_job(&self, id: &NamespacedName) -> ClusterResult<Option<DaemonJob>>;

    async fn list_daemon_jobs(&self) -> ClusterResult<Vec<DaemonJob>>;

    /// All nodes, unfiltered, ordered by name.
    async fn list_nodes(&self) -> ClusterResult<Vec<Node>>;

    /// Child jobs owned by the given DaemonJob, served from the owner index
    /// rather than a full scan, ordered by name.
    async fn list_owned_jobs(&self, owner: &NamespacedName) -> ClusterResult<Vec<Job>>;

    /// Create a child job. Fails with `AlreadyExists` when an object with
    /// the same identity is present.
    async fn create_job(&self, job: Job) -> ClusterResult<()>;

    /// Status-only compare-and-swap update of a DaemonJob. Fails with
    /// `VersionConflict` when the object has moved past `expected_version`.
    async fn update_daemon_job_status(
        &self,
        id: &NamespacedName,
        status: DaemonJobStatus,
        expected_version: u64,
    ) -> ClusterResult<()>;

    /// Install the owner-index extraction function. The provider applies it
    /// to every child job it sees from then on.
    fn register_job_owner_index(&self, extract: JobOwnerExtractor);

    /// Subscribe to the change stream of one resource kind.
    fn subscribe(&self, kind: ResourceKind) -> broadcast::Receiver<ChangeEvent>;
}
