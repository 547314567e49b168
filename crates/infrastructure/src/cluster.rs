//! In-memory implementation of the ClusterStateProvider port.

use async_trait::async_trait;
use daemonjob_domain::cluster::{
    ChangeEvent, ClusterError, ClusterResult, ClusterStateProvider, EventType, JobOwnerExtractor,
    ResourceKind,
};
use daemonjob_domain::resources::{DaemonJob, DaemonJobStatus, Job, JobStatus, Node};
use daemonjob_domain::shared_kernel::NamespacedName;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

/// Tunables for the in-memory provider.
#[derive(Debug, Clone)]
pub struct InMemoryClusterConfig {
    /// Capacity of each per-kind watch channel. Slow subscribers that fall
    /// further behind than this lose events, exactly like a real watch that
    /// has to be re-listed.
    pub event_buffer: usize,
}

impl Default for InMemoryClusterConfig {
    fn default() -> Self {
        Self { event_buffer: 64 }
    }
}

#[derive(Default)]
struct ClusterState {
    daemon_jobs: HashMap<NamespacedName, DaemonJob>,
    jobs: HashMap<NamespacedName, Job>,
    nodes: BTreeMap<String, Node>,
    /// Owner index: parent identity -> identities of the jobs it owns.
    owned_jobs: HashMap<NamespacedName, BTreeSet<NamespacedName>>,
    last_resource_version: u64,
}

impl ClusterState {
    fn next_resource_version(&mut self) -> u64 {
        self.last_resource_version += 1;
        self.last_resource_version
    }
}

/// In-memory cluster state with versioned stores, an owner index kept
/// current through the registered extraction function, and a broadcast
/// watch hub per resource kind.
///
/// All mutating entry points stamp a fresh `resource_version`, so the
/// compare-and-swap semantics of `update_daemon_job_status` behave like a
/// real apiserver's optimistic concurrency.
#[derive(Clone)]
pub struct InMemoryCluster {
    state: Arc<RwLock<ClusterState>>,
    owner_extractor: Arc<RwLock<Option<JobOwnerExtractor>>>,
    daemon_job_events: broadcast::Sender<ChangeEvent>,
    job_events: broadcast::Sender<ChangeEvent>,
    node_events: broadcast::Sender<ChangeEvent>,
    fail_next_create: Arc<AtomicBool>,
    fail_next_status_update: Arc<AtomicBool>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::with_config(InMemoryClusterConfig::default())
    }

    pub fn with_config(config: InMemoryClusterConfig) -> Self {
        let (daemon_job_events, _) = broadcast::channel(config.event_buffer);
        let (job_events, _) = broadcast::channel(config.event_buffer);
        let (node_events, _) = broadcast::channel(config.event_buffer);
        Self {
            state: Arc::new(RwLock::new(ClusterState::default())),
            owner_extractor: Arc::new(RwLock::new(None)),
            daemon_job_events,
            job_events,
            node_events,
            fail_next_create: Arc::new(AtomicBool::new(false)),
            fail_next_status_update: Arc::new(AtomicBool::new(false)),
        }
    }

    // ------------------------------------------------------------------
    // Seeding / test surface
    // ------------------------------------------------------------------

    /// Create or replace a DaemonJob, assigning uid and resource version.
    /// Returns the stored copy.
    pub fn upsert_daemon_job(&self, mut daemon_job: DaemonJob) -> DaemonJob {
        let mut state = self.state.write().unwrap();
        if daemon_job.metadata.uid.is_none() {
            daemon_job.metadata.uid = Some(uuid::Uuid::new_v4());
        }
        daemon_job.metadata.resource_version = state.next_resource_version();

        let id = daemon_job.metadata.namespaced_name();
        let event_type = if state.daemon_jobs.contains_key(&id) {
            EventType::Modified
        } else {
            EventType::Added
        };
        state.daemon_jobs.insert(id.clone(), daemon_job.clone());
        drop(state);

        self.emit(ResourceKind::DaemonJob, event_type, id, None);
        daemon_job
    }

    pub fn delete_daemon_job(&self, id: &NamespacedName) -> Option<DaemonJob> {
        let removed = self.state.write().unwrap().daemon_jobs.remove(id);
        if removed.is_some() {
            self.emit(ResourceKind::DaemonJob, EventType::Deleted, id.clone(), None);
        }
        removed
    }

    /// Create or replace a node, assigning uid and resource version.
    pub fn upsert_node(&self, mut node: Node) -> Node {
        let mut state = self.state.write().unwrap();
        if node.metadata.uid.is_none() {
            node.metadata.uid = Some(uuid::Uuid::new_v4());
        }
        node.metadata.resource_version = state.next_resource_version();

        let name = node.metadata.name.clone();
        let event_type = if state.nodes.contains_key(&name) {
            EventType::Modified
        } else {
            EventType::Added
        };
        state.nodes.insert(name.clone(), node.clone());
        drop(state);

        self.emit(
            ResourceKind::Node,
            event_type,
            NamespacedName::cluster_scoped(name),
            None,
        );
        node
    }

    pub fn remove_node(&self, name: &str) -> Option<Node> {
        let removed = self.state.write().unwrap().nodes.remove(name);
        if removed.is_some() {
            self.emit(
                ResourceKind::Node,
                EventType::Deleted,
                NamespacedName::cluster_scoped(name),
                None,
            );
        }
        removed
    }

    pub fn get_job(&self, id: &NamespacedName) -> Option<Job> {
        self.state.read().unwrap().jobs.get(id).cloned()
    }

    /// All jobs, ordered by identity.
    pub fn list_jobs(&self) -> Vec<Job> {
        let state = self.state.read().unwrap();
        let mut jobs: Vec<Job> = state.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.metadata.namespaced_name().cmp(&b.metadata.namespaced_name()));
        jobs
    }

    /// Out-of-band job removal, as a user or cascading deletion would do it.
    pub fn delete_job(&self, id: &NamespacedName) -> Option<Job> {
        let mut state = self.state.write().unwrap();
        let removed = state.jobs.remove(id)?;
        let owner = self.owner_of(&removed);
        if let Some(owner_id) = &owner {
            if let Some(owned) = state.owned_jobs.get_mut(owner_id) {
                owned.remove(id);
            }
        }
        drop(state);

        self.emit(ResourceKind::Job, EventType::Deleted, id.clone(), owner);
        Some(removed)
    }

    /// Overwrite a job's status, as the job's own execution machinery would.
    pub fn update_job_status(&self, id: &NamespacedName, status: JobStatus) -> ClusterResult<()> {
        let mut state = self.state.write().unwrap();
        let version = state.next_resource_version();
        let job = state.jobs.get_mut(id).ok_or_else(|| ClusterError::NotFound {
            kind: ResourceKind::Job,
            id: id.clone(),
        })?;
        job.status = status;
        job.metadata.resource_version = version;
        let owner = self.owner_of(job);
        drop(state);

        self.emit(ResourceKind::Job, EventType::Modified, id.clone(), owner);
        Ok(())
    }

    /// Make the next `create_job` call fail with a transient error.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Make the next `update_daemon_job_status` call fail with a transient
    /// error.
    pub fn fail_next_status_update(&self) {
        self.fail_next_status_update.store(true, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn owner_of(&self, job: &Job) -> Option<NamespacedName> {
        let guard = self.owner_extractor.read().unwrap();
        let extract = guard.as_ref()?;
        extract(job).map(|owner_name| NamespacedName::new(job.metadata.namespace.clone(), owner_name))
    }

    fn emit(
        &self,
        kind: ResourceKind,
        event_type: EventType,
        identity: NamespacedName,
        owner: Option<NamespacedName>,
    ) {
        let sender = match kind {
            ResourceKind::DaemonJob => &self.daemon_job_events,
            ResourceKind::Job => &self.job_events,
            ResourceKind::Node => &self.node_events,
        };
        // No subscribers is fine; events are best-effort notifications.
        let _ = sender.send(ChangeEvent {
            kind,
            event_type,
            identity,
            owner,
        });
    }
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterStateProvider for InMemoryCluster {
    async fn get_daemon_job(&self, id: &NamespacedName) -> ClusterResult<Option<DaemonJob>> {
        Ok(self.state.read().unwrap().daemon_jobs.get(id).cloned())
    }

    async fn list_daemon_jobs(&self) -> ClusterResult<Vec<DaemonJob>> {
        let state = self.state.read().unwrap();
        let mut daemon_jobs: Vec<DaemonJob> = state.daemon_jobs.values().cloned().collect();
        daemon_jobs
            .sort_by(|a, b| a.metadata.namespaced_name().cmp(&b.metadata.namespaced_name()));
        Ok(daemon_jobs)
    }

    async fn list_nodes(&self) -> ClusterResult<Vec<Node>> {
        Ok(self.state.read().unwrap().nodes.values().cloned().collect())
    }

    async fn list_owned_jobs(&self, owner: &NamespacedName) -> ClusterResult<Vec<Job>> {
        let state = self.state.read().unwrap();
        let owned = match state.owned_jobs.get(owner) {
            Some(owned) => owned,
            None => return Ok(Vec::new()),
        };
        Ok(owned
            .iter()
            .filter_map(|job_id| state.jobs.get(job_id).cloned())
            .collect())
    }

    async fn create_job(&self, mut job: Job) -> ClusterResult<()> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(ClusterError::Transient {
                message: "injected create failure".to_string(),
            });
        }

        let id = job.metadata.namespaced_name();
        let mut state = self.state.write().unwrap();
        if state.jobs.contains_key(&id) {
            return Err(ClusterError::AlreadyExists {
                kind: ResourceKind::Job,
                id,
            });
        }

        job.metadata.uid = Some(uuid::Uuid::new_v4());
        job.metadata.resource_version = state.next_resource_version();

        let owner = self.owner_of(&job);
        if let Some(owner_id) = &owner {
            state
                .owned_jobs
                .entry(owner_id.clone())
                .or_default()
                .insert(id.clone());
        }
        state.jobs.insert(id.clone(), job);
        drop(state);

        debug!(job = %id, "created Job");
        self.emit(ResourceKind::Job, EventType::Added, id, owner);
        Ok(())
    }

    async fn update_daemon_job_status(
        &self,
        id: &NamespacedName,
        status: DaemonJobStatus,
        expected_version: u64,
    ) -> ClusterResult<()> {
        if self.fail_next_status_update.swap(false, Ordering::SeqCst) {
            return Err(ClusterError::Transient {
                message: "injected status update failure".to_string(),
            });
        }

        let mut state = self.state.write().unwrap();
        let version = state.next_resource_version();
        let daemon_job =
            state
                .daemon_jobs
                .get_mut(id)
                .ok_or_else(|| ClusterError::NotFound {
                    kind: ResourceKind::DaemonJob,
                    id: id.clone(),
                })?;

        if daemon_job.metadata.resource_version != expected_version {
            return Err(ClusterError::VersionConflict {
                id: id.clone(),
                expected: expected_version,
                current: daemon_job.metadata.resource_version,
            });
        }

        daemon_job.status = status;
        daemon_job.metadata.resource_version = version;
        drop(state);

        self.emit(ResourceKind::DaemonJob, EventType::Modified, id.clone(), None);
        Ok(())
    }

    fn register_job_owner_index(&self, extract: JobOwnerExtractor) {
        *self.owner_extractor.write().unwrap() = Some(extract);

        // Rebuild the index so jobs that existed before registration are
        // indexed too.
        let mut state = self.state.write().unwrap();
        let jobs: Vec<Job> = state.jobs.values().cloned().collect();
        state.owned_jobs.clear();
        for job in jobs {
            if let Some(owner_id) = self.owner_of(&job) {
                state
                    .owned_jobs
                    .entry(owner_id)
                    .or_default()
                    .insert(job.metadata.namespaced_name());
            }
        }
    }

    fn subscribe(&self, kind: ResourceKind) -> broadcast::Receiver<ChangeEvent> {
        match kind {
            ResourceKind::DaemonJob => self.daemon_job_events.subscribe(),
            ResourceKind::Job => self.job_events.subscribe(),
            ResourceKind::Node => self.node_events.subscribe(),
        }
    }
}
