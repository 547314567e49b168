//! Unit tests for the in-memory cluster state.

use crate::cluster::InMemoryCluster;
use daemonjob_domain::cluster::{
    ClusterError, ClusterStateProvider, EventType, JobOwnerExtractor, ResourceKind,
};
use daemonjob_domain::resources::{DaemonJob, DaemonJobStatus, Job, Node, OwnerReference};
use daemonjob_domain::shared_kernel::NamespacedName;
use std::sync::Arc;

fn test_daemon_job(name: &str) -> DaemonJob {
    let mut daemon_job = DaemonJob::default();
    daemon_job.metadata.name = name.to_string();
    daemon_job.metadata.namespace = "default".to_string();
    daemon_job
}

fn test_node(name: &str) -> Node {
    let mut node = Node::default();
    node.metadata.name = name.to_string();
    node
}

fn owned_test_job(name: &str, owner_name: &str) -> Job {
    let mut job = Job::default();
    job.metadata.name = name.to_string();
    job.metadata.namespace = "default".to_string();
    job.metadata.owner_references.push(OwnerReference {
        api_version: DaemonJob::API_VERSION.to_string(),
        kind: DaemonJob::KIND.to_string(),
        name: owner_name.to_string(),
        uid: None,
        controller: true,
    });
    job
}

/// Extraction function equivalent to the controller's: controller owner of
/// the DaemonJob kind, by name.
fn daemon_job_owner_extractor() -> JobOwnerExtractor {
    Arc::new(|job: &Job| {
        let owner = job.metadata.controller_ref()?;
        if owner.api_version != DaemonJob::API_VERSION || owner.kind != DaemonJob::KIND {
            return None;
        }
        Some(owner.name.clone())
    })
}

mod store_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_daemon_job_roundtrip() {
        let cluster = InMemoryCluster::new();
        let stored = cluster.upsert_daemon_job(test_daemon_job("dj"));

        let found = cluster
            .get_daemon_job(&NamespacedName::new("default", "dj"))
            .await
            .unwrap();

        let found = found.unwrap();
        assert_eq!(found.metadata.name, "dj");
        assert_eq!(found.metadata.resource_version, stored.metadata.resource_version);
        assert!(found.metadata.uid.is_some());
    }

    #[tokio::test]
    async fn test_get_daemon_job_not_found_is_none() {
        let cluster = InMemoryCluster::new();
        let found = cluster
            .get_daemon_job(&NamespacedName::new("default", "missing"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_list_nodes_ordered_by_name() {
        let cluster = InMemoryCluster::new();
        cluster.upsert_node(test_node("b"));
        cluster.upsert_node(test_node("a"));
        cluster.upsert_node(test_node("c"));

        let names: Vec<String> = cluster
            .list_nodes()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.metadata.name)
            .collect();

        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_create_job_twice_is_already_exists() {
        let cluster = InMemoryCluster::new();

        cluster.create_job(owned_test_job("dj-n1", "dj")).await.unwrap();
        let err = cluster
            .create_job(owned_test_job("dj-n1", "dj"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClusterError::AlreadyExists { .. }));
        assert_eq!(cluster.list_jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_create_failure_fires_once() {
        let cluster = InMemoryCluster::new();
        cluster.fail_next_create();

        let err = cluster
            .create_job(owned_test_job("dj-n1", "dj"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Transient { .. }));

        cluster.create_job(owned_test_job("dj-n1", "dj")).await.unwrap();
        assert_eq!(cluster.list_jobs().len(), 1);
    }
}

mod status_update_tests {
    use super::*;

    fn counted_status(available: i32) -> DaemonJobStatus {
        DaemonJobStatus {
            desired_number_scheduled: available,
            number_available: Some(available),
            completed_jobs: Some(0),
            failed_jobs: Some(0),
        }
    }

    #[tokio::test]
    async fn test_status_update_with_current_version_succeeds() {
        let cluster = InMemoryCluster::new();
        let stored = cluster.upsert_daemon_job(test_daemon_job("dj"));
        let id = stored.metadata.namespaced_name();

        cluster
            .update_daemon_job_status(&id, counted_status(1), stored.metadata.resource_version)
            .await
            .unwrap();

        let updated = cluster.get_daemon_job(&id).await.unwrap().unwrap();
        assert_eq!(updated.status.number_available, Some(1));
        assert!(updated.metadata.resource_version > stored.metadata.resource_version);
    }

    #[tokio::test]
    async fn test_status_update_with_stale_version_conflicts() {
        let cluster = InMemoryCluster::new();
        let stored = cluster.upsert_daemon_job(test_daemon_job("dj"));
        let id = stored.metadata.namespaced_name();
        let stale = stored.metadata.resource_version;

        cluster
            .update_daemon_job_status(&id, counted_status(1), stale)
            .await
            .unwrap();

        let err = cluster
            .update_daemon_job_status(&id, counted_status(2), stale)
            .await
            .unwrap_err();

        assert!(matches!(err, ClusterError::VersionConflict { .. }));
        let current = cluster.get_daemon_job(&id).await.unwrap().unwrap();
        assert_eq!(current.status.number_available, Some(1));
    }

    #[tokio::test]
    async fn test_status_update_of_missing_daemon_job_is_not_found() {
        let cluster = InMemoryCluster::new();
        let err = cluster
            .update_daemon_job_status(&NamespacedName::new("default", "gone"), counted_status(0), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::NotFound { .. }));
    }
}

mod owner_index_tests {
    use super::*;

    #[tokio::test]
    async fn test_owned_jobs_are_indexed_on_create() {
        let cluster = InMemoryCluster::new();
        cluster.register_job_owner_index(daemon_job_owner_extractor());

        cluster.create_job(owned_test_job("dj-n2", "dj")).await.unwrap();
        cluster.create_job(owned_test_job("dj-n1", "dj")).await.unwrap();
        cluster.create_job(owned_test_job("other-n1", "other")).await.unwrap();

        let owned = cluster
            .list_owned_jobs(&NamespacedName::new("default", "dj"))
            .await
            .unwrap();

        let names: Vec<&str> = owned.iter().map(|j| j.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["dj-n1", "dj-n2"]);
    }

    #[tokio::test]
    async fn test_index_is_rebuilt_for_preexisting_jobs() {
        let cluster = InMemoryCluster::new();
        cluster.create_job(owned_test_job("dj-n1", "dj")).await.unwrap();

        cluster.register_job_owner_index(daemon_job_owner_extractor());

        let owned = cluster
            .list_owned_jobs(&NamespacedName::new("default", "dj"))
            .await
            .unwrap();
        assert_eq!(owned.len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_owner_is_never_indexed() {
        let cluster = InMemoryCluster::new();
        cluster.register_job_owner_index(daemon_job_owner_extractor());

        let mut foreign = Job::default();
        foreign.metadata.name = "dj-n1".to_string();
        foreign.metadata.namespace = "default".to_string();
        foreign.metadata.owner_references.push(OwnerReference {
            api_version: "batch/v1".to_string(),
            kind: "CronJob".to_string(),
            name: "dj".to_string(),
            uid: None,
            controller: true,
        });
        cluster.create_job(foreign).await.unwrap();

        let owned = cluster
            .list_owned_jobs(&NamespacedName::new("default", "dj"))
            .await
            .unwrap();
        assert!(owned.is_empty());
    }

    #[tokio::test]
    async fn test_deleted_jobs_leave_the_index() {
        let cluster = InMemoryCluster::new();
        cluster.register_job_owner_index(daemon_job_owner_extractor());
        cluster.create_job(owned_test_job("dj-n1", "dj")).await.unwrap();

        cluster.delete_job(&NamespacedName::new("default", "dj-n1"));

        let owned = cluster
            .list_owned_jobs(&NamespacedName::new("default", "dj"))
            .await
            .unwrap();
        assert!(owned.is_empty());
    }
}

mod watch_tests {
    use super::*;

    #[tokio::test]
    async fn test_node_events_are_delivered() {
        let cluster = InMemoryCluster::new();
        let mut events = cluster.subscribe(ResourceKind::Node);

        cluster.upsert_node(test_node("n1"));
        cluster.remove_node("n1");

        let added = events.recv().await.unwrap();
        assert_eq!(added.kind, ResourceKind::Node);
        assert_eq!(added.event_type, EventType::Added);
        assert_eq!(added.identity, NamespacedName::cluster_scoped("n1"));

        let deleted = events.recv().await.unwrap();
        assert_eq!(deleted.event_type, EventType::Deleted);
    }

    #[tokio::test]
    async fn test_job_events_carry_owner_identity() {
        let cluster = InMemoryCluster::new();
        cluster.register_job_owner_index(daemon_job_owner_extractor());
        let mut events = cluster.subscribe(ResourceKind::Job);

        cluster.create_job(owned_test_job("dj-n1", "dj")).await.unwrap();
        cluster.delete_job(&NamespacedName::new("default", "dj-n1"));

        let added = events.recv().await.unwrap();
        assert_eq!(added.event_type, EventType::Added);
        assert_eq!(added.owner, Some(NamespacedName::new("default", "dj")));

        let deleted = events.recv().await.unwrap();
        assert_eq!(deleted.event_type, EventType::Deleted);
        assert_eq!(deleted.owner, Some(NamespacedName::new("default", "dj")));
    }

    #[tokio::test]
    async fn test_daemon_job_events_are_delivered() {
        let cluster = InMemoryCluster::new();
        let mut events = cluster.subscribe(ResourceKind::DaemonJob);

        let stored = cluster.upsert_daemon_job(test_daemon_job("dj"));
        let id = stored.metadata.namespaced_name();

        let added = events.recv().await.unwrap();
        assert_eq!(added.event_type, EventType::Added);
        assert_eq!(added.identity, id);
    }
}
