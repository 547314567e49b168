//! Shared builders for the integration suites.
#![allow(dead_code)]

use daemonjob_domain::resources::{
    ConditionStatus, Container, DaemonJob, JobCondition, JobConditionType, JobStatus, Node,
};

/// A DaemonJob in namespace `default` with an unconstrained busybox template.
pub fn test_daemon_job(name: &str) -> DaemonJob {
    let mut daemon_job = DaemonJob::default();
    daemon_job.metadata.name = name.to_string();
    daemon_job.metadata.namespace = "default".to_string();
    daemon_job
        .spec
        .job_template
        .spec
        .template
        .spec
        .containers
        .push(Container {
            name: "test".to_string(),
            image: Some("busybox".to_string()),
            command: vec!["date".to_string()],
            ..Container::default()
        });
    daemon_job
        .spec
        .job_template
        .spec
        .template
        .spec
        .restart_policy = Some("OnFailure".to_string());
    daemon_job
}

pub fn test_node(name: &str) -> Node {
    let mut node = Node::default();
    node.metadata.name = name.to_string();
    node.metadata
        .labels
        .insert("kubernetes.io/hostname".to_string(), name.to_string());
    node
}

/// A job status carrying a terminal condition with status True.
pub fn finished_status(condition_type: JobConditionType) -> JobStatus {
    JobStatus {
        conditions: vec![JobCondition::new(condition_type, ConditionStatus::True)],
        ..JobStatus::default()
    }
}
