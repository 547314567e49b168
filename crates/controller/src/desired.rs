//! Desired-state computation: which child jobs should exist right now.

use crate::config::{HOSTNAME_SELECTOR_KEY, NODE_NAME_ANNOTATION};
use daemonjob_domain::resources::{DaemonJob, Job, Node, ObjectMeta};

/// Placement predicate: a node should run the daemon job unless the job
/// template pins an explicit node name that differs. An empty or absent
/// constraint matches every node.
pub fn node_should_run_daemon_job(node: &Node, daemon_job: &DaemonJob) -> bool {
    match daemon_job
        .spec
        .job_template
        .spec
        .template
        .spec
        .node_name
        .as_deref()
    {
        None | Some("") => true,
        Some(pinned) => pinned == node.name(),
    }
}

/// Deterministic child job name for a (DaemonJob, node) pair. Stable across
/// reconciliations, so recomputation always yields the same identity for
/// the same desired job.
pub fn child_job_name(daemon_job: &DaemonJob, node_name: &str) -> String {
    format!("{}-{}", daemon_job.metadata.name, node_name)
}

/// Compute the set of jobs that should exist for `daemon_job`, one per
/// eligible node.
///
/// Each job gets a deep copy of the template spec, the template's labels and
/// annotations, the target-node annotation, and a node selector pinning it
/// to its node (overwriting any template-set value for that key; the
/// placement guarantee must hold regardless of template content). Owner
/// references are the caller's to set.
///
/// Zero eligible nodes yields an empty set; an unsatisfiable constraint is
/// not an error.
pub fn desired_jobs(daemon_job: &DaemonJob, nodes: &[Node]) -> Vec<Job> {
    let template = &daemon_job.spec.job_template;

    nodes
        .iter()
        .filter(|node| node_should_run_daemon_job(node, daemon_job))
        .map(|node| {
            let mut job = Job {
                metadata: ObjectMeta {
                    name: child_job_name(daemon_job, node.name()),
                    namespace: daemon_job.metadata.namespace.clone(),
                    labels: template.metadata.labels.clone(),
                    annotations: template.metadata.annotations.clone(),
                    ..ObjectMeta::default()
                },
                spec: template.spec.clone(),
                status: Default::default(),
            };
            job.metadata
                .annotations
                .insert(NODE_NAME_ANNOTATION.to_string(), node.name().to_string());
            job.spec
                .template
                .spec
                .node_selector
                .insert(HOSTNAME_SELECTOR_KEY.to_string(), node.name().to_string());
            job
        })
        .collect()
}
