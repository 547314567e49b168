//! Status aggregation: observed child jobs and nodes into the four counters.

use crate::desired::node_should_run_daemon_job;
use daemonjob_domain::resources::{DaemonJob, DaemonJobStatus, Job, JobConditionType, Node};

/// Compute the status summary for a DaemonJob from the observed children
/// and the current node set.
///
/// The desired count is recomputed directly from the placement predicate,
/// not reused from a cached desired set, so status reflects ground truth
/// even before job creation has run. Every observed child counts as
/// available; finished ones additionally count as completed or failed.
/// A node with no job is not detected as a distinct condition; the gap is
/// visible as `available < desired`.
pub fn daemon_job_status(
    daemon_job: &DaemonJob,
    child_jobs: &[Job],
    nodes: &[Node],
) -> DaemonJobStatus {
    let desired_number_scheduled = nodes
        .iter()
        .filter(|node| node_should_run_daemon_job(node, daemon_job))
        .count() as i32;

    let mut number_available = 0;
    let mut completed_jobs = 0;
    let mut failed_jobs = 0;

    for job in child_jobs {
        match job.finished_condition() {
            None => number_available += 1,
            Some(JobConditionType::Complete) => {
                number_available += 1;
                completed_jobs += 1;
            }
            Some(JobConditionType::Failed) => {
                number_available += 1;
                failed_jobs += 1;
            }
        }
    }

    DaemonJobStatus {
        desired_number_scheduled,
        number_available: Some(number_available),
        completed_jobs: Some(completed_jobs),
        failed_jobs: Some(failed_jobs),
    }
}

/// Field-wise comparison of the four counters.
///
/// Gates the status write: comparing only the counters avoids spurious
/// status churn from unrelated metadata differences.
pub fn status_changed(current: &DaemonJobStatus, computed: &DaemonJobStatus) -> bool {
    current.desired_number_scheduled != computed.desired_number_scheduled
        || current.number_available != computed.number_available
        || current.completed_jobs != computed.completed_jobs
        || current.failed_jobs != computed.failed_jobs
}

#[cfg(test)]
mod status_tests {
    use super::*;
    use daemonjob_domain::resources::{
        ConditionStatus, DaemonJobSpec, JobCondition, JobTemplateSpec,
    };

    fn test_node(name: &str) -> Node {
        let mut node = Node::default();
        node.metadata.name = name.to_string();
        node
    }

    fn test_daemon_job(name: &str) -> DaemonJob {
        let mut daemon_job = DaemonJob {
            spec: DaemonJobSpec {
                job_template: JobTemplateSpec::default(),
            },
            ..DaemonJob::default()
        };
        daemon_job.metadata.name = name.to_string();
        daemon_job.metadata.namespace = "default".to_string();
        daemon_job
    }

    fn test_job(name: &str, finished: Option<JobConditionType>) -> Job {
        let mut job = Job::default();
        job.metadata.name = name.to_string();
        if let Some(condition_type) = finished {
            job.status
                .conditions
                .push(JobCondition::new(condition_type, ConditionStatus::True));
        }
        job
    }

    #[test]
    fn test_counts_missing_running_and_completed() {
        // 3 desired, one job missing, one succeeded, one still running.
        let daemon_job = test_daemon_job("dj");
        let nodes = vec![test_node("n1"), test_node("n2"), test_node("n3")];
        let child_jobs = vec![
            test_job("dj-n1", Some(JobConditionType::Complete)),
            test_job("dj-n2", None),
        ];

        let status = daemon_job_status(&daemon_job, &child_jobs, &nodes);

        assert_eq!(status.desired_number_scheduled, 3);
        assert_eq!(status.number_available, Some(2));
        assert_eq!(status.completed_jobs, Some(1));
        assert_eq!(status.failed_jobs, Some(0));
    }

    #[test]
    fn test_failed_jobs_count_as_available() {
        let daemon_job = test_daemon_job("dj");
        let nodes = vec![test_node("n1")];
        let child_jobs = vec![test_job("dj-n1", Some(JobConditionType::Failed))];

        let status = daemon_job_status(&daemon_job, &child_jobs, &nodes);

        assert_eq!(status.number_available, Some(1));
        assert_eq!(status.failed_jobs, Some(1));
        assert_eq!(status.completed_jobs, Some(0));
    }

    #[test]
    fn test_false_condition_is_not_terminal() {
        let daemon_job = test_daemon_job("dj");
        let mut job = test_job("dj-n1", None);
        job.status.conditions.push(JobCondition::new(
            JobConditionType::Failed,
            ConditionStatus::False,
        ));

        let status = daemon_job_status(&daemon_job, &[job], &[test_node("n1")]);

        assert_eq!(status.number_available, Some(1));
        assert_eq!(status.failed_jobs, Some(0));
    }

    #[test]
    fn test_desired_counts_only_eligible_nodes() {
        let mut daemon_job = test_daemon_job("dj");
        daemon_job.spec.job_template.spec.template.spec.node_name = Some("n2".to_string());
        let nodes = vec![test_node("n1"), test_node("n2"), test_node("n3")];

        let status = daemon_job_status(&daemon_job, &[], &nodes);

        assert_eq!(status.desired_number_scheduled, 1);
        assert_eq!(status.number_available, Some(0));
    }

    #[test]
    fn test_status_changed_compares_counters_only() {
        let computed = DaemonJobStatus {
            desired_number_scheduled: 2,
            number_available: Some(2),
            completed_jobs: Some(0),
            failed_jobs: Some(0),
        };

        assert!(!status_changed(&computed.clone(), &computed));

        let fresh = DaemonJobStatus::default();
        assert!(status_changed(&fresh, &computed));

        let drifted = DaemonJobStatus {
            number_available: Some(1),
            ..computed.clone()
        };
        assert!(status_changed(&drifted, &computed));
    }
}
