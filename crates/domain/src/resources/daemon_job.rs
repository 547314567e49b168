//! DaemonJob - runs one job on every node matching the placement rule.

use super::job::JobSpec;
use super::meta::{ObjectMeta, OwnerReference, TemplateMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// DaemonJob is the declared intent: one child job per eligible node.
///
/// The spec is user-authored and never written by the controller; the status
/// subresource is the only field the controller persists.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonJob {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: DaemonJobSpec,
    #[serde(default)]
    pub status: DaemonJobStatus,
}

impl DaemonJob {
    pub const API_VERSION: &'static str = "daemon.justk8s.com/v1alpha1";
    pub const KIND: &'static str = "DaemonJob";

    /// Controller owner reference pointing at this DaemonJob, attached to
    /// every child job so the provider can index and garbage-collect them.
    pub fn controller_owner_ref(&self) -> OwnerReference {
        OwnerReference {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid,
            controller: true,
        }
    }
}

/// DaemonJobSpec defines the desired state of a DaemonJob.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonJobSpec {
    /// Specifies the job that will be created on each eligible node.
    pub job_template: JobTemplateSpec,
}

/// Template for the child jobs a DaemonJob stamps out.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobTemplateSpec {
    #[serde(default)]
    pub metadata: TemplateMeta,
    #[serde(default)]
    pub spec: JobSpec,
}

/// DaemonJobStatus defines the observed state of a DaemonJob.
///
/// All four counters are recomputed from scratch on every reconciliation,
/// so they self-heal after missed events.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonJobStatus {
    /// The total number of nodes that should be running the daemon job.
    #[serde(default)]
    pub desired_number_scheduled: i32,

    /// The number of child jobs that exist, whether in flight or finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_available: Option<i32>,

    /// The number of child jobs that completed successfully.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_jobs: Option<i32>,

    /// The number of child jobs that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_jobs: Option<i32>,
}

impl fmt::Display for DaemonJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "desired={} available={} completed={} failed={}",
            self.desired_number_scheduled,
            self.number_available.unwrap_or(0),
            self.completed_jobs.unwrap_or(0),
            self.failed_jobs.unwrap_or(0),
        )
    }
}
