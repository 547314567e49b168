//! Node - a member of the execution surface the fan-out targets.

use super::meta::ObjectMeta;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A cluster node. Read-only from the controller's perspective; its
/// lifecycle is fully owned by cluster infrastructure.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub metadata: ObjectMeta,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}
