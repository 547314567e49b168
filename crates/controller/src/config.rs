//! Controller-wide constants.

/// Annotation recording which node a child job targets.
pub const NODE_NAME_ANNOTATION: &str = "daemon.justk8s.com/node-name";

/// Node selector key injected to force execution onto one specific node.
pub const HOSTNAME_SELECTOR_KEY: &str = "kubernetes.io/hostname";
