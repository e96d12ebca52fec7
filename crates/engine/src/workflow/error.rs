use thiserror::Error;

/// Everything that can stop a run. The engine never lets one of these escape;
/// it is folded into the trace's `message` and `failedNode`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("No start node found")]
    MissingStartNode,

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("API call failed at node {node_id}: {reason}")]
    ApiCallFailed { node_id: String, reason: String },

    #[error("Email delivery failed at node {node_id}: {reason}")]
    EmailFailed { node_id: String, reason: String },

    #[error("Unknown node kind '{kind}' at node {node_id}")]
    UnknownNodeKind { node_id: String, kind: String },

    #[error("Cycle detected: node {0} is reachable from itself")]
    CycleDetected(String),
}

impl ExecutionError {
    /// The node this failure is attributed to.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            ExecutionError::MissingStartNode => None,
            ExecutionError::NodeNotFound(id) | ExecutionError::CycleDetected(id) => Some(id),
            ExecutionError::ApiCallFailed { node_id, .. }
            | ExecutionError::EmailFailed { node_id, .. }
            | ExecutionError::UnknownNodeKind { node_id, .. } => Some(node_id),
        }
    }
}
