use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::workflow::{ExecutionContext, ExecutionError, Graph, Node, RuntimeStatus};

pub const SUCCESS_MESSAGE: &str = "Workflow executed successfully";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub status: RuntimeStatus,
    pub payload: Value,
}

/// The outcome of one run: what gets persisted and shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    pub success: bool,
    pub message: String,

    /// Every node that executed; the last payload wins for nodes reached by
    /// more than one path
    pub node_results: BTreeMap<String, NodeResult>,

    pub final_context: ExecutionContext,

    /// Copy of the graph's nodes with `runtimeStatus` stamped
    pub nodes: Vec<Node>,

    /// Node ids in the order they were executed
    pub execution_order: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_node: Option<String>,
}

impl ExecutionTrace {
    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus::from_success(self.success)
    }

    pub fn node_status(&self, id: &str) -> Option<RuntimeStatus> {
        self.nodes.iter().find(|n| n.id == id).map(|n| n.runtime_status)
    }

    pub fn payload(&self, id: &str) -> Option<&Value> {
        self.node_results.get(id).map(|r| &r.payload)
    }
}

/// Mutable bookkeeping for a single run. Owns its own copy of the nodes so
/// concurrent runs of the same graph never share state.
#[derive(Debug)]
pub(crate) struct RunState {
    nodes: Vec<Node>,
    node_results: BTreeMap<String, NodeResult>,
    final_context: ExecutionContext,
    execution_order: Vec<String>,
}

impl RunState {
    pub(crate) fn new(graph: &Graph) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .cloned()
            .map(|mut node| {
                node.runtime_status = RuntimeStatus::Idle;
                node
            })
            .collect();

        Self {
            nodes,
            node_results: BTreeMap::new(),
            final_context: ExecutionContext::new(),
            execution_order: Vec::new(),
        }
    }

    pub(crate) fn mark_passed(&mut self, id: &str, payload: Value) {
        self.execution_order.push(id.to_string());
        self.set_status(id, RuntimeStatus::Passed);
        self.node_results.insert(
            id.to_string(),
            NodeResult {
                status: RuntimeStatus::Passed,
                payload,
            },
        );
    }

    /// Only ids present in the graph get a result entry; a missing node has
    /// nothing to annotate.
    pub(crate) fn mark_failed(&mut self, id: &str, error: &ExecutionError) {
        if !self.nodes.iter().any(|n| n.id == id) {
            return;
        }
        self.execution_order.push(id.to_string());
        self.set_status(id, RuntimeStatus::Failed);
        self.node_results.insert(
            id.to_string(),
            NodeResult {
                status: RuntimeStatus::Failed,
                payload: json!({ "status": "error", "error": error.to_string() }),
            },
        );
    }

    pub(crate) fn merge_terminal(&mut self, context: &ExecutionContext) {
        self.final_context.merge(context);
    }

    fn set_status(&mut self, id: &str, status: RuntimeStatus) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.runtime_status = status;
        }
    }

    pub(crate) fn finish(self, outcome: Result<(), ExecutionError>) -> ExecutionTrace {
        let (success, message, failed_node) = match outcome {
            Ok(()) => (true, SUCCESS_MESSAGE.to_string(), None),
            Err(e) => (false, e.to_string(), e.node_id().map(str::to_string)),
        };

        ExecutionTrace {
            success,
            message,
            node_results: self.node_results,
            final_context: self.final_context,
            nodes: self.nodes,
            execution_order: self.execution_order,
            failed_node,
        }
    }
}
