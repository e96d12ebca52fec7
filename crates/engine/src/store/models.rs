use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::workflow::{Edge, Graph, Node, RuntimeStatus};

// Stored workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,

    // Last execution outcome, written only by the runner
    pub status: RuntimeStatus,
    pub last_run: Option<DateTime<Utc>>,

    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>, graph: Graph) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            owner_id: owner_id.into(),
            status: RuntimeStatus::Idle,
            last_run: None,
            nodes: graph.nodes,
            edges: graph.edges,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn graph(&self) -> Graph {
        Graph::new(self.nodes.clone(), self.edges.clone())
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Option<Vec<Node>>,
    #[serde(default)]
    pub edges: Option<Vec<Edge>>,

    #[serde(skip)]
    pub status: Option<RuntimeStatus>,
    #[serde(skip)]
    pub last_run: Option<DateTime<Utc>>,
}

impl WorkflowUpdate {
    /// The update the runner applies after an execution.
    pub fn run_outcome(status: RuntimeStatus, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(status),
            last_run: Some(at),
            ..Self::default()
        }
    }

    pub fn apply(self, workflow: &mut Workflow) {
        if let Some(name) = self.name {
            workflow.name = name;
        }
        if let Some(description) = self.description {
            workflow.description = Some(description);
        }
        if let Some(nodes) = self.nodes {
            workflow.nodes = nodes;
        }
        if let Some(edges) = self.edges {
            workflow.edges = edges;
        }
        if let Some(status) = self.status {
            workflow.status = status;
        }
        if let Some(last_run) = self.last_run {
            workflow.last_run = Some(last_run);
        }
        workflow.updated_at = Utc::now();
    }
}

// Run history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub results: JsonValue,
    pub status: RuntimeStatus,
    pub message: String,
    pub executed_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(workflow_id: Uuid, results: JsonValue, status: RuntimeStatus, message: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            results,
            status,
            message: message.to_string(),
            executed_at: Utc::now(),
        }
    }
}
