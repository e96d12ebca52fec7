use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::workflow::RuntimeStatus;

/// The capability a node contributes to a workflow.
///
/// Kinds travel as camelCase strings. Anything unrecognised is kept as
/// `Other` so a run can attribute `UnknownNodeKind` to the node instead of
/// rejecting the whole graph on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Start,
    End,
    ApiCall,
    SendEmail,
    TextAnnotation,
    Condition,
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::ApiCall => "apiCall",
            NodeKind::SendEmail => "sendEmail",
            NodeKind::TextAnnotation => "textAnnotation",
            NodeKind::Condition => "condition",
            NodeKind::Other(name) => name,
        }
    }
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "start" => NodeKind::Start,
            "end" => NodeKind::End,
            "apiCall" => NodeKind::ApiCall,
            "sendEmail" => NodeKind::SendEmail,
            "textAnnotation" => NodeKind::TextAnnotation,
            "condition" => NodeKind::Condition,
            _ => NodeKind::Other(s),
        }
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canvas coordinates. Never consulted during execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: NodeKind,

    #[serde(default)]
    pub position: Position,

    /// Kind-specific configuration, e.g. `url`/`method` for API calls
    #[serde(rename = "data", default = "empty_object")]
    pub config: Value,

    #[serde(default)]
    pub runtime_status: RuntimeStatus,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            position: Position::default(),
            config: empty_object(),
            runtime_status: RuntimeStatus::Idle,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,

    /// Output handle on multi-output nodes; carried but not interpreted yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }
}

/// Nodes and edges of one workflow. Edge order is significant: sibling
/// branches are visited in the order their edges are stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "camelCase")]
pub enum StructuralError {
    #[error("No start node found")]
    MissingStartNode,
    #[error("Graph has {count} start nodes, expected exactly one")]
    MultipleStartNodes { count: usize },
    #[error("Duplicate node id: {id}")]
    DuplicateNodeId { id: String },
    #[error("Edge {edge} references missing node {node}")]
    DanglingEdge { edge: String, node: String },
    #[error("Edge {edge} is invalid: {reason}")]
    InvalidEdge { edge: String, reason: String },
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// First node of kind `start` in stored order.
    pub fn start_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == NodeKind::Start)
    }

    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Checks structural well-formedness, reporting every problem found.
    pub fn validate(&self) -> Result<(), Vec<StructuralError>> {
        let mut errors = Vec::new();

        let starts = self.nodes.iter().filter(|n| n.kind == NodeKind::Start).count();
        match starts {
            0 => errors.push(StructuralError::MissingStartNode),
            1 => {}
            count => errors.push(StructuralError::MultipleStartNodes { count }),
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                errors.push(StructuralError::DuplicateNodeId { id: node.id.clone() });
            }
        }

        for edge in &self.edges {
            match self.node(&edge.source) {
                None => errors.push(StructuralError::DanglingEdge {
                    edge: edge.id.clone(),
                    node: edge.source.clone(),
                }),
                Some(n) if n.kind == NodeKind::End => errors.push(StructuralError::InvalidEdge {
                    edge: edge.id.clone(),
                    reason: format!("end node {} has no outputs", n.id),
                }),
                Some(_) => {}
            }
            match self.node(&edge.target) {
                None => errors.push(StructuralError::DanglingEdge {
                    edge: edge.id.clone(),
                    node: edge.target.clone(),
                }),
                Some(n) if n.kind == NodeKind::Start => errors.push(StructuralError::InvalidEdge {
                    edge: edge.id.clone(),
                    reason: format!("start node {} has no inputs", n.id),
                }),
                Some(_) => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn linear() -> Graph {
        Graph::new(
            vec![
                Node::new("s", NodeKind::Start),
                Node::new("a", NodeKind::ApiCall).with_config(json!({ "url": "https://x/ok" })),
                Node::new("z", NodeKind::End),
            ],
            vec![Edge::new("e1", "s", "a"), Edge::new("e2", "a", "z")],
        )
    }

    #[test]
    fn test_valid_graph_passes() {
        assert!(linear().validate().is_ok());
    }

    #[test]
    fn test_missing_start_node() {
        let graph = Graph::new(vec![Node::new("z", NodeKind::End)], vec![]);
        assert_eq!(graph.validate().unwrap_err(), vec![StructuralError::MissingStartNode]);
    }

    #[test]
    fn test_dangling_and_invalid_edges() {
        let mut graph = linear();
        graph.edges.push(Edge::new("e3", "a", "ghost"));
        graph.edges.push(Edge::new("e4", "z", "s"));

        let errors = graph.validate().unwrap_err();
        assert!(errors.contains(&StructuralError::DanglingEdge {
            edge: "e3".to_string(),
            node: "ghost".to_string()
        }));
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, StructuralError::InvalidEdge { edge, .. } if edge == "e4"))
                .count(),
            2
        );
    }

    #[test]
    fn test_multiple_starts_and_duplicates() {
        let graph = Graph::new(
            vec![Node::new("s", NodeKind::Start), Node::new("s", NodeKind::Start)],
            vec![],
        );
        let errors = graph.validate().unwrap_err();
        assert!(errors.contains(&StructuralError::MultipleStartNodes { count: 2 }));
        assert!(errors.contains(&StructuralError::DuplicateNodeId { id: "s".to_string() }));
    }

    #[test]
    fn test_wire_format() {
        let graph: Graph = serde_json::from_value(json!({
            "nodes": [
                { "id": "s", "type": "start", "position": { "x": 10.0, "y": 20.0 } },
                { "id": "w", "type": "webhook", "data": { "path": "/x" } }
            ],
            "edges": [
                { "id": "e1", "source": "s", "target": "w", "sourceHandle": "out" }
            ]
        }))
        .unwrap();

        assert_eq!(graph.nodes[0].position, Position { x: 10.0, y: 20.0 });
        assert_eq!(graph.nodes[0].runtime_status, RuntimeStatus::Idle);
        assert_eq!(graph.nodes[1].kind, NodeKind::Other("webhook".to_string()));
        assert_eq!(graph.edges[0].source_handle.as_deref(), Some("out"));

        let value = serde_json::to_value(&graph.nodes[1]).unwrap();
        assert_eq!(value["type"], "webhook");
        assert_eq!(value["runtimeStatus"], "idle");
    }

    #[test]
    fn test_outgoing_preserves_edge_order() {
        let graph = Graph::new(
            vec![Node::new("s", NodeKind::Start)],
            vec![Edge::new("e2", "s", "b"), Edge::new("e1", "s", "a"), Edge::new("e3", "x", "c")],
        );
        let targets: Vec<_> = graph.outgoing("s").map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["b", "a"]);
    }
}
