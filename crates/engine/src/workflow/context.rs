use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Results accumulated along one path of a run, keyed by node id.
///
/// Contexts are threaded by value: a node hands its descendants a new
/// context that extends the one it received, so sibling branches never see
/// each other's results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    results: BTreeMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this context with `node_id`'s result added.
    pub fn with_result(&self, node_id: &str, result: Value) -> Self {
        let mut next = self.clone();
        next.results.insert(node_id.to_string(), result);
        next
    }

    pub fn get(&self, node_id: &str) -> Option<&Value> {
        self.results.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.results.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.results.keys().map(String::as_str)
    }

    /// Folds `other` into this context; entries from `other` win.
    pub fn merge(&mut self, other: &ExecutionContext) {
        for (id, value) in &other.results {
            self.results.insert(id.clone(), value.clone());
        }
    }

    /// Convert the context to JSON for storage or templating
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.results
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Create a context from JSON; non-object values yield an empty context
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self {
                results: map.into_iter().collect(),
            },
            _ => Self::default(),
        }
    }
}
