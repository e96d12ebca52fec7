use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a node, a stored workflow or a run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeStatus {
    #[default]
    Idle,
    Passed,
    Failed,
}

impl RuntimeStatus {
    pub fn from_success(success: bool) -> Self {
        if success {
            RuntimeStatus::Passed
        } else {
            RuntimeStatus::Failed
        }
    }
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeStatus::Idle => write!(f, "idle"),
            RuntimeStatus::Passed => write!(f, "passed"),
            RuntimeStatus::Failed => write!(f, "failed"),
        }
    }
}

impl From<&str> for RuntimeStatus {
    fn from(s: &str) -> Self {
        match s {
            "passed" => RuntimeStatus::Passed,
            "failed" => RuntimeStatus::Failed,
            _ => RuntimeStatus::Idle,
        }
    }
}
