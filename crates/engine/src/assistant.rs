//! Optional template generation and analysis collaborator.
//!
//! Backed by a language model in a full deployment. The engine never calls
//! it; only the HTTP API does, and answers `501` when none is configured.

use async_trait::async_trait;

use crate::{store::Workflow, workflow::Graph, Result};

#[async_trait]
pub trait WorkflowAssistant: Send + Sync {
    /// Draft a graph from a free-text description of the desired workflow.
    async fn generate_template(&self, description: &str) -> Result<Graph>;

    /// Human-readable review of an existing workflow.
    async fn analyze(&self, workflow: &Workflow) -> Result<String>;
}
