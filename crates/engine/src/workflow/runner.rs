use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    store::{Store, WorkflowUpdate},
    workflow::{ExecutionTrace, WorkflowEngine},
    Error, Result,
};

/// Runs stored workflows and records the outcome: a run record is appended
/// and the workflow's `status`/`lastRun` are updated.
pub struct WorkflowRunner {
    store: Arc<dyn Store>,
    engine: Arc<WorkflowEngine>,
}

impl WorkflowRunner {
    pub fn new(store: Arc<dyn Store>, engine: Arc<WorkflowEngine>) -> Self {
        Self { store, engine }
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub async fn run(&self, workflow_id: Uuid) -> Result<ExecutionTrace> {
        let workflow = self
            .store
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("workflow {}", workflow_id)))?;

        info!("Running workflow {} ({})", workflow.name, workflow.id);
        let trace = self.engine.execute(&workflow.graph()).await;

        if !trace.success {
            warn!("Workflow {} failed: {}", workflow.id, trace.message);
        }

        self.store
            .create_run_record(
                workflow.id,
                trace.final_context.to_json(),
                trace.status(),
                &trace.message,
            )
            .await?;
        self.store
            .update_workflow(workflow.id, WorkflowUpdate::run_outcome(trace.status(), Utc::now()))
            .await?;

        Ok(trace)
    }
}
