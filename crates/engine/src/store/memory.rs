use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{
    store::{workflow_not_found, RunRecord, Store, Workflow, WorkflowUpdate},
    workflow::RuntimeStatus,
    Result,
};

/// Process-local store for tests and throwaway deployments.
#[derive(Default)]
pub struct MemoryStore {
    workflows: RwLock<HashMap<Uuid, Workflow>>,
    runs: RwLock<Vec<RunRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Negative limits and offsets clamp to zero, matching the SQLite store.
fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn create_workflow(&self, workflow: Workflow) -> Result<Workflow> {
        debug!("Saving workflow: {}", workflow.id);
        self.workflows.write().await.insert(workflow.id, workflow.clone());
        Ok(workflow)
    }

    async fn get_workflow(&self, id: Uuid) -> Result<Option<Workflow>> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }

    async fn update_workflow(&self, id: Uuid, update: WorkflowUpdate) -> Result<Workflow> {
        debug!("Updating workflow: {}", id);
        let mut workflows = self.workflows.write().await;
        let workflow = workflows.get_mut(&id).ok_or_else(|| workflow_not_found(id))?;
        update.apply(workflow);
        Ok(workflow.clone())
    }

    async fn list_workflows(&self, owner_id: Option<&str>, limit: i64, offset: i64) -> Result<Vec<Workflow>> {
        let mut workflows: Vec<Workflow> = self
            .workflows
            .read()
            .await
            .values()
            .filter(|w| owner_id.map_or(true, |owner| w.owner_id == owner))
            .cloned()
            .collect();
        workflows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(workflows, limit, offset))
    }

    async fn delete_workflow(&self, id: Uuid) -> Result<()> {
        debug!("Deleting workflow: {}", id);
        self.workflows
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| workflow_not_found(id))?;
        self.runs.write().await.retain(|r| r.workflow_id != id);
        Ok(())
    }

    async fn create_run_record(
        &self,
        workflow_id: Uuid,
        results: JsonValue,
        status: RuntimeStatus,
        message: &str,
    ) -> Result<RunRecord> {
        let record = RunRecord::new(workflow_id, results, status, message);
        self.runs.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_run_records(&self, workflow_id: Uuid, limit: i64) -> Result<Vec<RunRecord>> {
        let runs: Vec<RunRecord> = self
            .runs
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect();
        Ok(page(runs, limit, 0))
    }
}
