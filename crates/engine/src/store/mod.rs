mod config;
mod factory;
mod memory;
mod models;
mod sqlite;

pub use config::{DatabaseConfig, DatabaseType};
pub use factory::create_store;
pub use memory::MemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::workflow::RuntimeStatus;

#[async_trait]
pub trait Store: Send + Sync {
    // Initialize database schema
    async fn init(&self) -> crate::Result<()>;

    // Workflow operations
    async fn create_workflow(&self, workflow: Workflow) -> crate::Result<Workflow>;
    async fn get_workflow(&self, id: Uuid) -> crate::Result<Option<Workflow>>;
    async fn update_workflow(&self, id: Uuid, update: WorkflowUpdate) -> crate::Result<Workflow>;
    async fn list_workflows(&self, owner_id: Option<&str>, limit: i64, offset: i64) -> crate::Result<Vec<Workflow>>;
    async fn delete_workflow(&self, id: Uuid) -> crate::Result<()>;

    // Run history
    async fn create_run_record(
        &self,
        workflow_id: Uuid,
        results: JsonValue,
        status: RuntimeStatus,
        message: &str,
    ) -> crate::Result<RunRecord>;
    async fn list_run_records(&self, workflow_id: Uuid, limit: i64) -> crate::Result<Vec<RunRecord>>;
}

pub(crate) fn workflow_not_found(id: Uuid) -> crate::Error {
    crate::Error::NotFound(format!("workflow {}", id))
}
