use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::str::FromStr;
use tracing::{debug, error, info};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    store::{workflow_not_found, RunRecord, Store, Workflow, WorkflowUpdate},
    workflow::RuntimeStatus,
    Error, Result,
};

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to SQLite database: {}", database_url);

        let in_memory = database_url.contains(":memory:");
        if !in_memory {
            if let Some(parent) = std::path::Path::new(database_url.trim_start_matches("sqlite://")).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to ":memory:" opens a fresh database, so pin the
        // pool to a single connection that never gets recycled.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            error!("Failed to connect to SQLite: {}", e);
            Error::Sqlx(e)
        })?;

        Ok(Self { pool })
    }

    fn workflow_from_row(r: &SqliteRow) -> Result<Workflow> {
        Ok(Workflow {
            id: r.get::<String, _>("id").parse()?,
            name: r.get("name"),
            description: r.get("description"),
            owner_id: r.get("owner_id"),
            status: RuntimeStatus::from(r.get::<String, _>("status").as_str()),
            last_run: r.get("last_run"),
            nodes: serde_json::from_str(r.get("nodes"))?,
            edges: serde_json::from_str(r.get("edges"))?,
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        })
    }

    fn run_record_from_row(r: &SqliteRow) -> Result<RunRecord> {
        Ok(RunRecord {
            id: r.get::<String, _>("id").parse()?,
            workflow_id: r.get::<String, _>("workflow_id").parse()?,
            results: serde_json::from_str(r.get("results"))?,
            status: RuntimeStatus::from(r.get::<String, _>("status").as_str()),
            message: r.get("message"),
            executed_at: r.get("executed_at"),
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn init(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to run migrations: {}", e);
                Error::Migrate(e)
            })?;

        Ok(())
    }

    async fn create_workflow(&self, workflow: Workflow) -> Result<Workflow> {
        debug!("Saving workflow: {}", workflow.id);

        let nodes_json = serde_json::to_string(&workflow.nodes)?;
        let edges_json = serde_json::to_string(&workflow.edges)?;

        sqlx::query(
            r#"
            INSERT INTO workflows (
                id, name, description, owner_id, status, last_run,
                nodes, edges, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(&workflow.owner_id)
        .bind(workflow.status.to_string())
        .bind(workflow.last_run)
        .bind(nodes_json)
        .bind(edges_json)
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(workflow)
    }

    async fn get_workflow(&self, id: Uuid) -> Result<Option<Workflow>> {
        debug!("Getting workflow: {}", id);

        let row = sqlx::query(
            r#"
            SELECT id, name, description, owner_id, status, last_run,
                   nodes, edges, created_at, updated_at
            FROM workflows
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::workflow_from_row).transpose()
    }

    async fn update_workflow(&self, id: Uuid, update: WorkflowUpdate) -> Result<Workflow> {
        debug!("Updating workflow: {}", id);

        let nodes_json = update.nodes.as_ref().map(serde_json::to_string).transpose()?;
        let edges_json = update.edges.as_ref().map(serde_json::to_string).transpose()?;

        // Only the columns present in the update are written, so a rename and
        // a run outcome landing at the same time never undo each other.
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE workflows SET
                name = COALESCE(?1, name),
                description = COALESCE(?2, description),
                status = COALESCE(?3, status),
                last_run = COALESCE(?4, last_run),
                nodes = COALESCE(?5, nodes),
                edges = COALESCE(?6, edges),
                updated_at = ?7
            WHERE id = ?8
            "#,
        )
        .bind(update.name)
        .bind(update.description)
        .bind(update.status.map(|s| s.to_string()))
        .bind(update.last_run)
        .bind(nodes_json)
        .bind(edges_json)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(workflow_not_found(id));
        }

        let row = sqlx::query(
            r#"
            SELECT id, name, description, owner_id, status, last_run,
                   nodes, edges, created_at, updated_at
            FROM workflows
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Self::workflow_from_row(&row)
    }

    async fn list_workflows(&self, owner_id: Option<&str>, limit: i64, offset: i64) -> Result<Vec<Workflow>> {
        debug!("Listing workflows: owner={:?}, limit={}, offset={}", owner_id, limit, offset);

        let rows = sqlx::query(
            r#"
            SELECT id, name, description, owner_id, status, last_run,
                   nodes, edges, created_at, updated_at
            FROM workflows
            WHERE ?1 IS NULL OR owner_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(owner_id)
        .bind(limit.max(0))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::workflow_from_row).collect()
    }

    async fn delete_workflow(&self, id: Uuid) -> Result<()> {
        debug!("Deleting workflow: {}", id);

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM run_records WHERE workflow_id = ?1")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?1")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(workflow_not_found(id));
        }
        tx.commit().await?;

        Ok(())
    }

    async fn create_run_record(
        &self,
        workflow_id: Uuid,
        results: JsonValue,
        status: RuntimeStatus,
        message: &str,
    ) -> Result<RunRecord> {
        debug!("Recording run for workflow {}: {}", workflow_id, status);

        let record = RunRecord::new(workflow_id, results, status, message);
        let results_json = serde_json::to_string(&record.results)?;

        sqlx::query(
            r#"
            INSERT INTO run_records (id, workflow_id, results, status, message, executed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.workflow_id.to_string())
        .bind(results_json)
        .bind(record.status.to_string())
        .bind(&record.message)
        .bind(record.executed_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_run_records(&self, workflow_id: Uuid, limit: i64) -> Result<Vec<RunRecord>> {
        debug!("Listing runs for workflow {}: limit={}", workflow_id, limit);

        let rows = sqlx::query(
            r#"
            SELECT id, workflow_id, results, status, message, executed_at
            FROM run_records
            WHERE workflow_id = ?1
            ORDER BY executed_at DESC
            LIMIT ?2
            "#,
        )
        .bind(workflow_id.to_string())
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::run_record_from_row).collect()
    }
}
