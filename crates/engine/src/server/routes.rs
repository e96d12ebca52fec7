use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use http::{header, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::AppState;
use crate::{
    metrics,
    store::{RunRecord, Workflow, WorkflowUpdate},
    workflow::{Edge, ExecutionTrace, Graph, Node, StructuralError},
    Error, Result,
};

type AppStateRef = State<Arc<AppState>>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) | Error::Config(_) | Error::Uuid(_) | Error::SerdeJson(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(raw)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_owner")]
    pub owner_id: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

fn default_owner() -> String {
    "anonymous".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub owner: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct RunsParams {
    #[serde(default = "default_runs_limit")]
    pub limit: i64,
}

fn default_runs_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<StructuralError>,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn metrics() -> Result<Response> {
    let body = metrics::gather_metrics()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

pub async fn list_workflows(
    State(state): AppStateRef,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Workflow>>> {
    let workflows = state
        .store
        .list_workflows(params.owner.as_deref(), params.limit, params.offset)
        .await?;
    Ok(Json(workflows))
}

pub async fn create_workflow(
    State(state): AppStateRef,
    Json(request): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<Workflow>)> {
    if request.name.trim().is_empty() {
        return Err(Error::Validation("Workflow name must not be empty".to_string()));
    }

    let mut workflow = Workflow::new(
        request.name,
        request.owner_id,
        Graph::new(request.nodes, request.edges),
    );
    workflow.description = request.description;

    let workflow = state.store.create_workflow(workflow).await?;
    info!("Created workflow {} ({})", workflow.name, workflow.id);
    Ok((StatusCode::CREATED, Json(workflow)))
}

pub async fn get_workflow(State(state): AppStateRef, Path(id): Path<String>) -> Result<Json<Workflow>> {
    let id = parse_id(&id)?;
    state
        .store
        .get_workflow(id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("workflow {}", id)))
}

pub async fn update_workflow(
    State(state): AppStateRef,
    Path(id): Path<String>,
    Json(update): Json<WorkflowUpdate>,
) -> Result<Json<Workflow>> {
    let id = parse_id(&id)?;
    if matches!(update.name.as_deref(), Some(name) if name.trim().is_empty()) {
        return Err(Error::Validation("Workflow name must not be empty".to_string()));
    }
    Ok(Json(state.store.update_workflow(id, update).await?))
}

pub async fn delete_workflow(State(state): AppStateRef, Path(id): Path<String>) -> Result<StatusCode> {
    let id = parse_id(&id)?;
    state.store.delete_workflow(id).await?;
    info!("Deleted workflow {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn execute_workflow(
    State(state): AppStateRef,
    Path(id): Path<String>,
) -> Result<Json<ExecutionTrace>> {
    let id = parse_id(&id)?;
    Ok(Json(state.runner.run(id).await?))
}

pub async fn list_runs(
    State(state): AppStateRef,
    Path(id): Path<String>,
    Query(params): Query<RunsParams>,
) -> Result<Json<Vec<RunRecord>>> {
    let id = parse_id(&id)?;
    if state.store.get_workflow(id).await?.is_none() {
        return Err(Error::NotFound(format!("workflow {}", id)));
    }
    Ok(Json(state.store.list_run_records(id, params.limit).await?))
}

pub async fn analyze_workflow(
    State(state): AppStateRef,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    let assistant = state
        .assistant
        .clone()
        .ok_or_else(|| Error::NotImplemented("workflow analysis is not configured".to_string()))?;

    let workflow = state
        .store
        .get_workflow(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("workflow {}", id)))?;

    let analysis = assistant.analyze(&workflow).await?;
    Ok(Json(json!({ "workflowId": id, "analysis": analysis })))
}

pub async fn generate_template(
    State(state): AppStateRef,
    Json(request): Json<TemplateRequest>,
) -> Result<Json<Graph>> {
    let assistant = state
        .assistant
        .clone()
        .ok_or_else(|| Error::NotImplemented("template generation is not configured".to_string()))?;

    if request.description.trim().is_empty() {
        return Err(Error::Validation("Template description must not be empty".to_string()));
    }

    Ok(Json(assistant.generate_template(&request.description).await?))
}

/// Runs a graph posted in the request body without persisting anything.
pub async fn execute_graph(State(state): AppStateRef, Json(graph): Json<Graph>) -> Json<ExecutionTrace> {
    Json(state.runner.engine().execute(&graph).await)
}

pub async fn validate_graph(Json(graph): Json<Graph>) -> Json<ValidationReport> {
    let errors = graph.validate().err().unwrap_or_default();
    Json(ValidationReport {
        valid: errors.is_empty(),
        errors,
    })
}
