mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    assistant::WorkflowAssistant,
    store::Store,
    workflow::WorkflowRunner,
    Result,
};

/// Shared handler state.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub runner: Arc<WorkflowRunner>,
    pub assistant: Option<Arc<dyn WorkflowAssistant>>,
}

pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(store: Arc<dyn Store>, runner: Arc<WorkflowRunner>) -> Self {
        Self {
            state: AppState {
                store,
                runner,
                assistant: None,
            },
        }
    }

    pub fn with_assistant(mut self, assistant: Arc<dyn WorkflowAssistant>) -> Self {
        self.state.assistant = Some(assistant);
        self
    }

    pub fn build_router(self) -> Router {
        let state = Arc::new(self.state);

        Router::new()
            .route("/health", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .route(
                "/workflows",
                get(routes::list_workflows).post(routes::create_workflow),
            )
            .route(
                "/workflows/{id}",
                get(routes::get_workflow)
                    .put(routes::update_workflow)
                    .delete(routes::delete_workflow),
            )
            .route("/workflows/{id}/execute", post(routes::execute_workflow))
            .route("/workflows/{id}/runs", get(routes::list_runs))
            .route("/workflows/{id}/analyze", post(routes::analyze_workflow))
            .route("/templates", post(routes::generate_template))
            .route("/execute", post(routes::execute_graph))
            .route("/validate", post(routes::validate_graph))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
            .with_state(state)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}
