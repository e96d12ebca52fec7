use lazy_static::lazy_static;
use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry, Encoder, Histogram,
    IntCounterVec, Registry, TextEncoder,
};

use crate::workflow::NodeKind;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref WORKFLOW_RUNS_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "nodeflow_workflow_runs_total",
        "Total number of workflow runs by outcome.",
        &["outcome"],
        REGISTRY
    )
    .expect("workflow run counter is valid");
    pub static ref NODE_EXECUTIONS_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "nodeflow_node_executions_total",
        "Total number of node executions by kind and outcome.",
        &["kind", "outcome"],
        REGISTRY
    )
    .expect("node execution counter is valid");
    pub static ref WORKFLOW_RUN_DURATION_SECONDS: Histogram = register_histogram_with_registry!(
        "nodeflow_workflow_run_duration_seconds",
        "Wall-clock duration of workflow runs.",
        REGISTRY
    )
    .expect("run duration histogram is valid");
}

fn outcome(success: bool) -> &'static str {
    if success {
        "passed"
    } else {
        "failed"
    }
}

pub fn record_run(success: bool) {
    WORKFLOW_RUNS_TOTAL.with_label_values(&[outcome(success)]).inc();
}

pub fn record_node(kind: &NodeKind, success: bool) {
    // Unknown kinds share one label so user input cannot grow the series set.
    let kind = match kind {
        NodeKind::Other(_) => "other",
        known => known.as_str(),
    };
    NODE_EXECUTIONS_TOTAL
        .with_label_values(&[kind, outcome(success)])
        .inc();
}

// Function to gather metrics for exposition
pub fn gather_metrics() -> crate::Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| crate::Error::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::Error::Internal(format!("Metrics are not valid UTF-8: {}", e)))
}
