use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    metrics,
    workflow::{
        trace::RunState, ExecutionContext, ExecutionError, ExecutionTrace, Graph, NodeKind,
        StepExecutor,
    },
};

/// Depth-first, fail-fast executor for workflow graphs.
///
/// Holds no per-run state, so one engine can serve any number of concurrent
/// runs.
pub struct WorkflowEngine {
    executor: Arc<StepExecutor>,
}

/// A pending visit: the node to run, the context its ancestors produced and
/// the ids on the path that led here.
struct Visit {
    node_id: String,
    context: ExecutionContext,
    path: Vec<String>,
}

impl WorkflowEngine {
    pub fn new(executor: Arc<StepExecutor>) -> Self {
        Self { executor }
    }

    /// Runs `graph` from its start node. Always produces a trace; failures
    /// are reported inside it.
    pub async fn execute(&self, graph: &Graph) -> ExecutionTrace {
        let timer = metrics::WORKFLOW_RUN_DURATION_SECONDS.start_timer();
        let mut run = RunState::new(graph);

        let outcome = match graph.start_node() {
            Some(start) => {
                info!(
                    "Executing workflow graph: {} nodes, {} edges, start at {}",
                    graph.nodes.len(),
                    graph.edges.len(),
                    start.id
                );
                self.traverse(graph, &start.id, &mut run).await
            }
            None => {
                warn!("Refusing to execute graph without a start node");
                Err(ExecutionError::MissingStartNode)
            }
        };

        let trace = run.finish(outcome);
        timer.observe_duration();
        metrics::record_run(trace.success);

        if trace.success {
            info!("Workflow run succeeded ({} nodes executed)", trace.execution_order.len());
        } else {
            error!("Workflow run failed: {}", trace.message);
        }

        trace
    }

    /// Sibling branches are visited one after another in stored edge order.
    /// The first failure stops the whole run.
    async fn traverse(
        &self,
        graph: &Graph,
        start_id: &str,
        run: &mut RunState,
    ) -> Result<(), ExecutionError> {
        let mut pending = vec![Visit {
            node_id: start_id.to_string(),
            context: ExecutionContext::new(),
            path: Vec::new(),
        }];

        while let Some(Visit { node_id, context, path }) = pending.pop() {
            let Some(node) = graph.node(&node_id) else {
                error!("Edge points at missing node {}", node_id);
                run.merge_terminal(&context);
                return Err(ExecutionError::NodeNotFound(node_id));
            };

            if path.contains(&node_id) {
                let err = ExecutionError::CycleDetected(node_id.clone());
                error!("{}", err);
                run.mark_failed(&node_id, &err);
                run.merge_terminal(&context);
                return Err(err);
            }

            let payload = match self.executor.execute(node, &context).await {
                Ok(payload) => {
                    metrics::record_node(&node.kind, true);
                    payload
                }
                Err(err) => {
                    metrics::record_node(&node.kind, false);
                    error!("Node {} failed: {}", node_id, err);
                    run.mark_failed(&node_id, &err);
                    run.merge_terminal(&context);
                    return Err(err);
                }
            };

            info!("Node {} passed", node_id);
            let updated = context.with_result(&node_id, payload.clone());
            run.mark_passed(&node_id, payload);

            if node.kind == NodeKind::End {
                run.merge_terminal(&updated);
                continue;
            }

            let targets: Vec<&str> = graph.outgoing(&node_id).map(|e| e.target.as_str()).collect();
            if targets.is_empty() {
                run.merge_terminal(&updated);
                continue;
            }

            let mut child_path = path;
            child_path.push(node_id.clone());

            // Reversed so the first stored edge is popped first.
            for target in targets.into_iter().rev() {
                pending.push(Visit {
                    node_id: target.to_string(),
                    context: updated.clone(),
                    path: child_path.clone(),
                });
            }
        }

        Ok(())
    }
}
