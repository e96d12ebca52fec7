pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod graph;
pub mod runner;
pub mod state;
pub mod trace;

pub use context::ExecutionContext;
pub use engine::WorkflowEngine;
pub use error::ExecutionError;
pub use executor::{Step, StepExecutor};
pub use graph::{Edge, Graph, Node, NodeKind, Position, StructuralError};
pub use runner::WorkflowRunner;
pub use state::RuntimeStatus;
pub use trace::{ExecutionTrace, NodeResult};
