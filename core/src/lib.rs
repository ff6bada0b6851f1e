//! dagrun-core: dependency-aware DAG task executor.
//!
//! Takes a set of [`executor::types::TaskNode`] definitions, validates the
//! dependency graph, partitions it into topological stages, and runs each
//! stage with bounded parallelism. Failed nodes are retried per their retry
//! budget; failures propagate as skips to dependents, and a critical failure
//! halts the remaining run.

pub mod config;
pub mod error;
pub mod executor;

pub use error::ExecutorError;
pub use executor::types::{
    ExecutionOpts, ExecutionResult, OutputCheck, Severity, TaskNode, TaskResult,
};
pub use executor::{ExecutionEngine, TaskGraph};
