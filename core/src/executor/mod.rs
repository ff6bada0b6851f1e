//! Dependency-aware DAG task execution.
//!
//! Control flow:
//!
//! ```text
//! &[TaskNode]
//!   ↓
//! TaskGraph::from_tasks()          duplicate-id check
//!   ↓
//! TaskGraph::validate()            dangling deps, cycle detection
//!   ↓
//! TaskGraph::topological_sort()    Vec<Vec<String>> execution stages
//!   ↓
//! ExecutionEngine::execute_stages()
//!   per stage: eligibility → bounded parallel run → failure propagation
//!   ↓
//! ExecutionResult
//! ```

mod command;
mod engine;
mod graph;
mod output;
mod progress;
mod scheduler;
pub mod traits;
pub mod types;

pub use command::{
    effective_timeout_ms, run_attempt, AttemptOutput, DEFAULT_TIMEOUT_MS, TIMEOUT_EXIT_CODE,
};
pub use engine::{execute_tasks, ExecutionEngine, ExecutionEngineBuilder};
pub use graph::TaskGraph;
pub use output::{
    emit_execution_plan, emit_run_end, emit_run_start, emit_stage_end, emit_stage_start,
    emit_task_end, emit_task_skipped, emit_task_start, RunEvent,
};
pub use progress::ProgressMonitor;
pub use scheduler::execute_stage_parallel;
pub use traits::ResourceSink;
pub use types::{ExecutionOpts, ExecutionResult, OutputCheck, Severity, TaskNode, TaskResult};
