use thiserror::Error;

/// Executor-specific errors for task graph construction and execution.
///
/// Only graph construction problems surface as `Err` to the caller; failures
/// of individual tasks are captured in the result map instead.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Duplicate task ID: {0}")]
    DuplicateTaskId(String),

    #[error("Dependency not found: task '{task_id}' depends on '{missing_dep}'")]
    DependencyNotFound {
        task_id: String,
        missing_dep: String,
    },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Invalid validation pattern: {0}")]
    InvalidPattern(String),

    #[error("Internal executor error: {0}")]
    Internal(String),
}
