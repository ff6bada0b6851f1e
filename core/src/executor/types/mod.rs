mod config;
mod result;
mod task;

pub use config::ExecutionOpts;
pub use result::{ExecutionResult, TaskResult};
pub use task::{OutputCheck, Severity, TaskLike, TaskNode};
