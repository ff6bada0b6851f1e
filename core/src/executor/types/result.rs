use std::collections::HashMap;

/// Outcome of one node across all of its attempts.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Task identifier
    pub task_id: String,

    /// True iff the final attempt exited zero and passed its output check
    pub success: bool,

    /// Exit code of the final attempt (None when the node never ran)
    pub exit_code: Option<i32>,

    /// Captured stdout of the final attempt (may be truncated)
    pub stdout: String,

    /// Captured stderr of the final attempt (may be truncated)
    pub stderr: String,

    /// Wall-clock duration summed across attempts, in milliseconds
    pub duration_ms: u64,

    /// Number of retries used
    pub retries_used: u32,

    /// Failure detail (if any)
    pub error: Option<String>,

    /// True when the node was never executed
    pub skipped: bool,

    /// Why the node was skipped
    pub skip_reason: Option<String>,
}

impl TaskResult {
    /// Synthetic result for a node that was never run.
    pub fn skip(task_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            retries_used: 0,
            error: None,
            skipped: true,
            skip_reason: Some(reason.into()),
        }
    }
}

/// Terminal report of a whole DAG run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// True iff no node failed
    pub success: bool,

    /// Ids of nodes that ran and succeeded
    pub executed: Vec<String>,

    /// Ids of nodes that ran and failed
    pub failed: Vec<String>,

    /// Ids of nodes that were never run
    pub skipped: Vec<String>,

    /// Wall-clock duration of the whole run in milliseconds
    pub duration_ms: u64,

    /// Individual task results (task_id -> TaskResult)
    pub task_results: HashMap<String, TaskResult>,

    /// Stage partition the run was scheduled from
    pub stages: Vec<Vec<String>>,
}

impl ExecutionResult {
    /// Derive the summary sets from the per-node result map.
    ///
    /// The map is the single source of truth; re-deriving from the same map
    /// always reproduces the same summary.
    pub fn from_results(
        task_results: HashMap<String, TaskResult>,
        stages: Vec<Vec<String>>,
        duration_ms: u64,
    ) -> Self {
        let mut executed = Vec::new();
        let mut failed = Vec::new();
        let mut skipped = Vec::new();

        for result in task_results.values() {
            if result.skipped {
                skipped.push(result.task_id.clone());
            } else if result.success {
                executed.push(result.task_id.clone());
            } else {
                failed.push(result.task_id.clone());
            }
        }

        // Stable output regardless of completion order
        executed.sort();
        failed.sort();
        skipped.sort();

        Self {
            success: failed.is_empty(),
            executed,
            failed,
            skipped,
            duration_ms,
            task_results,
            stages,
        }
    }
}
