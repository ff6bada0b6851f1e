//! TOML task file loading.
//!
//! A task file is a list of `[[task]]` tables:
//!
//! ```toml
//! [[task]]
//! id = "build"
//! command = "make"
//! args = ["all"]
//!
//! [[task]]
//! id = "test"
//! command = "make"
//! args = ["check"]
//! depends_on = ["build"]
//! retry_count = 1
//! expect_contains = "0 failures"
//! ```

use std::path::Path;

use serde::Deserialize;

use dagrun_core::{OutputCheck, Severity, TaskNode};

use crate::CliError;

#[derive(Debug, Deserialize)]
struct TaskFile {
    #[serde(default)]
    task: Vec<TaskEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TaskEntry {
    id: String,
    name: Option<String>,
    description: Option<String>,
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    timeout_ms: Option<u64>,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    can_fail_safely: bool,
    #[serde(default)]
    retry_count: u32,
    retry_delay_ms: Option<u64>,
    /// Stdout must contain this substring for the task to count as passed.
    expect_contains: Option<String>,
    /// Stdout must match this regex for the task to count as passed.
    expect_pattern: Option<String>,
    #[serde(default)]
    severity: Severity,
}

impl TaskEntry {
    fn into_node(self) -> Result<TaskNode, CliError> {
        let validation = match (self.expect_contains, self.expect_pattern) {
            (Some(_), Some(_)) => {
                return Err(CliError::TaskFile(format!(
                    "task '{}' sets both expect_contains and expect_pattern",
                    self.id
                )))
            }
            (Some(needle), None) => Some(OutputCheck::Contains(needle)),
            (None, Some(pattern)) => Some(OutputCheck::pattern(&pattern)?),
            (None, None) => None,
        };

        Ok(TaskNode {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            description: self.description,
            command: self.command,
            args: self.args,
            timeout_ms: self.timeout_ms,
            depends_on: self.depends_on,
            can_fail_safely: self.can_fail_safely,
            retry_count: self.retry_count,
            retry_delay_ms: self.retry_delay_ms,
            validation,
            severity: self.severity,
        })
    }
}

pub(crate) fn load_tasks(path: &Path) -> Result<Vec<TaskNode>, CliError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::TaskFile(format!("{}: {e}", path.display())))?;
    parse_tasks(&content)
}

fn parse_tasks(content: &str) -> Result<Vec<TaskNode>, CliError> {
    let file: TaskFile = toml::from_str(content).map_err(|e| CliError::TaskFile(e.to_string()))?;

    if file.task.is_empty() {
        return Err(CliError::TaskFile("no tasks defined".to_string()));
    }

    file.task.into_iter().map(TaskEntry::into_node).collect()
}
