use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;

/// Failure severity of a task node.
///
/// Only `Critical` escalates: when a critical node fails, the whole run is
/// halted after the current stage drains, and everything unresolved is
/// skipped. The other levels are informational.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    #[default]
    Error,
    Warning,
    Info,
}

/// Optional check applied to a task's captured stdout after a zero exit.
///
/// A task that exits successfully but fails its check is treated exactly
/// like a non-zero exit for retry and failure propagation purposes.
#[derive(Clone)]
pub enum OutputCheck {
    /// Stdout must contain this substring.
    Contains(String),
    /// Stdout must match this regular expression.
    Pattern(Regex),
    /// Arbitrary predicate for library callers; not representable in task files.
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl OutputCheck {
    /// Compile a regex pattern into a check.
    pub fn pattern(pattern: &str) -> Result<Self, ExecutorError> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| ExecutorError::InvalidPattern(e.to_string()))
    }

    pub fn matches(&self, stdout: &str) -> bool {
        match self {
            Self::Contains(needle) => stdout.contains(needle.as_str()),
            Self::Pattern(re) => re.is_match(stdout),
            Self::Predicate(pred) => pred(stdout),
        }
    }
}

impl fmt::Debug for OutputCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contains(needle) => f.debug_tuple("Contains").field(needle).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Declarative description of one unit of work in the graph.
///
/// Nodes are immutable for the duration of a run; a retry re-submits a fresh
/// copy with `retry_count` decremented rather than mutating the original.
#[derive(Debug, Clone)]
pub struct TaskNode {
    /// Unique identifier across the whole graph.
    pub id: String,

    /// Human-readable label. No semantic effect.
    pub name: String,

    /// Human-readable description. No semantic effect.
    pub description: Option<String>,

    /// External command to invoke. A node without one fails at execution time.
    pub command: Option<String>,

    /// Arguments passed to the command.
    pub args: Vec<String>,

    /// Wall-clock budget before the command is aborted. Default applied if absent.
    pub timeout_ms: Option<u64>,

    /// Ids of nodes that must succeed before this node becomes eligible.
    pub depends_on: Vec<String>,

    /// If true, this node's failure does not cascade a skip to its dependents.
    pub can_fail_safely: bool,

    /// Additional attempts after the first failure.
    pub retry_count: u32,

    /// Pause between attempts.
    pub retry_delay_ms: Option<u64>,

    /// Optional check over captured stdout.
    pub validation: Option<OutputCheck>,

    pub severity: Severity,
}

impl TaskNode {
    pub fn new(
        id: impl Into<String>,
        command: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: None,
            command: Some(command.into()),
            args: args.into_iter().map(Into::into).collect(),
            timeout_ms: None,
            depends_on: Vec::new(),
            can_fail_safely: false,
            retry_count: 0,
            retry_delay_ms: None,
            validation: None,
            severity: Severity::default(),
        }
    }
}

/// Common task interface so the graph stays generic over node representations.
pub trait TaskLike: Clone + Send + Sync {
    fn id(&self) -> &str;
    fn dependencies(&self) -> &[String];
}

impl TaskLike for TaskNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[String] {
        &self.depends_on
    }
}
