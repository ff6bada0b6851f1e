use async_trait::async_trait;

use super::types::{TaskNode, TaskResult};

/// Optional sink handed each successful task's command and captured output.
///
/// Used to record artifacts or extract references produced by a task. Sink
/// failures are logged as warnings and never affect the task's outcome.
#[async_trait]
pub trait ResourceSink: Send + Sync {
    fn name(&self) -> &str;

    async fn record(&self, node: &TaskNode, result: &TaskResult) -> anyhow::Result<()>;
}
