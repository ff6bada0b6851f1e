use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;

use crate::error::ExecutorError;
use crate::executor::types::TaskResult;

/// Run one stage's tasks with at most `max_parallel` in flight at once.
///
/// Every task is submitted eagerly; a semaphore gates how many executor
/// invocations actually run. A freed slot is taken by the next pending task
/// as soon as any in-flight task completes, so there is no intra-stage
/// ordering guarantee. Results flow back through the stream and are
/// collected here; executors never touch a shared map.
pub async fn execute_stage_parallel<F, Fut>(
    task_ids: &[String],
    max_parallel: usize,
    executor_fn: F,
) -> Result<HashMap<String, TaskResult>, ExecutorError>
where
    F: Fn(String) -> Fut + Clone + Send + 'static,
    Fut: std::future::Future<Output = Result<TaskResult, ExecutorError>> + Send,
{
    let sem = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut futs: FuturesUnordered<_> = FuturesUnordered::new();

    for task_id in task_ids {
        let task_id = task_id.clone();
        let sem = sem.clone();
        let executor = executor_fn.clone();

        futs.push(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|_| ExecutorError::Internal("semaphore closed unexpectedly".into()))?;

            executor(task_id).await
        });
    }

    let mut results: HashMap<String, TaskResult> = HashMap::new();

    while let Some(res) = futs.next().await {
        let task_result = res?;
        results.insert(task_result.task_id.clone(), task_result);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ok_result(task_id: &str) -> TaskResult {
        TaskResult {
            task_id: task_id.to_string(),
            success: true,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            retries_used: 0,
            error: None,
            skipped: false,
            skip_reason: None,
        }
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_bound() {
        let ids: Vec<String> = (0..8).map(|i| format!("t{i}")).collect();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let in_flight_c = in_flight.clone();
        let peak_c = peak.clone();
        let results = execute_stage_parallel(&ids, 3, move |task_id| {
            let in_flight = in_flight_c.clone();
            let peak = peak_c.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(ok_result(&task_id))
            }
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn single_permit_runs_sequentially() {
        let ids: Vec<String> = (0..4).map(|i| format!("t{i}")).collect();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let in_flight_c = in_flight.clone();
        let peak_c = peak.clone();
        let results = execute_stage_parallel(&ids, 1, move |task_id| {
            let in_flight = in_flight_c.clone();
            let peak = peak_c.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(ok_result(&task_id))
            }
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
