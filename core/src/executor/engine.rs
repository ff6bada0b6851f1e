use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::error::ExecutorError;

use super::command::run_attempt;
use super::graph::TaskGraph;
use super::output::{
    emit_execution_plan, emit_run_end, emit_run_start, emit_stage_end, emit_stage_start,
    emit_task_end, emit_task_skipped, emit_task_start,
};
use super::progress::ProgressMonitor;
use super::scheduler::execute_stage_parallel;
use super::traits::ResourceSink;
use super::types::{ExecutionOpts, ExecutionResult, Severity, TaskNode, TaskResult};

/// Execution engine for task dependency graphs.
///
/// Validates the graph, partitions it into stages, and runs each stage with
/// bounded parallelism. All per-task outcomes, including skips, are captured
/// in the result map; only malformed graphs surface as `Err`.
pub struct ExecutionEngine {
    config: ExecutorConfig,
    opts: ExecutionOpts,
    sink: Option<Arc<dyn ResourceSink>>,
}

pub struct ExecutionEngineBuilder {
    config: ExecutorConfig,
    opts: ExecutionOpts,
    sink: Option<Arc<dyn ResourceSink>>,
}

impl ExecutionEngine {
    pub fn new(config: ExecutorConfig, opts: ExecutionOpts) -> Self {
        Self {
            config,
            opts,
            sink: None,
        }
    }

    pub fn builder(config: ExecutorConfig, opts: ExecutionOpts) -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::new(config, opts)
    }

    /// Run the full DAG to completion and return the terminal report.
    pub async fn execute_tasks(&self, tasks: &[TaskNode]) -> Result<ExecutionResult, ExecutorError> {
        let run_id = Uuid::new_v4().to_string();

        let graph = TaskGraph::from_tasks(tasks)?;
        graph.validate()?;
        let stages = graph.topological_sort()?;

        tracing::info!(
            run_id = %run_id,
            tasks = graph.nodes.len(),
            stages = stages.len(),
            "starting DAG run"
        );
        emit_run_start(&self.opts, &run_id, graph.nodes.len(), stages.len());

        let result = self.execute_stages(&graph, stages, &run_id).await?;

        tracing::info!(
            run_id = %run_id,
            success = result.success,
            failed = result.failed.len(),
            skipped = result.skipped.len(),
            duration_ms = result.duration_ms,
            "DAG run finished"
        );
        emit_run_end(&self.opts, &run_id, &result);

        Ok(result)
    }

    /// Execute all stages in order; tasks within a stage run in parallel.
    pub async fn execute_stages(
        &self,
        graph: &TaskGraph<TaskNode>,
        stages: Vec<Vec<String>>,
        run_id: &str,
    ) -> Result<ExecutionResult, ExecutorError> {
        let start = Instant::now();
        let mut task_results: HashMap<String, TaskResult> = HashMap::new();
        let total_stages = stages.len();

        let progress_enabled =
            self.opts.progress_bar && !self.opts.quiet && self.opts.stream_format == "text";
        let progress = Arc::new(Mutex::new(ProgressMonitor::new(
            graph.nodes.len(),
            progress_enabled,
        )));

        emit_execution_plan(&self.opts, run_id, &stages);

        let max_parallel = self
            .opts
            .max_parallel
            .unwrap_or(self.config.max_parallel_tasks)
            .max(1);

        for stage_id in 0..stages.len() {
            let task_ids = &stages[stage_id];
            emit_stage_start(&self.opts, run_id, stage_id, task_ids);
            if let Ok(monitor) = progress.lock() {
                monitor.update_stage(stage_id, total_stages);
            }

            // A node runs only if its dependencies actually succeeded, not
            // merely because the layering scheduled it after them.
            let mut runnable: Vec<String> = Vec::new();
            for task_id in task_ids {
                if task_results.contains_key(task_id) {
                    continue; // already skipped by an earlier propagation pass
                }
                let node = graph.nodes.get(task_id).ok_or_else(|| {
                    ExecutorError::Internal(format!("task not in graph: {task_id}"))
                })?;
                match blocking_dependency(node, graph, &task_results) {
                    Some(reason) => {
                        self.record_skip(&mut task_results, &progress, run_id, task_id, reason);
                    }
                    None => runnable.push(task_id.clone()),
                }
            }

            if let Ok(mut monitor) = progress.lock() {
                for task_id in &runnable {
                    monitor.add_task(task_id);
                }
            }

            let graph_arc = Arc::new(graph.clone());
            let opts = self.opts.clone();
            let run_id_owned = run_id.to_string();
            let progress_handle = progress.clone();
            let sink = self.sink.clone();
            let capture_bytes = self.opts.capture_bytes;
            let default_timeout_ms = self.config.default_timeout_ms;

            let executor_fn = move |task_id: String| {
                let graph = graph_arc.clone();
                let opts = opts.clone();
                let run_id = run_id_owned.clone();
                let progress = progress_handle.clone();
                let sink = sink.clone();

                async move {
                    let node = graph
                        .nodes
                        .get(&task_id)
                        .ok_or_else(|| {
                            ExecutorError::Internal(format!("task not in graph: {task_id}"))
                        })?
                        .clone();

                    tracing::debug!(task_id = %task_id, stage_id, "task starting");
                    emit_task_start(&opts, &run_id, &task_id, stage_id);

                    let result =
                        execute_with_retries(&node, default_timeout_ms, capture_bytes).await;

                    if result.success {
                        tracing::debug!(task_id = %task_id, duration_ms = result.duration_ms, "task succeeded");
                    } else {
                        tracing::warn!(
                            task_id = %task_id,
                            error = result.error.as_deref().unwrap_or("unknown"),
                            retries_used = result.retries_used,
                            "task failed"
                        );
                    }
                    emit_task_end(&opts, &run_id, &result);
                    if let Ok(mut monitor) = progress.lock() {
                        monitor.complete_task(&task_id, result.success, result.duration_ms);
                    }

                    if result.success {
                        if let Some(sink) = &sink {
                            if let Err(e) = sink.record(&node, &result).await {
                                tracing::warn!(
                                    task_id = %task_id,
                                    sink = sink.name(),
                                    error = %e,
                                    "resource sink failed; task outcome unaffected"
                                );
                            }
                        }
                    }

                    Ok(result)
                }
            };

            let stage_results =
                execute_stage_parallel(&runnable, max_parallel, executor_fn).await?;

            let failed_ids: Vec<String> = stage_results
                .values()
                .filter(|r| !r.success && !r.skipped)
                .map(|r| r.task_id.clone())
                .collect();
            let critical_failure = failed_ids
                .iter()
                .any(|id| graph.nodes[id].severity == Severity::Critical);

            task_results.extend(stage_results);
            emit_stage_end(&self.opts, run_id, stage_id);

            // Skip transitive dependents of every hard failure before they
            // are ever scheduled.
            for failed_id in &failed_ids {
                if graph.nodes[failed_id].can_fail_safely {
                    continue;
                }
                for descendant in graph.descendants(failed_id) {
                    if !task_results.contains_key(&descendant) {
                        self.record_skip(
                            &mut task_results,
                            &progress,
                            run_id,
                            &descendant,
                            format!("dependency '{failed_id}' failed"),
                        );
                    }
                }
            }

            // Critical halt. The stage has already drained; everything still
            // unresolved is skipped and no further stage starts.
            if critical_failure {
                tracing::error!(stage_id, "critical task failed; halting run");
                for later_stage in &stages {
                    for task_id in later_stage {
                        if !task_results.contains_key(task_id) {
                            self.record_skip(
                                &mut task_results,
                                &progress,
                                run_id,
                                task_id,
                                "critical task failed in earlier stage".to_string(),
                            );
                        }
                    }
                }
                break;
            }
        }

        let all_success = task_results.values().all(|r| r.success || r.skipped);
        if let Ok(monitor) = progress.lock() {
            monitor.finish(all_success);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        Ok(ExecutionResult::from_results(task_results, stages, duration_ms))
    }

    fn record_skip(
        &self,
        results: &mut HashMap<String, TaskResult>,
        progress: &Mutex<ProgressMonitor>,
        run_id: &str,
        task_id: &str,
        reason: String,
    ) {
        tracing::info!(task_id = %task_id, reason = %reason, "task skipped");
        emit_task_skipped(&self.opts, run_id, task_id, &reason);
        if let Ok(mut monitor) = progress.lock() {
            monitor.skip_task(task_id);
        }
        results.insert(task_id.to_string(), TaskResult::skip(task_id, reason));
    }
}

impl ExecutionEngineBuilder {
    pub fn new(config: ExecutorConfig, opts: ExecutionOpts) -> Self {
        Self {
            config,
            opts,
            sink: None,
        }
    }

    pub fn resource_sink(mut self, sink: Arc<dyn ResourceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> ExecutionEngine {
        ExecutionEngine {
            config: self.config,
            opts: self.opts,
            sink: self.sink,
        }
    }
}

/// Convenience entry point: run `tasks` with the given config and options.
pub async fn execute_tasks(
    tasks: &[TaskNode],
    config: ExecutorConfig,
    opts: ExecutionOpts,
) -> Result<ExecutionResult, ExecutorError> {
    let engine = ExecutionEngine::new(config, opts);
    engine.execute_tasks(tasks).await
}

/// Return the reason `node` cannot run, if any dependency did not succeed.
///
/// A failed dependency marked `can_fail_safely` does not block its
/// dependents; a skipped dependency always does.
fn blocking_dependency(
    node: &TaskNode,
    graph: &TaskGraph<TaskNode>,
    results: &HashMap<String, TaskResult>,
) -> Option<String> {
    for dep in &node.depends_on {
        let Some(dep_result) = results.get(dep) else {
            // Dependencies always resolve in earlier stages; a missing
            // result means the run was cut short before the dependency ran.
            return Some(format!("dependency '{dep}' was never executed"));
        };
        if dep_result.skipped {
            return Some(format!("dependency '{dep}' was skipped"));
        }
        if !dep_result.success && !graph.nodes[dep].can_fail_safely {
            return Some(format!("dependency '{dep}' failed"));
        }
    }
    None
}

/// Run one node to a terminal result, retrying per its retry budget.
///
/// Each retry re-submits a fresh node value with `retry_count` decremented;
/// the caller's definition is never mutated. The returned result carries the
/// final attempt's output and exit code, with duration summed across
/// attempts.
async fn execute_with_retries(
    node: &TaskNode,
    default_timeout_ms: u64,
    capture_bytes: usize,
) -> TaskResult {
    let Some(command) = node.command.clone() else {
        return TaskResult {
            task_id: node.id.clone(),
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            retries_used: 0,
            error: Some("task has no command to execute".to_string()),
            skipped: false,
            skip_reason: None,
        };
    };

    let mut current = node.clone();
    if current.timeout_ms.is_none() {
        current.timeout_ms = Some(default_timeout_ms);
    }
    let mut retries_used: u32 = 0;
    let mut total_duration_ms: u64 = 0;

    loop {
        let attempt = run_attempt(&current, &command, capture_bytes).await;
        total_duration_ms += attempt.duration_ms;

        let validation_failed = attempt.exit_code == 0
            && current
                .validation
                .as_ref()
                .is_some_and(|check| !check.matches(&attempt.stdout));
        let success = attempt.exit_code == 0 && !validation_failed;

        if success || current.retry_count == 0 {
            let error = if success {
                None
            } else if validation_failed {
                Some("output validation failed".to_string())
            } else {
                Some(attempt.describe_failure())
            };
            return TaskResult {
                task_id: node.id.clone(),
                success,
                exit_code: Some(attempt.exit_code),
                stdout: attempt.stdout,
                stderr: attempt.stderr,
                duration_ms: total_duration_ms,
                retries_used,
                error,
                skipped: false,
                skip_reason: None,
            };
        }

        tracing::debug!(
            task_id = %node.id,
            remaining = current.retry_count,
            "attempt failed; retrying"
        );
        if let Some(delay) = current.retry_delay_ms {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        // Fresh value with the retry budget decremented; never an in-place
        // mutation of shared state.
        let mut next = current.clone();
        next.retry_count -= 1;
        current = next;
        retries_used += 1;
    }
}
