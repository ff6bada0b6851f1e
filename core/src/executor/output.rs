use chrono::Local;
use serde::Serialize;

use super::types::{ExecutionOpts, ExecutionResult, TaskResult};

/// One lifecycle event on the JSONL stream.
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    pub v: u32,
    #[serde(rename = "type")]
    pub event_type: String,
    pub ts: String,
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl RunEvent {
    fn new(event_type: &str, run_id: &str) -> Self {
        Self {
            v: 1,
            event_type: event_type.to_string(),
            ts: Local::now().to_rfc3339(),
            run_id: run_id.to_string(),
            task_id: None,
            code: None,
            metadata: None,
        }
    }
}

fn emit_json(event: &RunEvent) {
    if let Ok(line) = serde_json::to_string(event) {
        println!("{line}");
    }
}

fn jsonl(opts: &ExecutionOpts) -> bool {
    opts.stream_format == "jsonl"
}

fn marker(opts: &ExecutionOpts, unicode: &str, ascii: &str) -> String {
    if opts.ascii { ascii.to_string() } else { unicode.to_string() }
}

/// Emit the computed stage plan (JSONL always, text only when verbose).
pub fn emit_execution_plan(opts: &ExecutionOpts, run_id: &str, stages: &[Vec<String>]) {
    if jsonl(opts) {
        let total_tasks: usize = stages.iter().map(|s| s.len()).sum();
        let mut event = RunEvent::new("executor.plan", run_id);
        event.metadata = Some(serde_json::json!({
            "stages": stages,
            "total_tasks": total_tasks,
        }));
        emit_json(&event);
    } else if opts.verbose && !opts.quiet {
        println!("Execution plan:");
        for (i, stage) in stages.iter().enumerate() {
            println!("  stage {}: {}", i, stage.join(", "));
        }
        println!();
    }
}

pub fn emit_run_start(opts: &ExecutionOpts, run_id: &str, total_tasks: usize, total_stages: usize) {
    if jsonl(opts) {
        let mut event = RunEvent::new("run.start", run_id);
        event.metadata = Some(serde_json::json!({
            "total_tasks": total_tasks,
            "total_stages": total_stages,
        }));
        emit_json(&event);
    } else if !opts.quiet {
        println!(
            "{} Starting execution: {} tasks in {} stages",
            marker(opts, "🚀", ">>"),
            total_tasks,
            total_stages
        );
    }
}

pub fn emit_run_end(opts: &ExecutionOpts, run_id: &str, result: &ExecutionResult) {
    if jsonl(opts) {
        let mut event = RunEvent::new("run.end", run_id);
        event.code = Some(if result.success { 0 } else { 1 });
        event.metadata = Some(serde_json::json!({
            "success": result.success,
            "executed": result.executed,
            "failed": result.failed,
            "skipped": result.skipped,
            "duration_ms": result.duration_ms,
        }));
        emit_json(&event);
    } else if !opts.quiet {
        let icon = if result.success {
            marker(opts, "✅", "OK")
        } else {
            marker(opts, "❌", "FAIL")
        };
        println!(
            "\n{} Execution finished: {} succeeded, {} failed, {} skipped in {}ms",
            icon,
            result.executed.len(),
            result.failed.len(),
            result.skipped.len(),
            result.duration_ms
        );
    }
}

pub fn emit_stage_start(opts: &ExecutionOpts, run_id: &str, stage_id: usize, task_ids: &[String]) {
    if jsonl(opts) {
        let mut event = RunEvent::new("stage.start", run_id);
        event.metadata = Some(serde_json::json!({
            "stage_id": stage_id,
            "tasks": task_ids,
        }));
        emit_json(&event);
    } else if opts.verbose && !opts.quiet {
        println!("{} Stage {} ({} tasks)", marker(opts, "▶", ">"), stage_id, task_ids.len());
    }
}

pub fn emit_stage_end(opts: &ExecutionOpts, run_id: &str, stage_id: usize) {
    if jsonl(opts) {
        let mut event = RunEvent::new("stage.end", run_id);
        event.metadata = Some(serde_json::json!({ "stage_id": stage_id }));
        emit_json(&event);
    }
}

pub fn emit_task_start(opts: &ExecutionOpts, run_id: &str, task_id: &str, stage_id: usize) {
    if jsonl(opts) {
        let mut event = RunEvent::new("task.start", run_id);
        event.task_id = Some(task_id.to_string());
        event.metadata = Some(serde_json::json!({ "stage_id": stage_id }));
        emit_json(&event);
    } else if opts.verbose && !opts.quiet {
        println!("  {} starting {}", marker(opts, "⏳", ".."), task_id);
    }
}

pub fn emit_task_end(opts: &ExecutionOpts, run_id: &str, result: &TaskResult) {
    if jsonl(opts) {
        let mut event = RunEvent::new("task.end", run_id);
        event.task_id = Some(result.task_id.clone());
        event.code = result.exit_code;
        event.metadata = Some(serde_json::json!({
            "success": result.success,
            "duration_ms": result.duration_ms,
            "retries_used": result.retries_used,
            "error": result.error,
        }));
        emit_json(&event);
    } else if opts.verbose && !opts.quiet {
        let icon = if result.success {
            marker(opts, "✅", "ok")
        } else {
            marker(opts, "❌", "fail")
        };
        let retry_info = if result.retries_used > 0 {
            format!(" (retries: {})", result.retries_used)
        } else {
            String::new()
        };
        println!(
            "  {} {}: {}ms{}",
            icon, result.task_id, result.duration_ms, retry_info
        );
    }
}

pub fn emit_task_skipped(opts: &ExecutionOpts, run_id: &str, task_id: &str, reason: &str) {
    if jsonl(opts) {
        let mut event = RunEvent::new("task.skipped", run_id);
        event.task_id = Some(task_id.to_string());
        event.metadata = Some(serde_json::json!({ "reason": reason }));
        emit_json(&event);
    } else if opts.verbose && !opts.quiet {
        println!("  {} {} skipped: {}", marker(opts, "⏭", "--"), task_id, reason);
    }
}
