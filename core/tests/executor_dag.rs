//! End-to-end executor scenarios against real subprocesses.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use dagrun_core::config::ExecutorConfig;
use dagrun_core::executor::traits::ResourceSink;
use dagrun_core::{
    ExecutionEngine, ExecutionOpts, ExecutorError, OutputCheck, Severity, TaskNode, TaskResult,
};

fn sh(id: &str, script: &str) -> TaskNode {
    TaskNode::new(id, "sh", ["-c", script])
}

fn with_deps(mut node: TaskNode, deps: &[&str]) -> TaskNode {
    node.depends_on = deps.iter().map(|d| d.to_string()).collect();
    node
}

fn quiet_opts() -> ExecutionOpts {
    ExecutionOpts {
        quiet: true,
        ..ExecutionOpts::default()
    }
}

fn engine() -> ExecutionEngine {
    ExecutionEngine::new(ExecutorConfig::default(), quiet_opts())
}

#[tokio::test]
async fn linear_chain_failure_skips_all_descendants() {
    let tasks = [
        sh("a", "exit 1"),
        with_deps(sh("b", "echo b"), &["a"]),
        with_deps(sh("c", "echo c"), &["b"]),
    ];

    let result = engine().execute_tasks(&tasks).await.unwrap();

    assert!(!result.success);
    assert!(result.executed.is_empty());
    assert_eq!(result.failed, vec!["a"]);
    assert_eq!(result.skipped, vec!["b", "c"]);

    let b = &result.task_results["b"];
    assert!(b.skipped);
    assert!(b.skip_reason.as_deref().unwrap().contains("'a'"));
}

#[tokio::test]
async fn independent_tasks_all_execute() {
    let opts = ExecutionOpts {
        max_parallel: Some(2),
        ..quiet_opts()
    };
    let engine = ExecutionEngine::new(ExecutorConfig::default(), opts);

    let result = engine
        .execute_tasks(&[sh("a", "echo a"), sh("b", "echo b")])
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.executed, vec!["a", "b"]);
    assert!(result.failed.is_empty());
    assert!(result.skipped.is_empty());
    assert_eq!(result.task_results["a"].stdout.trim(), "a");
}

#[tokio::test]
async fn retry_exhaustion_runs_n_plus_one_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("attempts");
    let script = format!("echo x >> {}; exit 1", marker.display());

    let node = TaskNode {
        retry_count: 2,
        retry_delay_ms: Some(10),
        ..sh("flaky", &script)
    };

    let result = engine().execute_tasks(&[node]).await.unwrap();

    let attempts = std::fs::read_to_string(&marker).unwrap().lines().count();
    assert_eq!(attempts, 3);

    let flaky = &result.task_results["flaky"];
    assert!(!flaky.success);
    assert_eq!(flaky.retries_used, 2);
    assert_eq!(result.failed, vec!["flaky"]);
}

#[tokio::test]
async fn retry_succeeds_on_a_later_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("attempts");
    // Fails until the third attempt has appended its line
    let script = format!(
        "echo x >> {m}; test $(wc -l < {m}) -ge 3",
        m = marker.display()
    );

    let node = TaskNode {
        retry_count: 5,
        ..sh("flaky", &script)
    };

    let result = engine().execute_tasks(&[node]).await.unwrap();

    let flaky = &result.task_results["flaky"];
    assert!(flaky.success);
    assert_eq!(flaky.retries_used, 2);
    assert!(result.success);
}

#[tokio::test]
async fn safe_failure_does_not_cascade() {
    let tasks = [
        TaskNode {
            can_fail_safely: true,
            ..sh("a", "exit 1")
        },
        with_deps(sh("b", "echo b"), &["a"]),
    ];

    let result = engine().execute_tasks(&tasks).await.unwrap();

    assert_eq!(result.failed, vec!["a"]);
    assert_eq!(result.executed, vec!["b"]);
    assert!(result.skipped.is_empty());
    // The run still reports failure because a node failed
    assert!(!result.success);
}

#[tokio::test]
async fn critical_failure_halts_after_draining_the_stage() {
    let tasks = [
        TaskNode {
            severity: Severity::Critical,
            ..sh("a", "exit 1")
        },
        sh("b", "echo b"),
        with_deps(sh("c", "echo c"), &["b"]),
    ];

    let result = engine().execute_tasks(&tasks).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.failed, vec!["a"]);
    // b shares a's stage and is allowed to finish
    assert_eq!(result.executed, vec!["b"]);
    // c's dependency succeeded, but the run halted before its stage
    assert_eq!(result.skipped, vec!["c"]);
    assert_eq!(
        result.task_results["c"].skip_reason.as_deref(),
        Some("critical task failed in earlier stage")
    );
}

#[tokio::test]
async fn validation_failure_is_treated_as_failure() {
    let tasks = [
        TaskNode {
            validation: Some(OutputCheck::Contains("goodbye".to_string())),
            ..sh("checked", "echo hello")
        },
        TaskNode {
            validation: Some(OutputCheck::pattern(r"^hel+o$").unwrap()),
            ..sh("passing", "echo hello")
        },
    ];

    let result = engine().execute_tasks(&tasks).await.unwrap();

    let checked = &result.task_results["checked"];
    assert!(!checked.success);
    assert_eq!(checked.exit_code, Some(0));
    assert_eq!(checked.error.as_deref(), Some("output validation failed"));
    assert!(result.task_results["passing"].success);
}

#[tokio::test]
async fn timeout_is_local_to_the_node() {
    let tasks = [
        TaskNode {
            timeout_ms: Some(200),
            ..sh("slow", "sleep 5")
        },
        sh("fast", "echo fast"),
    ];

    let started = Instant::now();
    let result = engine().execute_tasks(&tasks).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(result.failed, vec!["slow"]);
    assert!(result.task_results["slow"]
        .error
        .as_deref()
        .unwrap()
        .contains("timed out"));
    assert_eq!(result.executed, vec!["fast"]);
}

#[tokio::test]
async fn node_without_command_fails() {
    let mut node = sh("empty", "");
    node.command = None;

    let result = engine().execute_tasks(&[node]).await.unwrap();

    let empty = &result.task_results["empty"];
    assert!(!empty.success);
    assert!(!empty.skipped);
    assert!(empty.error.as_deref().unwrap().contains("no command"));
}

#[tokio::test]
async fn summary_is_rederivable_from_the_result_map() {
    let tasks = [
        sh("ok", "echo ok"),
        sh("bad", "exit 3"),
        with_deps(sh("child", "echo child"), &["bad"]),
    ];

    let result = engine().execute_tasks(&tasks).await.unwrap();

    let mut executed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();
    for r in result.task_results.values() {
        if r.skipped {
            skipped.push(r.task_id.clone());
        } else if r.success {
            executed.push(r.task_id.clone());
        } else {
            failed.push(r.task_id.clone());
        }
    }
    executed.sort();
    failed.sort();
    skipped.sort();

    assert_eq!(executed, result.executed);
    assert_eq!(failed, result.failed);
    assert_eq!(skipped, result.skipped);
    assert_eq!(result.success, result.failed.is_empty());
    // Exactly one result per node
    assert_eq!(result.task_results.len(), tasks.len());
}

#[tokio::test]
async fn malformed_graphs_never_execute_anything() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");
    let script = format!("touch {}", marker.display());

    // Cycle
    let tasks = [
        with_deps(sh("a", &script), &["b"]),
        with_deps(sh("b", &script), &["a"]),
    ];
    let err = engine().execute_tasks(&tasks).await.unwrap_err();
    assert!(matches!(err, ExecutorError::CircularDependency(_)));
    assert!(!marker.exists());

    // Duplicate id
    let err = engine()
        .execute_tasks(&[sh("dup", &script), sh("dup", &script)])
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::DuplicateTaskId(_)));
    assert!(!marker.exists());

    // Dangling dependency
    let err = engine()
        .execute_tasks(&[with_deps(sh("a", &script), &["ghost"])])
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::DependencyNotFound { .. }));
    assert!(!marker.exists());
}

struct RecordingSink {
    seen: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl ResourceSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn record(&self, node: &TaskNode, _result: &TaskResult) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(node.id.clone());
        if self.fail {
            anyhow::bail!("sink unavailable");
        }
        Ok(())
    }
}

#[tokio::test]
async fn resource_sink_sees_successes_and_failures_are_nonfatal() {
    let sink = Arc::new(RecordingSink {
        seen: Mutex::new(Vec::new()),
        fail: true,
    });

    let engine = ExecutionEngine::builder(ExecutorConfig::default(), quiet_opts())
        .resource_sink(sink.clone())
        .build();

    let result = engine
        .execute_tasks(&[sh("ok", "echo ok"), sh("bad", "exit 1")])
        .await
        .unwrap();

    // Sink error never affects the node outcome
    assert_eq!(result.executed, vec!["ok"]);
    assert_eq!(result.failed, vec!["bad"]);
    // Only the successful node reaches the sink
    assert_eq!(*sink.seen.lock().unwrap(), vec!["ok".to_string()]);
}

#[tokio::test]
async fn diamond_graph_runs_in_three_stages() {
    let tasks = [
        sh("root", "echo root"),
        with_deps(sh("left", "echo left"), &["root"]),
        with_deps(sh("right", "echo right"), &["root"]),
        with_deps(sh("join", "echo join"), &["left", "right"]),
    ];

    let result = engine().execute_tasks(&tasks).await.unwrap();

    assert!(result.success);
    assert_eq!(result.stages.len(), 3);
    assert_eq!(result.stages[0], vec!["root"]);
    assert_eq!(result.stages[2], vec!["join"]);
    assert_eq!(result.executed.len(), 4);
}
