use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::executor::types::TaskNode;

pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;
pub const MAX_TIMEOUT_MS: u64 = 60 * 60 * 1000;

/// Exit code recorded when a command is aborted by its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code recorded when the command cannot be spawned at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

pub fn effective_timeout_ms(timeout: Option<u64>) -> u64 {
    timeout.unwrap_or(DEFAULT_TIMEOUT_MS).clamp(1, MAX_TIMEOUT_MS)
}

/// Outcome of one attempt of one node.
#[derive(Debug, Clone)]
pub struct AttemptOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl AttemptOutput {
    pub fn describe_failure(&self) -> String {
        if self.timed_out {
            format!("timed out ({TIMEOUT_EXIT_CODE})")
        } else {
            format!("exited with code {}", self.exit_code)
        }
    }
}

/// Run one attempt of `node`'s command under its timeout.
///
/// Stdout and stderr are captured up to `capture_bytes` each; the streams
/// keep draining past the cap so the child never blocks on a full pipe.
/// Spawn failures (command not found, permission denied) are reported as a
/// failed attempt rather than an executor error, so they stay retryable.
pub async fn run_attempt(node: &TaskNode, command: &str, capture_bytes: usize) -> AttemptOutput {
    let start = Instant::now();
    let timeout = Duration::from_millis(effective_timeout_ms(node.timeout_ms));

    let mut child = match Command::new(command)
        .args(&node.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            return AttemptOutput {
                exit_code: SPAWN_FAILURE_EXIT_CODE,
                stdout: String::new(),
                stderr: format!("failed to spawn '{command}': {e}"),
                duration_ms: start.elapsed().as_millis() as u64,
                timed_out: false,
            };
        }
    };

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_task = tokio::spawn(read_capped(stdout_pipe, capture_bytes));
    let stderr_task = tokio::spawn(read_capped(stderr_pipe, capture_bytes));

    let (timed_out, status) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => (false, status),
        Err(_) => {
            // Budget exhausted: kill and reap so the pipes close
            let _ = child.start_kill();
            (true, child.wait().await)
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    let exit_code = if timed_out {
        TIMEOUT_EXIT_CODE
    } else {
        match status {
            Ok(status) => status.code().unwrap_or(-1),
            Err(_) => -1,
        }
    };

    AttemptOutput {
        exit_code,
        stdout,
        stderr,
        duration_ms: start.elapsed().as_millis() as u64,
        timed_out,
    }
}

async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, cap: usize) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };

    let mut captured = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if captured.len() < cap {
                    let take = n.min(cap - captured.len());
                    captured.extend_from_slice(&chunk[..take]);
                }
            }
        }
    }

    String::from_utf8_lossy(&captured).into_owned()
}
