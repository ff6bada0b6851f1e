use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum tasks in flight within one stage.
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,

    /// Bytes captured per stream per task.
    #[serde(default = "default_capture_bytes")]
    pub capture_bytes: usize,

    /// Timeout applied to tasks that declare none, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
}

fn default_max_parallel_tasks() -> usize {
    num_cpus::get().clamp(1, 8)
}

fn default_capture_bytes() -> usize {
    64 * 1024
}

fn default_timeout_ms() -> u64 {
    300_000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: default_max_parallel_tasks(),
            capture_bytes: default_capture_bytes(),
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// EnvFilter string, e.g. "info" or "dagrun_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If unset, file logging is off.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert!(cfg.executor.max_parallel_tasks >= 1);
        assert_eq!(cfg.executor.capture_bytes, 64 * 1024);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [executor]
            max_parallel_tasks = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.executor.max_parallel_tasks, 2);
        assert_eq!(cfg.executor.default_timeout_ms, 300_000);
        assert!(cfg.logging.console);
    }
}
