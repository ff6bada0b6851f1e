/// Per-run execution options.
#[derive(Debug, Clone)]
pub struct ExecutionOpts {
    /// Output stream format: "text" or "jsonl"
    pub stream_format: String,

    /// Verbose output (plan, per-task lines)
    pub verbose: bool,

    /// Quiet mode (suppress non-essential output)
    pub quiet: bool,

    /// ASCII-only markers (no Unicode)
    pub ascii: bool,

    /// Bytes to capture from each stream of each task
    pub capture_bytes: usize,

    /// Maximum parallel tasks (overrides config if Some)
    pub max_parallel: Option<usize>,

    /// Enable visual progress bar (only sensible for text output)
    pub progress_bar: bool,
}

impl Default for ExecutionOpts {
    fn default() -> Self {
        Self {
            stream_format: "text".to_string(),
            verbose: false,
            quiet: false,
            ascii: false,
            capture_bytes: 64 * 1024,
            max_parallel: None,
            progress_bar: false,
        }
    }
}
