use std::path::PathBuf;
use std::time::Duration;

/// Default per-command completion wait.
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_millis(2000);

/// Run-wide parameters the harness consumes but does not own: queue
/// identity, the default command timeout, and where diagnostic dump
/// artifacts land.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Queue id used for the group's IO queue pair.
    pub io_qid: u16,
    /// Outstanding-command capacity of the group's IO queue pair.
    pub io_queue_capacity: u16,
    /// How long `send_and_reap` waits for a completion before failing.
    pub cmd_timeout: Duration,
    /// Directory receiving queue-state dump artifacts.
    pub dump_dir: PathBuf,
    /// Case-name substring filter; `None` runs everything.
    pub filter: Option<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            io_qid: 1,
            io_queue_capacity: 64,
            cmd_timeout: DEFAULT_CMD_TIMEOUT,
            dump_dir: PathBuf::from("nvmecheck-dumps"),
            filter: None,
        }
    }
}

impl HarnessConfig {
    /// Defaults with environment overrides applied (see crate docs).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = std::env::var("NVMECHECK_CMD_TIMEOUT_MS")
            .ok()
            .and_then(|v| parse_ms_env(&v))
        {
            config.cmd_timeout = Duration::from_millis(ms);
        }
        if let Some(dir) = std::env::var_os("NVMECHECK_DUMP_DIR") {
            config.dump_dir = PathBuf::from(dir);
        }
        config.filter = std::env::var("NVMECHECK_FILTER")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        config
    }
}

fn parse_ms_env(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Allow `_` separators so values can be copied from code.
    let cleaned: String = trimmed.chars().filter(|c| *c != '_').collect();
    cleaned.parse::<u64>().ok()
}
