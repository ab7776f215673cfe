//! Configuration for the renderer worker pool.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the renderer worker pool and its workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Path to the headless renderer executable. `None` resolves
    /// `svgmoji-renderer` from `PATH`.
    #[serde(default)]
    pub renderer_path: Option<PathBuf>,

    /// Workers kept warm even when idle.
    #[serde(default = "default_min_workers")]
    pub min_workers: usize,

    /// Hard cap on live workers.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Idle workers above `min_workers` are destroyed after this long.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// How long a job waits for a worker before failing.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Per-request response timeout for worker protocol calls.
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,

    /// Base delay before retrying a worker launch after a failure.
    #[serde(default = "default_launch_backoff_base_ms")]
    pub launch_backoff_base_ms: u64,

    /// Ceiling for the exponential launch backoff.
    #[serde(default = "default_launch_backoff_cap_ms")]
    pub launch_backoff_cap_ms: u64,

    /// Delay after opening a document, letting layout and fonts settle.
    #[serde(default = "default_load_settle_ms")]
    pub load_settle_ms: u64,

    /// Delay between seeking and rasterizing each frame.
    #[serde(default = "default_frame_settle_ms")]
    pub frame_settle_ms: u64,
}

fn default_min_workers() -> usize {
    0
}

fn default_max_workers() -> usize {
    3
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_response_timeout_secs() -> u64 {
    30
}

fn default_launch_backoff_base_ms() -> u64 {
    500
}

fn default_launch_backoff_cap_ms() -> u64 {
    30_000
}

fn default_load_settle_ms() -> u64 {
    500
}

fn default_frame_settle_ms() -> u64 {
    20
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            renderer_path: None,
            min_workers: default_min_workers(),
            max_workers: default_max_workers(),
            idle_timeout_secs: default_idle_timeout_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            response_timeout_secs: default_response_timeout_secs(),
            launch_backoff_base_ms: default_launch_backoff_base_ms(),
            launch_backoff_cap_ms: default_launch_backoff_cap_ms(),
            load_settle_ms: default_load_settle_ms(),
            frame_settle_ms: default_frame_settle_ms(),
        }
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    /// Exponential backoff before the next launch attempt, given the
    /// number of consecutive failures so far.
    pub fn launch_backoff(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }
        let exp = consecutive_failures.saturating_sub(1).min(16);
        let delay = self
            .launch_backoff_base_ms
            .saturating_mul(1u64 << exp)
            .min(self.launch_backoff_cap_ms);
        Duration::from_millis(delay)
    }
}
