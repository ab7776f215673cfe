//! Periodic removal of expired artifacts.
//!
//! Encoded outputs and leftover temp frame dumps accumulate on disk;
//! a background task sweeps them once their TTL has passed.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use svgmoji_core::CleanupConfig;

/// Sweeps the given directories, deleting files older than the TTL.
pub struct CleanupTask {
    config: CleanupConfig,
    dirs: Vec<PathBuf>,
}

/// Handle to a running cleanup task.
pub struct CleanupHandle {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl CleanupHandle {
    /// Stop the task and wait for the current sweep to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.handle.await;
    }
}

impl CleanupTask {
    pub fn new(config: CleanupConfig, dirs: Vec<PathBuf>) -> Self {
        Self { config, dirs }
    }

    /// Spawn the sweep loop. The first sweep runs after one full
    /// interval, not at startup.
    pub fn spawn(self) -> CleanupHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(self.config.interval_mins * 60);
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                    _ = &mut stop_rx => {
                        debug!("Cleanup task stopping");
                        break;
                    }
                }
            }
        });
        CleanupHandle { stop_tx, handle }
    }

    /// Delete files in the configured directories whose modification
    /// time is older than the TTL. Subdirectories are removed whole;
    /// the WebM encoder stages frame sequences in per-job directories.
    pub async fn sweep(&self) {
        let ttl = Duration::from_secs(self.config.output_ttl_mins * 60);
        let mut removed = 0usize;

        for dir in &self.dirs {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };

            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                let expired = match entry.metadata().await.and_then(|m| m.modified()) {
                    Ok(modified) => modified
                        .elapsed()
                        .map(|age| age >= ttl)
                        .unwrap_or(false),
                    Err(e) => {
                        warn!("Failed to stat {:?}: {}", path, e);
                        continue;
                    }
                };
                if !expired {
                    continue;
                }

                let result = if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                    tokio::fs::remove_dir_all(&path).await
                } else {
                    tokio::fs::remove_file(&path).await
                };
                match result {
                    Ok(()) => {
                        debug!("Removed expired artifact {:?}", path);
                        removed += 1;
                    }
                    Err(e) => warn!("Failed to remove {:?}: {}", path, e),
                }
            }
        }

        if removed > 0 {
            info!("Cleanup sweep removed {} expired entries", removed);
        }
    }
}
