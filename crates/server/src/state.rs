use std::sync::Arc;
use std::time::Instant;

use svgmoji_core::{
    AdmissionQueue, Config, Orchestrator, PoolStats, QueueStats, SanitizedConfig, WorkerPool,
};

/// Shared application state
pub struct AppState {
    config: Config,
    queue: Arc<AdmissionQueue>,
    pool: Arc<WorkerPool>,
    orchestrator: Orchestrator,
    started: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        queue: Arc<AdmissionQueue>,
        pool: Arc<WorkerPool>,
        orchestrator: Orchestrator,
    ) -> Self {
        Self {
            config,
            queue,
            pool,
            orchestrator,
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
