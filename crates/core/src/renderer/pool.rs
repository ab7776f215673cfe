//! Recycling pool for renderer workers.
//!
//! Workers take hundreds of milliseconds to launch, so finished jobs
//! return them for reuse instead of tearing them down. The pool
//! validates workers on borrow, resets them on release, backs off
//! exponentially when the backend keeps failing to launch, and evicts
//! workers that sit idle past the timeout.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, timeout_at};

use super::config::PoolConfig;
use super::error::RenderError;
use super::traits::{RenderBackend, RenderWorker};
use crate::metrics;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Worker pool is draining")]
    Draining,

    #[error("Timed out after {timeout_secs} seconds waiting for a renderer worker")]
    AcquireTimeout { timeout_secs: u64 },

    #[error("Failed to launch renderer worker: {0}")]
    Launch(#[source] RenderError),
}

/// Point-in-time pool counters, exposed by the status endpoints.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Live workers, borrowed and idle.
    pub size: usize,
    /// Idle workers ready for borrowing.
    pub available: usize,
    /// Workers currently held by jobs.
    pub borrowed: usize,
    /// Jobs waiting in `acquire`.
    pub pending: usize,
}

struct IdleWorker {
    worker: Box<dyn RenderWorker>,
    idle_since: Instant,
}

/// Bounded pool of renderer workers.
///
/// A semaphore permit represents the right to hold one worker; permits
/// travel with borrowed workers and return to the pool on release, so
/// live workers never exceed `max_workers`.
pub struct WorkerPool {
    config: PoolConfig,
    backend: Arc<dyn RenderBackend>,
    slots: Arc<Semaphore>,
    idle: Mutex<Vec<IdleWorker>>,
    total: AtomicUsize,
    consecutive_launch_failures: AtomicU32,
    draining: AtomicBool,
    pending: AtomicUsize,
}

impl WorkerPool {
    pub fn new(config: PoolConfig, backend: Arc<dyn RenderBackend>) -> Arc<Self> {
        Arc::new(Self {
            slots: Arc::new(Semaphore::new(config.max_workers)),
            config,
            backend,
            idle: Mutex::new(Vec::new()),
            total: AtomicUsize::new(0),
            consecutive_launch_failures: AtomicU32::new(0),
            draining: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
        })
    }

    /// Borrow a worker, launching one if the pool is under capacity.
    /// Waits up to `acquire_timeout` for a worker to come back when
    /// everything is borrowed.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledWorker, PoolError> {
        if self.draining.load(Ordering::SeqCst) {
            return Err(PoolError::Draining);
        }

        self.pending.fetch_add(1, Ordering::SeqCst);
        let deadline = tokio::time::Instant::now() + self.config.acquire_timeout();
        let result = self.do_acquire(deadline).await;
        self.pending.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn do_acquire(
        self: &Arc<Self>,
        deadline: tokio::time::Instant,
    ) -> Result<PooledWorker, PoolError> {
        let acquire_timeout = PoolError::AcquireTimeout {
            timeout_secs: self.config.acquire_timeout_secs,
        };
        let permit = match timeout_at(deadline, Arc::clone(&self.slots).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Draining),
            Err(_) => return Err(acquire_timeout),
        };

        // Launch failures are retried until the deadline; launch_one
        // sleeps the grown backoff before each retry.
        let mut last_launch_error = None;
        loop {
            let entry = {
                let mut idle = self.idle.lock().unwrap();
                let entry = idle.pop();
                metrics::POOL_AVAILABLE.set(idle.len() as i64);
                entry
            };

            match entry {
                Some(IdleWorker { worker, .. }) => {
                    if worker.is_alive().await {
                        return Ok(PooledWorker {
                            pool: Arc::clone(self),
                            worker: Some(worker),
                            _permit: Some(permit),
                        });
                    }
                    tracing::warn!(worker_id = worker.id(), "discarding dead idle worker");
                    self.destroy(worker).await;
                }
                None => match timeout_at(deadline, self.launch_one()).await {
                    Ok(Ok(worker)) => {
                        return Ok(PooledWorker {
                            pool: Arc::clone(self),
                            worker: Some(worker),
                            _permit: Some(permit),
                        });
                    }
                    Ok(Err(e)) => {
                        if tokio::time::Instant::now() >= deadline {
                            return Err(PoolError::Launch(e));
                        }
                        last_launch_error = Some(e);
                    }
                    Err(_) => {
                        return Err(match last_launch_error {
                            Some(e) => PoolError::Launch(e),
                            None => acquire_timeout,
                        });
                    }
                },
            }
        }
    }

    /// Return a worker after a job. The worker is reset and recycled,
    /// or destroyed when the reset fails or the pool is draining.
    pub async fn release(&self, mut pooled: PooledWorker) {
        let Some(worker) = pooled.worker.take() else {
            return;
        };

        if self.draining.load(Ordering::SeqCst) {
            self.destroy(worker).await;
            return;
        }

        match worker.reset().await {
            Ok(()) => {
                let mut idle = self.idle.lock().unwrap();
                idle.push(IdleWorker {
                    worker,
                    idle_since: Instant::now(),
                });
                metrics::POOL_AVAILABLE.set(idle.len() as i64);
            }
            Err(e) => {
                tracing::warn!(worker_id = worker.id(), error = %e, "reset failed, destroying worker");
                self.destroy(worker).await;
            }
        }
        // The permit drops here, waking the next waiter.
    }

    /// Pre-launch workers up to `min_workers`.
    pub async fn warm(&self) -> Result<(), PoolError> {
        while self.total.load(Ordering::SeqCst) < self.config.min_workers {
            let Ok(_permit) = Arc::clone(&self.slots).try_acquire_owned() else {
                break;
            };
            let worker = self.launch_one().await.map_err(PoolError::Launch)?;
            let mut idle = self.idle.lock().unwrap();
            idle.push(IdleWorker {
                worker,
                idle_since: Instant::now(),
            });
            metrics::POOL_AVAILABLE.set(idle.len() as i64);
        }
        Ok(())
    }

    /// One eviction sweep: destroy workers idle past the timeout,
    /// never shrinking the pool below `min_workers`. Called
    /// periodically by the server.
    pub async fn evict_idle(&self) {
        let evicted: Vec<Box<dyn RenderWorker>> = {
            let mut idle = self.idle.lock().unwrap();
            let mut allowed = self
                .total
                .load(Ordering::SeqCst)
                .saturating_sub(self.config.min_workers);
            let mut kept = Vec::with_capacity(idle.len());
            let mut evicted = Vec::new();
            // Oldest entries sit at the front.
            for entry in idle.drain(..) {
                if allowed > 0 && entry.idle_since.elapsed() >= self.config.idle_timeout() {
                    allowed -= 1;
                    evicted.push(entry.worker);
                } else {
                    kept.push(entry);
                }
            }
            *idle = kept;
            metrics::POOL_AVAILABLE.set(idle.len() as i64);
            evicted
        };

        for worker in evicted {
            tracing::debug!(worker_id = worker.id(), "evicting idle worker");
            metrics::WORKER_EVICTIONS.inc();
            self.destroy(worker).await;
        }
    }

    /// Refuse new borrows and tear down every idle worker. Borrowed
    /// workers are destroyed as their jobs release them.
    pub async fn drain(&self) {
        self.draining.store(true, Ordering::SeqCst);
        self.slots.close();

        let idle: Vec<IdleWorker> = {
            let mut idle = self.idle.lock().unwrap();
            metrics::POOL_AVAILABLE.set(0);
            std::mem::take(&mut *idle)
        };
        tracing::info!(workers = idle.len(), "draining worker pool");
        for entry in idle {
            self.destroy(entry.worker).await;
        }
    }

    pub fn stats(&self) -> PoolStats {
        let size = self.total.load(Ordering::SeqCst);
        let available = self.idle.lock().unwrap().len();
        PoolStats {
            size,
            available,
            borrowed: size.saturating_sub(available),
            pending: self.pending.load(Ordering::SeqCst),
        }
    }

    async fn launch_one(&self) -> Result<Box<dyn RenderWorker>, RenderError> {
        let failures = self.consecutive_launch_failures.load(Ordering::SeqCst);
        let backoff = self.config.launch_backoff(failures);
        if !backoff.is_zero() {
            tracing::debug!(?backoff, failures, "backing off before worker launch");
            sleep(backoff).await;
        }

        match self.backend.launch().await {
            Ok(worker) => {
                self.consecutive_launch_failures.store(0, Ordering::SeqCst);
                metrics::WORKER_LAUNCHES.inc();
                let total = self.total.fetch_add(1, Ordering::SeqCst) + 1;
                metrics::POOL_SIZE.set(total as i64);
                Ok(worker)
            }
            Err(e) => {
                self.consecutive_launch_failures
                    .fetch_add(1, Ordering::SeqCst);
                metrics::WORKER_LAUNCH_FAILURES.inc();
                tracing::error!(error = %e, "worker launch failed");
                Err(e)
            }
        }
    }

    async fn destroy(&self, worker: Box<dyn RenderWorker>) {
        if let Err(e) = worker.shutdown().await {
            tracing::warn!(worker_id = worker.id(), error = %e, "worker shutdown failed");
        }
        let total = self.total.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::POOL_SIZE.set(total as i64);
    }
}

/// A borrowed worker. Return it with [`WorkerPool::release`]; dropping
/// it instead destroys the worker (its process dies with the handle).
pub struct PooledWorker {
    pool: Arc<WorkerPool>,
    worker: Option<Box<dyn RenderWorker>>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl PooledWorker {
    pub fn worker(&self) -> &(dyn RenderWorker + 'static) {
        self.worker
            .as_deref()
            .expect("worker present until released")
    }
}

impl std::fmt::Debug for PooledWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledWorker")
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}

impl std::ops::Deref for PooledWorker {
    type Target = dyn RenderWorker;

    fn deref(&self) -> &Self::Target {
        self.worker()
    }
}

impl Drop for PooledWorker {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            tracing::warn!(worker_id = worker.id(), "pooled worker dropped without release");
            let total = self.pool.total.fetch_sub(1, Ordering::SeqCst) - 1;
            metrics::POOL_SIZE.set(total as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRenderBackend;
    use std::time::Duration;

    fn pool_config(max_workers: usize) -> PoolConfig {
        PoolConfig {
            max_workers,
            acquire_timeout_secs: 2,
            launch_backoff_base_ms: 10,
            launch_backoff_cap_ms: 100,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_acquire_launches_under_cap() {
        let backend = Arc::new(MockRenderBackend::new());
        let pool = WorkerPool::new(pool_config(2), backend.clone());

        let w1 = pool.acquire().await.unwrap();
        let w2 = pool.acquire().await.unwrap();
        assert_eq!(backend.launch_count(), 2);

        let stats = pool.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.borrowed, 2);
        assert_eq!(stats.available, 0);

        pool.release(w1).await;
        pool.release(w2).await;
        assert_eq!(pool.stats().available, 2);
    }

    #[tokio::test]
    async fn test_release_recycles_worker() {
        let backend = Arc::new(MockRenderBackend::new());
        let pool = WorkerPool::new(pool_config(2), backend.clone());

        let w = pool.acquire().await.unwrap();
        pool.release(w).await;
        let _w = pool.acquire().await.unwrap();
        // Recycled, not relaunched.
        assert_eq!(backend.launch_count(), 1);
        assert_eq!(backend.reset_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out_when_all_borrowed() {
        let backend = Arc::new(MockRenderBackend::new());
        let pool = WorkerPool::new(pool_config(1), backend.clone());

        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, PoolError::AcquireTimeout { .. }));
    }

    #[tokio::test]
    async fn test_dead_idle_worker_replaced_on_borrow() {
        let backend = Arc::new(MockRenderBackend::new());
        let pool = WorkerPool::new(pool_config(2), backend.clone());

        let w = pool.acquire().await.unwrap();
        pool.release(w).await;
        backend.kill_all();

        let w = pool.acquire().await.unwrap();
        assert!(w.is_alive().await);
        assert_eq!(backend.launch_count(), 2);
        assert_eq!(pool.stats().size, 1);
    }

    #[tokio::test]
    async fn test_reset_failure_destroys_worker() {
        let backend = Arc::new(MockRenderBackend::new());
        backend.set_fail_reset(true);
        let pool = WorkerPool::new(pool_config(2), backend.clone());

        let w = pool.acquire().await.unwrap();
        pool.release(w).await;

        let stats = pool.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.available, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_launch_failure_is_retried_within_acquire() {
        let backend = Arc::new(MockRenderBackend::new());
        backend.fail_next_launches(1);
        let pool = WorkerPool::new(pool_config(2), backend.clone());

        // The first attempt fails; the same acquire backs off and
        // relaunches without surfacing the failure.
        let w = pool.acquire().await.unwrap();
        assert!(w.is_alive().await);
        assert_eq!(backend.launch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_launch_retries_surface_the_failure() {
        let backend = Arc::new(MockRenderBackend::new());
        backend.fail_next_launches(1000);
        let pool = WorkerPool::new(pool_config(2), backend.clone());

        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, PoolError::Launch(_)));
        // More than one attempt was made before giving up.
        assert!(backend.launch_count() > 1);
    }

    #[tokio::test]
    async fn test_borrowed_worker_derefs_to_trait_object() {
        let backend = Arc::new(MockRenderBackend::new());
        let pool = WorkerPool::new(pool_config(1), backend);

        let pooled = pool.acquire().await.unwrap();
        let worker: &dyn RenderWorker = &*pooled;
        assert!(worker.is_alive().await);
        pool.release(pooled).await;
    }

    #[tokio::test]
    async fn test_eviction_respects_min_workers() {
        let backend = Arc::new(MockRenderBackend::new());
        let config = PoolConfig {
            min_workers: 1,
            idle_timeout_secs: 0,
            ..pool_config(3)
        };
        let pool = WorkerPool::new(config, backend.clone());

        let w1 = pool.acquire().await.unwrap();
        let w2 = pool.acquire().await.unwrap();
        let w3 = pool.acquire().await.unwrap();
        pool.release(w1).await;
        pool.release(w2).await;
        pool.release(w3).await;
        assert_eq!(pool.stats().size, 3);

        pool.evict_idle().await;
        let stats = pool.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.available, 1);
    }

    #[tokio::test]
    async fn test_drain_rejects_new_borrows() {
        let backend = Arc::new(MockRenderBackend::new());
        let pool = WorkerPool::new(pool_config(2), backend.clone());

        let w = pool.acquire().await.unwrap();
        pool.release(w).await;
        pool.drain().await;

        assert_eq!(pool.stats().size, 0);
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, PoolError::Draining));
    }

    #[tokio::test]
    async fn test_borrowed_worker_destroyed_on_release_while_draining() {
        let backend = Arc::new(MockRenderBackend::new());
        let pool = WorkerPool::new(pool_config(2), backend.clone());

        let w = pool.acquire().await.unwrap();
        pool.drain().await;
        pool.release(w).await;
        assert_eq!(pool.stats().size, 0);
        assert_eq!(pool.stats().available, 0);
    }

    #[tokio::test]
    async fn test_warm_launches_min_workers() {
        let backend = Arc::new(MockRenderBackend::new());
        let config = PoolConfig {
            min_workers: 2,
            ..pool_config(3)
        };
        let pool = WorkerPool::new(config, backend.clone());

        pool.warm().await.unwrap();
        let stats = pool.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.available, 2);
        assert_eq!(backend.launch_count(), 2);
    }
}
