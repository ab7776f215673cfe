//! Admission control for conversion jobs.
//!
//! Every conversion must hold an [`AdmissionTicket`] before it may
//! borrow a renderer worker. At most `max_concurrent` tickets exist at
//! once; up to `max_queue_size` callers wait in FIFO order, each with
//! a deadline. Anything beyond that is rejected immediately so the
//! caller can signal back-pressure instead of piling up work.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::metrics;

/// Admission queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Jobs allowed to run concurrently.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Jobs allowed to wait for a slot before new arrivals are rejected.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// How long a queued job waits for a slot before giving up.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_queue_size: default_max_queue_size(),
            job_timeout_secs: default_job_timeout_secs(),
        }
    }
}

impl QueueConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

fn default_max_concurrent() -> usize {
    3
}

fn default_max_queue_size() -> usize {
    20
}

fn default_job_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Server is busy: {active} jobs running, {queued} queued")]
    CapacityExceeded { active: usize, queued: usize },

    #[error("Timed out after {0:?} waiting for an admission slot")]
    QueueTimeout(Duration),

    #[error("Server is shutting down")]
    ShuttingDown,
}

/// Point-in-time queue counters, exposed by the status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub active_jobs: usize,
    pub queue_length: usize,
    pub max_concurrent: usize,
    pub max_queue_size: usize,
}

struct Waiter {
    id: u64,
    grant_tx: oneshot::Sender<()>,
}

struct Inner {
    active: usize,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
    closed: bool,
}

/// FIFO admission queue with bounded concurrency and bounded waiting.
pub struct AdmissionQueue {
    inner: Mutex<Inner>,
    config: QueueConfig,
}

impl AdmissionQueue {
    pub fn new(config: QueueConfig) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                active: 0,
                waiters: VecDeque::new(),
                next_waiter_id: 0,
                closed: false,
            }),
            config,
        })
    }

    /// Acquire an admission slot, waiting in FIFO order if all slots
    /// are busy. The returned ticket frees the slot when dropped.
    pub async fn acquire(self: &Arc<Self>) -> Result<AdmissionTicket, AdmissionError> {
        let (waiter_id, grant_rx) = {
            let mut inner = self.inner.lock().unwrap();

            if inner.closed {
                metrics::ADMISSION_REJECTIONS
                    .with_label_values(&["shutdown"])
                    .inc();
                return Err(AdmissionError::ShuttingDown);
            }

            if inner.active < self.config.max_concurrent {
                inner.active += 1;
                metrics::QUEUE_ACTIVE_JOBS.set(inner.active as i64);
                return Ok(AdmissionTicket {
                    queue: Arc::clone(self),
                });
            }

            if inner.waiters.len() >= self.config.max_queue_size {
                metrics::ADMISSION_REJECTIONS
                    .with_label_values(&["capacity"])
                    .inc();
                return Err(AdmissionError::CapacityExceeded {
                    active: inner.active,
                    queued: inner.waiters.len(),
                });
            }

            let id = inner.next_waiter_id;
            inner.next_waiter_id += 1;
            let (grant_tx, grant_rx) = oneshot::channel();
            inner.waiters.push_back(Waiter { id, grant_tx });
            metrics::QUEUE_DEPTH.set(inner.waiters.len() as i64);
            (id, grant_rx)
        };

        let waited = Instant::now();
        match tokio::time::timeout(self.config.job_timeout(), grant_rx).await {
            Ok(Ok(())) => {
                metrics::QUEUE_WAIT_DURATION.observe(waited.elapsed().as_secs_f64());
                Ok(AdmissionTicket {
                    queue: Arc::clone(self),
                })
            }
            // Sender dropped without granting, which only happens on shutdown.
            Ok(Err(_)) => {
                metrics::ADMISSION_REJECTIONS
                    .with_label_values(&["shutdown"])
                    .inc();
                Err(AdmissionError::ShuttingDown)
            }
            Err(_) => {
                // The timer fired with our receiver unresolved, so no grant
                // reached us; if the grant sweep already popped this waiter
                // its send failed against the dropped receiver and the sweep
                // moved on without counting us. Either way there is nothing
                // to give back, only the queue entry to clear.
                {
                    let mut inner = self.inner.lock().unwrap();
                    inner.waiters.retain(|w| w.id != waiter_id);
                    metrics::QUEUE_DEPTH.set(inner.waiters.len() as i64);
                }
                metrics::ADMISSION_REJECTIONS
                    .with_label_values(&["timeout"])
                    .inc();
                Err(AdmissionError::QueueTimeout(self.config.job_timeout()))
            }
        }
    }

    /// Reject all queued waiters and refuse further admissions.
    /// Jobs already holding a ticket run to completion.
    pub fn shutdown(&self) {
        let waiters = {
            let mut inner = self.inner.lock().unwrap();
            inner.closed = true;
            metrics::QUEUE_DEPTH.set(0);
            std::mem::take(&mut inner.waiters)
        };
        if !waiters.is_empty() {
            tracing::info!(rejected = waiters.len(), "admission queue shut down");
        }
        // Dropping the senders wakes each waiter with ShuttingDown.
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().unwrap();
        QueueStats {
            active_jobs: inner.active,
            queue_length: inner.waiters.len(),
            max_concurrent: self.config.max_concurrent,
            max_queue_size: self.config.max_queue_size,
        }
    }

    fn release_slot(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.active = inner.active.saturating_sub(1);

        // Hand the freed slot to the oldest waiter still listening.
        while inner.active < self.config.max_concurrent {
            let Some(waiter) = inner.waiters.pop_front() else {
                break;
            };
            if waiter.grant_tx.send(()).is_ok() {
                inner.active += 1;
                break;
            }
            // Receiver already timed out and removed itself; try the next.
        }

        metrics::QUEUE_ACTIVE_JOBS.set(inner.active as i64);
        metrics::QUEUE_DEPTH.set(inner.waiters.len() as i64);
    }
}

/// Proof of admission. Held for the lifetime of one conversion job;
/// dropping it frees the slot and wakes the next waiter.
pub struct AdmissionTicket {
    queue: Arc<AdmissionQueue>,
}

impl AdmissionTicket {
    /// Explicitly return the slot. Dropping the ticket has the same effect.
    pub fn release(self) {}
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        self.queue.release_slot();
    }
}

impl std::fmt::Debug for AdmissionTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionTicket").finish()
    }
}
