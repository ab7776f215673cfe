//! Renderer workers and their pool.
//!
//! This module provides the `RenderWorker`/`RenderBackend` traits, the
//! subprocess-backed `HeadlessRenderer` implementation, and the
//! `WorkerPool` that recycles workers across conversion jobs.
//!
//! # Example
//!
//! ```ignore
//! use svgmoji_core::renderer::{HeadlessRenderer, PoolConfig, WorkerPool};
//!
//! let config = PoolConfig::default();
//! let backend = Arc::new(HeadlessRenderer::new(config.clone()));
//! let pool = WorkerPool::new(config, backend);
//!
//! let worker = pool.acquire().await?;
//! let session = worker.open_document(svg, 512, 512).await?;
//! let frame = worker.capture(&session).await?;
//! pool.release(worker).await;
//! ```

mod config;
mod error;
mod pool;
mod process;
mod protocol;
mod traits;
mod types;

pub use config::PoolConfig;
pub use error::RenderError;
pub use pool::{PoolError, PoolStats, PooledWorker, WorkerPool};
pub use process::HeadlessRenderer;
pub use traits::{RenderBackend, RenderWorker};
pub use types::{AnimationInfo, AnimationKind, Frame, SeekTarget, SessionId};
