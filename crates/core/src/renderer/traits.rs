//! Trait definitions for the renderer module.

use async_trait::async_trait;

use super::error::RenderError;
use super::types::{AnimationInfo, Frame, SeekTarget, SessionId};

/// A heavyweight rendering worker holding open document sessions.
///
/// Workers are expensive to create and are recycled through the
/// [`WorkerPool`](super::WorkerPool). All per-job state lives in
/// sessions; `reset` must return the worker to a clean state.
#[async_trait]
pub trait RenderWorker: Send + Sync {
    /// Stable identifier for logging.
    fn id(&self) -> &str;

    /// Whether the worker can still serve requests.
    async fn is_alive(&self) -> bool;

    /// Load an SVG document into a new session with a viewport of
    /// exactly `width` x `height`. Fails with
    /// [`RenderError::InvalidInput`] when the document has no SVG root.
    async fn open_document(
        &self,
        svg: &str,
        width: u32,
        height: u32,
    ) -> Result<SessionId, RenderError>;

    /// Enumerate the animations in an open document. All animations
    /// are paused before this returns.
    async fn animations(&self, session: &SessionId) -> Result<Vec<AnimationInfo>, RenderError>;

    /// Apply seek targets to the paused timeline.
    async fn seek(&self, session: &SessionId, targets: &[SeekTarget]) -> Result<(), RenderError>;

    /// Rasterize the current state of the session as straight-alpha
    /// RGBA at the session's exact viewport size.
    async fn capture(&self, session: &SessionId) -> Result<Frame, RenderError>;

    /// Close one session, freeing its document.
    async fn close_session(&self, session: &SessionId) -> Result<(), RenderError>;

    /// Discard all sessions and per-job state. Called between jobs.
    async fn reset(&self) -> Result<(), RenderError>;

    /// Terminate the worker. The worker is unusable afterwards.
    async fn shutdown(&self) -> Result<(), RenderError>;
}

impl std::fmt::Debug for dyn RenderWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderWorker").field("id", &self.id()).finish()
    }
}

/// Factory for renderer workers.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Returns the name of this backend implementation.
    fn name(&self) -> &str;

    /// Launch a fresh worker.
    async fn launch(&self) -> Result<Box<dyn RenderWorker>, RenderError>;
}
