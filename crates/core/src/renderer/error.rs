//! Error types for the renderer module.

use std::path::PathBuf;
use thiserror::Error;

use super::types::SessionId;

/// Errors from a renderer worker or its backend.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Renderer executable not found or failed to start.
    #[error("Failed to launch renderer at {path}: {reason}")]
    LaunchFailed { path: PathBuf, reason: String },

    /// The worker process exited or its pipes closed.
    #[error("Renderer worker is gone: {reason}")]
    WorkerGone { reason: String },

    /// The worker did not answer within the response timeout.
    #[error("Renderer did not respond within {timeout_secs} seconds")]
    ResponseTimeout { timeout_secs: u64 },

    /// The worker sent something the protocol does not allow.
    #[error("Renderer protocol error: {reason}")]
    Protocol { reason: String },

    /// The document could not be rendered (no SVG root, parse failure).
    #[error("Invalid input document: {reason}")]
    InvalidInput { reason: String },

    /// The session handle is unknown to the worker.
    #[error("Render session not found: {0}")]
    SessionNotFound(SessionId),

    /// The worker reported an internal failure.
    #[error("Renderer failed: {reason}")]
    RenderFailed { reason: String },

    /// I/O error talking to the worker process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    pub fn worker_gone(reason: impl Into<String>) -> Self {
        Self::WorkerGone {
            reason: reason.into(),
        }
    }

    /// Whether the worker should be destroyed rather than recycled.
    pub fn is_fatal_to_worker(&self) -> bool {
        matches!(
            self,
            Self::WorkerGone { .. } | Self::ResponseTimeout { .. } | Self::Io(_)
        )
    }
}
