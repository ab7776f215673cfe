//! Error types for the conversion orchestrator.

use thiserror::Error;

use crate::capture::CaptureError;
use crate::encoder::EncodeError;
use crate::queue::AdmissionError;
use crate::renderer::PoolError;

/// Everything a conversion can fail with. Admission rejections stay
/// distinguishable from processing failures so the HTTP layer can map
/// them to back-pressure responses.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The job never started.
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    /// No renderer worker could be obtained.
    #[error("No renderer worker available: {0}")]
    Pool(#[from] PoolError),

    /// Frame capture failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Encoding failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The request asked for no outputs.
    #[error("No output variants requested")]
    EmptyRequest,

    /// I/O error preparing the output location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Whether the request was turned away rather than attempted.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Admission(_))
    }

    /// Whether the caller sent something unconvertible.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::Capture(CaptureError::InvalidInput { .. } | CaptureError::InvalidSpec { .. })
                | Self::EmptyRequest
        )
    }
}
