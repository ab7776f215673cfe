//! Frame-accurate timeline capture.
//!
//! The capture engine steps a paused document through its animation
//! timeline at a fixed frame interval and rasterizes each position,
//! instead of sampling a live animation with wall-clock timers. The
//! resulting frame sequence is deterministic for a given document and
//! spec.

use thiserror::Error;

use crate::metrics;
use crate::renderer::{AnimationKind, Frame, RenderError, RenderWorker, SeekTarget};

/// What to capture: exact output size and timeline sampling rate.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_secs: f64,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The document cannot be rendered at all.
    #[error("Invalid input document: {reason}")]
    InvalidInput { reason: String },

    /// The capture spec is unusable.
    #[error("Invalid capture spec: {reason}")]
    InvalidSpec { reason: String },

    /// The renderer worker failed mid-capture.
    #[error("Capture failed: {0}")]
    Render(#[source] RenderError),
}

impl From<RenderError> for CaptureError {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::InvalidInput { reason } => CaptureError::InvalidInput { reason },
            other => CaptureError::Render(other),
        }
    }
}

/// Number of frames covering `duration_secs` at `fps`. A partial
/// trailing interval still gets a frame.
pub fn frame_count(fps: u32, duration_secs: f64) -> u32 {
    (fps as f64 * duration_secs).ceil() as u32
}

/// Milliseconds between captured frames.
pub fn frame_interval_ms(fps: u32) -> f64 {
    1000.0 / fps as f64
}

/// Local time for a style-driven animation at global timeline position
/// `t_ms`. Finite animations wrap over their active duration; animations
/// that repeat forever wrap over a single iteration.
pub fn style_local_time(t_ms: f64, active_duration_ms: Option<f64>, iteration_duration_ms: f64) -> f64 {
    match active_duration_ms {
        Some(active) if active.is_finite() && active > 0.0 => t_ms % active,
        _ if iteration_duration_ms.is_finite() && iteration_duration_ms > 0.0 => {
            t_ms % iteration_duration_ms
        }
        _ => 0.0,
    }
}

/// Steps a document through its timeline and rasterizes each position.
#[derive(Debug, Default)]
pub struct CaptureEngine;

impl CaptureEngine {
    pub fn new() -> Self {
        Self
    }

    /// Capture `frame_count` frames of `svg` at exactly
    /// `spec.width` x `spec.height`. The session is closed on every
    /// exit path.
    pub async fn capture(
        &self,
        worker: &dyn RenderWorker,
        svg: &str,
        spec: &CaptureSpec,
    ) -> Result<Vec<Frame>, CaptureError> {
        validate_spec(spec)?;

        let session = worker.open_document(svg, spec.width, spec.height).await?;
        let result = self.capture_frames(worker, &session, spec).await;
        if let Err(e) = worker.close_session(&session).await {
            tracing::warn!(worker_id = worker.id(), error = %e, "failed to close capture session");
        }
        result
    }

    async fn capture_frames(
        &self,
        worker: &dyn RenderWorker,
        session: &crate::renderer::SessionId,
        spec: &CaptureSpec,
    ) -> Result<Vec<Frame>, CaptureError> {
        let total = frame_count(spec.fps, spec.duration_secs);
        let interval = frame_interval_ms(spec.fps);
        let animations = worker.animations(session).await?;

        tracing::debug!(
            worker_id = worker.id(),
            frames = total,
            animations = animations.len(),
            "capturing timeline"
        );

        // A document without animations still produces a full-length
        // sequence of identical frames.
        if animations.is_empty() {
            let frame = worker.capture(session).await?;
            metrics::CAPTURE_FRAMES.observe(total as f64);
            return Ok(vec![frame; total as usize]);
        }

        let has_declarative = animations
            .iter()
            .any(|a| a.kind == AnimationKind::Declarative);

        let mut frames = Vec::with_capacity(total as usize);
        for i in 0..total {
            let t_ms = i as f64 * interval;

            let mut targets = Vec::with_capacity(animations.len() + 1);
            if has_declarative {
                // Declarative animations all ride the document clock.
                targets.push(SeekTarget::Document {
                    seconds: t_ms / 1000.0,
                });
            }
            for animation in &animations {
                if animation.kind == AnimationKind::StyleDriven {
                    targets.push(SeekTarget::Animation {
                        id: animation.id.clone(),
                        time_ms: style_local_time(
                            t_ms,
                            animation.active_duration_ms,
                            animation.iteration_duration_ms,
                        ),
                    });
                }
            }

            worker.seek(session, &targets).await?;
            frames.push(worker.capture(session).await?);
        }

        metrics::CAPTURE_FRAMES.observe(total as f64);
        Ok(frames)
    }
}

fn validate_spec(spec: &CaptureSpec) -> Result<(), CaptureError> {
    if spec.width == 0 || spec.height == 0 {
        return Err(CaptureError::InvalidSpec {
            reason: format!("dimensions {}x{} are empty", spec.width, spec.height),
        });
    }
    if spec.fps == 0 {
        return Err(CaptureError::InvalidSpec {
            reason: "fps must be at least 1".to_string(),
        });
    }
    if !spec.duration_secs.is_finite() || spec.duration_secs <= 0.0 {
        return Err(CaptureError::InvalidSpec {
            reason: format!("duration {} is not positive", spec.duration_secs),
        });
    }
    Ok(())
}
