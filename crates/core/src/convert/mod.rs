//! Conversion orchestration.
//!
//! This module ties admission control, the worker pool, the capture
//! engine and the encoders together into a single `convert` operation
//! with typed progress events.
//!
//! # Example
//!
//! ```ignore
//! use svgmoji_core::convert::{ConversionRequest, GifSpec, Orchestrator, VariantSet};
//!
//! let orchestrator = Orchestrator::new(queue, pool, encoder_config);
//! let request = ConversionRequest {
//!     job_id: "job-1".to_string(),
//!     svg,
//!     variants: VariantSet {
//!         gif: Some(GifSpec { width: 256, height: 256, fps: 30, duration_secs: 3.0 }),
//!         ..Default::default()
//!     },
//! };
//! let result = orchestrator.convert(request, None).await?;
//! ```

mod error;
mod orchestrator;
mod types;

pub use error::ConvertError;
pub use orchestrator::Orchestrator;
pub use types::{
    sticker_dimensions, ConversionProgress, ConversionRequest, ConversionResult, EmojiSpec,
    GifSpec, JobStage, StickerSpec, Variant, VariantOutputs, VariantSet,
    EMOJI_MAX_DURATION_SECS, STICKER_EDGE, STICKER_MAX_DURATION_SECS,
};
