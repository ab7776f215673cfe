//! Conversion request and progress types.

use serde::{Deserialize, Serialize};

use crate::encoder::OutputArtifact;

/// Platform edge length for stickers: the long side is always 512.
pub const STICKER_EDGE: u32 = 512;

/// Emoji variants are cut off at three seconds.
pub const EMOJI_MAX_DURATION_SECS: f64 = 3.0;

/// Sticker variants are cut off at three seconds.
pub const STICKER_MAX_DURATION_SECS: f64 = 3.0;

/// Animated GIF output parameters.
///
/// Valid ranges (enforced by the HTTP layer): width and height
/// 16-2048, fps 1-60, duration 0.5-10 seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GifSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_secs: f64,
}

/// Square emoji WebM output parameters. `size` is valid in 16-512.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmojiSpec {
    pub size: u32,
    pub fps: u32,
    pub duration_secs: f64,
}

/// Sticker WebM output parameters. The output size is derived from the
/// source aspect ratio by [`sticker_dimensions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickerSpec {
    pub source_width: u32,
    pub source_height: u32,
    pub fps: u32,
    pub duration_secs: f64,
}

/// Which outputs one conversion should produce.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantSet {
    pub gif: Option<GifSpec>,
    pub emoji: Option<EmojiSpec>,
    pub sticker: Option<StickerSpec>,
}

impl VariantSet {
    pub fn is_empty(&self) -> bool {
        self.gif.is_none() && self.emoji.is_none() && self.sticker.is_none()
    }
}

/// One conversion job.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub job_id: String,
    pub svg: String,
    pub variants: VariantSet,
}

/// The output variant a progress event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Gif,
    Emoji,
    Sticker,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Gif => "gif",
            Variant::Emoji => "emoji",
            Variant::Sticker => "sticker",
        }
    }
}

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum JobStage {
    Queued,
    Admitted,
    Capturing { variant: Variant },
    Encoding { variant: Variant },
    Completed,
    Failed,
}

/// Typed progress event for one job.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionProgress {
    pub job_id: String,
    #[serde(flatten)]
    pub stage: JobStage,
    pub current: u32,
    pub total: u32,
}

/// Artifacts produced for the requested variants.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VariantOutputs {
    pub gif: Option<OutputArtifact>,
    pub emoji: Option<OutputArtifact>,
    pub sticker: Option<OutputArtifact>,
}

/// Outcome of a completed conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub job_id: String,
    pub outputs: VariantOutputs,
    pub duration_ms: u64,
}

/// Output dimensions for a sticker: the long side is pinned to 512 and
/// the short side preserves the source aspect ratio. Degenerate source
/// sizes fall back to a square.
pub fn sticker_dimensions(source_width: u32, source_height: u32) -> (u32, u32) {
    if source_width == 0 || source_height == 0 {
        return (STICKER_EDGE, STICKER_EDGE);
    }
    let aspect = source_width as f64 / source_height as f64;
    if aspect >= 1.0 {
        (STICKER_EDGE, (STICKER_EDGE as f64 / aspect).round() as u32)
    } else {
        ((STICKER_EDGE as f64 * aspect).round() as u32, STICKER_EDGE)
    }
}
