//! Core library for the svgmoji conversion service.
//!
//! Turns animated SVG documents into chat-ready artifacts: animated
//! GIFs and alpha-preserving WebM stickers and emojis. The pieces:
//!
//! - [`queue`]: admission control with bounded concurrency and FIFO
//!   waiting
//! - [`renderer`]: headless renderer workers and the pool that
//!   recycles them
//! - [`capture`]: frame-accurate timeline capture
//! - [`encoder`]: GIF and WebM encoders
//! - [`convert`]: the orchestrator tying it all together
//! - [`config`], [`metrics`], [`testing`]: supporting infrastructure

pub mod capture;
pub mod config;
pub mod convert;
pub mod encoder;
pub mod metrics;
pub mod queue;
pub mod renderer;
pub mod testing;

pub use capture::{CaptureEngine, CaptureError, CaptureSpec};
pub use config::{
    load_config, load_config_from_str, validate_config, CleanupConfig, Config, ConfigError,
    LimitsConfig, SanitizedConfig, ServerConfig,
};
pub use convert::{
    sticker_dimensions, ConversionProgress, ConversionRequest, ConversionResult, ConvertError,
    EmojiSpec, GifSpec, JobStage, Orchestrator, StickerSpec, Variant, VariantOutputs, VariantSet,
};
pub use encoder::{
    EncodeError, EncodeProgress, EncoderConfig, GifEncoder, OutputArtifact, WebmEncoder, WebmSpec,
    PLATFORM_LIMIT_BYTES,
};
pub use queue::{AdmissionError, AdmissionQueue, AdmissionTicket, QueueConfig, QueueStats};
pub use renderer::{
    AnimationInfo, AnimationKind, Frame, HeadlessRenderer, PoolConfig, PoolError, PoolStats,
    PooledWorker, RenderBackend, RenderError, RenderWorker, SeekTarget, SessionId, WorkerPool,
};
