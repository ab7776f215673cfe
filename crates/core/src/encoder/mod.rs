//! Encoders turning captured frame sequences into shareable artifacts.
//!
//! Two formats are produced:
//!
//! - Animated GIF via the `gif` crate, with thresholded transparency
//! - Alpha-preserving VP9 WebM via an ffmpeg subprocess
//!
//! Both report their output as an [`OutputArtifact`], which records
//! whether the file fits under the platform size limit.

mod config;
mod error;
mod gif;
mod types;
mod webm;

pub use self::gif::GifEncoder;
pub use config::EncoderConfig;
pub use error::EncodeError;
pub use types::{EncodeProgress, OutputArtifact, PLATFORM_LIMIT_BYTES};
pub use webm::{WebmEncoder, WebmSpec};
