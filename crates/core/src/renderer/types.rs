//! Data types shared by the renderer traits and implementations.

use serde::{Deserialize, Serialize};

/// Handle for one open document inside a renderer worker.
///
/// Assigned by the worker when a document is opened and valid until
/// the session is closed or the worker is reset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One rasterized frame, straight-alpha RGBA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Pixel data, row-major, 4 bytes per pixel.
    pub rgba: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        debug_assert_eq!(rgba.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            rgba,
        }
    }

    /// Frame filled with a single RGBA color.
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            rgba.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            rgba,
        }
    }
}

/// How an animation is driven, which decides how it is seeked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    /// SMIL timeline animation, seeked through the document clock.
    Declarative,
    /// CSS/Web-Animations animation, seeked through its own local time.
    StyleDriven,
}

/// One animation found in an open document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationInfo {
    pub id: String,
    pub kind: AnimationKind,
    /// Total scheduled run time in milliseconds. `None` when the
    /// animation repeats forever.
    pub active_duration_ms: Option<f64>,
    /// Length of a single iteration in milliseconds.
    pub iteration_duration_ms: f64,
}

/// A single seek instruction within one capture step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum SeekTarget {
    /// Move the document timeline, driving all declarative animations.
    Document { seconds: f64 },
    /// Set the local time of one style-driven animation.
    Animation { id: String, time_ms: f64 },
}
