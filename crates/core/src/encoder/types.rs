//! Shared encoder output types.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::error::EncodeError;

/// Sticker/emoji platforms cap animated assets at 256 KiB.
pub const PLATFORM_LIMIT_BYTES: u64 = 262_144;

/// One encoded output file.
#[derive(Debug, Clone, Serialize)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Whether the artifact fits under [`PLATFORM_LIMIT_BYTES`].
    pub meets_platform_limit: bool,
    pub width: u32,
    pub height: u32,
}

impl OutputArtifact {
    /// Stat an encoded file and record whether it fits the platform
    /// limit.
    pub async fn inspect(path: &Path, width: u32, height: u32) -> Result<Self, EncodeError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|_| EncodeError::encoding_failed("Output file not created", None))?;
        let size_bytes = meta.len();
        Ok(Self {
            path: path.to_path_buf(),
            size_bytes,
            meets_platform_limit: size_bytes <= PLATFORM_LIMIT_BYTES,
            width,
            height,
        })
    }
}

/// Progress event emitted while encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodeProgress {
    /// Frames written so far.
    pub frame: u32,
    pub total_frames: u32,
}

/// Checks that a frame sequence is non-empty and uniformly sized,
/// returning the shared dimensions.
pub(crate) fn frame_dimensions(
    frames: &[crate::renderer::Frame],
) -> Result<(u32, u32), EncodeError> {
    let first = frames
        .first()
        .ok_or_else(|| EncodeError::invalid_frames("no frames to encode"))?;
    let (width, height) = (first.width, first.height);
    for (i, frame) in frames.iter().enumerate() {
        if frame.width != width || frame.height != height {
            return Err(EncodeError::invalid_frames(format!(
                "frame {i} is {}x{}, expected {width}x{height}",
                frame.width, frame.height
            )));
        }
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inspect_flags_platform_limit() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.gif");
        tokio::fs::write(&small, vec![0u8; 1024]).await.unwrap();
        let artifact = OutputArtifact::inspect(&small, 64, 64).await.unwrap();
        assert_eq!(artifact.size_bytes, 1024);
        assert!(artifact.meets_platform_limit);

        let big = dir.path().join("big.gif");
        tokio::fs::write(&big, vec![0u8; (PLATFORM_LIMIT_BYTES + 1) as usize])
            .await
            .unwrap();
        let artifact = OutputArtifact::inspect(&big, 64, 64).await.unwrap();
        assert!(!artifact.meets_platform_limit);
    }

    #[tokio::test]
    async fn test_inspect_exact_limit_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exact.webm");
        tokio::fs::write(&path, vec![0u8; PLATFORM_LIMIT_BYTES as usize])
            .await
            .unwrap();
        let artifact = OutputArtifact::inspect(&path, 512, 512).await.unwrap();
        assert!(artifact.meets_platform_limit);
    }

    #[tokio::test]
    async fn test_inspect_missing_file_fails() {
        let err = OutputArtifact::inspect(Path::new("/nonexistent/out.gif"), 64, 64)
            .await
            .unwrap_err();
        assert!(matches!(err, EncodeError::EncodingFailed { .. }));
    }
}
