//! Animated GIF encoding.
//!
//! GIF has 1-bit transparency, so partially transparent pixels are
//! snapped at an alpha threshold: anything below becomes the fully
//! transparent key color, anything above becomes opaque. Frames use
//! background disposal so transparent regions do not smear across
//! frames.

use gif::{DisposalMethod, Repeat};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task;

use super::error::EncodeError;
use super::types::{frame_dimensions, EncodeProgress, OutputArtifact};
use crate::metrics;
use crate::renderer::Frame;

/// Pixels with alpha below this become fully transparent.
const ALPHA_THRESHOLD: u8 = 128;

/// NeuQuant sampling factor. 10 trades palette quality for speed.
const QUANTIZATION_SPEED: i32 = 10;

/// Streaming animated GIF encoder.
#[derive(Debug, Default)]
pub struct GifEncoder;

impl GifEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode `frames` into an infinitely looping GIF at `fps`.
    /// Progress events are sent best-effort; a full or dropped channel
    /// never stalls encoding.
    pub async fn encode(
        &self,
        frames: Vec<Frame>,
        fps: u32,
        output_path: &Path,
        progress: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<OutputArtifact, EncodeError> {
        let (width, height) = frame_dimensions(&frames)?;
        if fps == 0 {
            return Err(EncodeError::invalid_frames("fps must be at least 1"));
        }
        if width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(EncodeError::invalid_frames(format!(
                "dimensions {width}x{height} exceed the GIF limit"
            )));
        }

        let start = Instant::now();
        let path = output_path.to_path_buf();
        let total = frames.len() as u32;

        task::spawn_blocking(move || -> Result<(), EncodeError> {
            let file = File::create(&path)?;
            let mut writer =
                gif::Encoder::new(BufWriter::new(file), width as u16, height as u16, &[])
                    .map_err(|e| EncodeError::encoding_failed(e.to_string(), None))?;
            writer
                .set_repeat(Repeat::Infinite)
                .map_err(|e| EncodeError::encoding_failed(e.to_string(), None))?;

            let delay_ms = (1000.0 / fps as f64).round();
            let delay_cs = (delay_ms / 10.0).round() as u16;

            for (i, frame) in frames.into_iter().enumerate() {
                let mut rgba = frame.rgba;
                for px in rgba.chunks_exact_mut(4) {
                    if px[3] < ALPHA_THRESHOLD {
                        px.copy_from_slice(&[0, 0, 0, 0]);
                    } else {
                        px[3] = 255;
                    }
                }

                let mut out = gif::Frame::from_rgba_speed(
                    width as u16,
                    height as u16,
                    &mut rgba,
                    QUANTIZATION_SPEED,
                );
                out.delay = delay_cs;
                out.dispose = DisposalMethod::Background;
                writer
                    .write_frame(&out)
                    .map_err(|e| EncodeError::encoding_failed(e.to_string(), None))?;

                if let Some(ref tx) = progress {
                    let _ = tx.try_send(EncodeProgress {
                        frame: i as u32 + 1,
                        total_frames: total,
                    });
                }
            }
            Ok(())
        })
        .await
        .map_err(|e| EncodeError::encoding_failed(format!("encoder task failed: {e}"), None))??;

        metrics::ENCODE_DURATION
            .with_label_values(&["gif"])
            .observe(start.elapsed().as_secs_f64());

        let artifact = OutputArtifact::inspect(output_path, width, height).await?;
        metrics::ARTIFACT_SIZE
            .with_label_values(&["gif"])
            .observe(artifact.size_bytes as f64);
        tracing::debug!(
            path = %artifact.path.display(),
            size_bytes = artifact.size_bytes,
            frames = total,
            "gif encoded"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(path: &Path) -> (u16, u16, Vec<gif::Frame<'static>>) {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(File::open(path).unwrap()).unwrap();
        let (w, h) = (decoder.width(), decoder.height());
        let mut frames = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            frames.push(frame.clone());
        }
        (w, h, frames)
    }

    #[tokio::test]
    async fn test_encode_animated_gif() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.gif");
        let frames = vec![
            Frame::solid(8, 8, [255, 0, 0, 255]),
            Frame::solid(8, 8, [0, 255, 0, 255]),
            Frame::solid(8, 8, [0, 0, 255, 255]),
        ];

        let artifact = GifEncoder::new()
            .encode(frames, 30, &path, None)
            .await
            .unwrap();
        assert_eq!(artifact.width, 8);
        assert_eq!(artifact.height, 8);
        assert!(artifact.size_bytes > 0);

        let (w, h, decoded) = decode(&path);
        assert_eq!((w, h), (8, 8));
        assert_eq!(decoded.len(), 3);
        // round(1000/30) = 33 ms -> 3 centiseconds on the wire.
        assert_eq!(decoded[0].delay, 3);
        assert_eq!(decoded[0].dispose, DisposalMethod::Background);
    }

    #[tokio::test]
    async fn test_alpha_threshold_binarizes_transparency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alpha.gif");
        // Below the threshold: fully transparent. Above: fully opaque.
        let frames = vec![
            Frame::solid(4, 4, [200, 100, 50, 127]),
            Frame::solid(4, 4, [200, 100, 50, 128]),
        ];

        GifEncoder::new().encode(frames, 10, &path, None).await.unwrap();

        let (_, _, decoded) = decode(&path);
        assert_eq!(decoded[0].buffer[3], 0);
        assert_eq!(decoded[1].buffer[3], 255);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.gif");
        let frames = vec![Frame::solid(4, 4, [1, 2, 3, 255]); 5];
        let (tx, mut rx) = mpsc::channel(16);

        GifEncoder::new()
            .encode(frames, 10, &path, Some(tx))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].frame, 1);
        assert_eq!(events[4].frame, 5);
        assert!(events.iter().all(|e| e.total_frames == 5));
    }

    #[tokio::test]
    async fn test_empty_frames_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.gif");
        let err = GifEncoder::new()
            .encode(Vec::new(), 10, &path, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EncodeError::InvalidFrames { .. }));
    }

    #[tokio::test]
    async fn test_mismatched_frames_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mismatch.gif");
        let frames = vec![
            Frame::solid(8, 8, [0, 0, 0, 255]),
            Frame::solid(4, 4, [0, 0, 0, 255]),
        ];
        let err = GifEncoder::new()
            .encode(frames, 10, &path, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EncodeError::InvalidFrames { .. }));
    }
}
