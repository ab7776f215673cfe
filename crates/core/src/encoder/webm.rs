//! Alpha-preserving WebM encoding through ffmpeg.
//!
//! Captured frames are dumped as a PNG sequence in a per-job temp
//! directory and handed to ffmpeg, which scales them to the exact
//! target size and encodes VP9 with an alpha plane. The temp directory
//! is removed on every path.

use image::RgbaImage;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

use super::config::EncoderConfig;
use super::error::EncodeError;
use super::types::{frame_dimensions, EncodeProgress, OutputArtifact};
use crate::metrics;
use crate::renderer::Frame;

/// Target bitrate window keeping animated stickers near the platform
/// size limit.
const BITRATE: &str = "200k";
const MIN_BITRATE: &str = "50k";
const MAX_BITRATE: &str = "300k";

/// What to encode: exact output size, frame rate and a hard duration cap.
#[derive(Debug, Clone, PartialEq)]
pub struct WebmSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Output is truncated at this many seconds regardless of how many
    /// frames came in.
    pub max_duration_secs: f64,
}

/// VP9/WebM encoder driving an ffmpeg subprocess.
pub struct WebmEncoder {
    config: EncoderConfig,
}

impl WebmEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Encode `frames` into an alpha-preserving WebM.
    pub async fn encode(
        &self,
        frames: Vec<Frame>,
        spec: &WebmSpec,
        output_path: &Path,
        progress: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<OutputArtifact, EncodeError> {
        frame_dimensions(&frames)?;
        if spec.fps == 0 {
            return Err(EncodeError::invalid_frames("fps must be at least 1"));
        }

        let start = Instant::now();
        let total = frames.len() as u32;
        let frames_dir = self
            .config
            .temp_dir
            .join(format!("webm-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&frames_dir).await?;

        let result = self
            .run_encode(frames, spec, &frames_dir, output_path, progress, total)
            .await;

        if let Err(e) = tokio::fs::remove_dir_all(&frames_dir).await {
            tracing::warn!(dir = %frames_dir.display(), error = %e, "failed to remove frame dump dir");
        }

        result?;

        metrics::ENCODE_DURATION
            .with_label_values(&["webm"])
            .observe(start.elapsed().as_secs_f64());

        let artifact = OutputArtifact::inspect(output_path, spec.width, spec.height).await?;
        metrics::ARTIFACT_SIZE
            .with_label_values(&["webm"])
            .observe(artifact.size_bytes as f64);
        tracing::debug!(
            path = %artifact.path.display(),
            size_bytes = artifact.size_bytes,
            frames = total,
            "webm encoded"
        );
        Ok(artifact)
    }

    async fn run_encode(
        &self,
        frames: Vec<Frame>,
        spec: &WebmSpec,
        frames_dir: &Path,
        output_path: &Path,
        progress: Option<mpsc::Sender<EncodeProgress>>,
        total_frames: u32,
    ) -> Result<(), EncodeError> {
        write_frame_sequence(frames, frames_dir.to_path_buf()).await?;

        let args = self.build_args(spec, frames_dir, output_path);
        tracing::debug!(args = ?args, "running ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncodeError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    EncodeError::Io(e)
                }
            })?;

        let stderr = child.stderr.take().expect("stderr should be captured");
        let mut reader = BufReader::new(stderr).lines();

        let frame_regex = Regex::new(r"frame=\s*(\d+)").ok();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut error_output = String::new();

            while let Ok(Some(line)) = reader.next_line().await {
                if line.contains("Error") || line.contains("error") {
                    error_output.push_str(&line);
                    error_output.push('\n');
                }

                if let (Some(re), Some(tx)) = (&frame_regex, &progress) {
                    if let Some(caps) = re.captures(&line) {
                        if let Ok(frame) = caps[1].parse::<u32>() {
                            // Non-blocking send
                            let _ = tx.try_send(EncodeProgress {
                                frame: frame.min(total_frames),
                                total_frames,
                            });
                        }
                    }
                }
            }

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, error_output))
        })
        .await;

        match result {
            Ok(Ok((status, error_output))) => {
                if !status.success() {
                    return Err(EncodeError::encoding_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        if error_output.is_empty() {
                            None
                        } else {
                            Some(error_output)
                        },
                    ));
                }
                Ok(())
            }
            Ok(Err(e)) => Err(EncodeError::Io(e)),
            Err(_) => {
                // Kill the process on timeout
                let _ = child.kill().await;
                Err(EncodeError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                })
            }
        }
    }

    fn build_args(&self, spec: &WebmSpec, frames_dir: &Path, output_path: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-framerate".to_string(),
            spec.fps.to_string(),
            "-i".to_string(),
            frames_dir.join("frame-%05d.png").display().to_string(),
            "-vf".to_string(),
            format!(
                "scale={}:{}:flags=lanczos,format=yuva420p",
                spec.width, spec.height
            ),
            "-c:v".to_string(),
            "libvpx-vp9".to_string(),
            "-pix_fmt".to_string(),
            "yuva420p".to_string(),
            "-b:v".to_string(),
            BITRATE.to_string(),
            "-minrate".to_string(),
            MIN_BITRATE.to_string(),
            "-maxrate".to_string(),
            MAX_BITRATE.to_string(),
            "-an".to_string(),
            "-auto-alt-ref".to_string(),
            "0".to_string(),
            "-deadline".to_string(),
            "good".to_string(),
            "-cpu-used".to_string(),
            "2".to_string(),
            "-row-mt".to_string(),
            "1".to_string(),
            "-t".to_string(),
            format!("{}", spec.max_duration_secs),
            "-progress".to_string(),
            "pipe:2".to_string(),
            output_path.display().to_string(),
        ]
    }
}

/// Dump frames as `frame-%05d.png`, PNG being the interchange format
/// that keeps the alpha channel intact for ffmpeg.
async fn write_frame_sequence(frames: Vec<Frame>, dir: PathBuf) -> Result<(), EncodeError> {
    task::spawn_blocking(move || -> Result<(), EncodeError> {
        for (i, frame) in frames.into_iter().enumerate() {
            let image = RgbaImage::from_raw(frame.width, frame.height, frame.rgba)
                .ok_or_else(|| EncodeError::invalid_frames(format!("frame {i} has a short buffer")))?;
            let path = dir.join(format!("frame-{i:05}.png"));
            image
                .save(&path)
                .map_err(|e| EncodeError::encoding_failed(e.to_string(), None))?;
        }
        Ok(())
    })
    .await
    .map_err(|e| EncodeError::encoding_failed(format!("frame dump task failed: {e}"), None))?
}
