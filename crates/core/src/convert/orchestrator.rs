//! Per-job conversion orchestration.
//!
//! One job holds exactly one admission ticket and one pooled worker,
//! reused across all requested variants. The first failing variant
//! aborts the rest; the ticket and the worker are returned on every
//! exit path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use super::error::ConvertError;
use super::types::{
    ConversionProgress, ConversionRequest, ConversionResult, EmojiSpec, GifSpec, JobStage,
    StickerSpec, Variant, VariantOutputs, EMOJI_MAX_DURATION_SECS, STICKER_MAX_DURATION_SECS,
};
use crate::capture::{frame_count, CaptureEngine, CaptureSpec};
use crate::convert::types::sticker_dimensions;
use crate::encoder::{EncodeProgress, EncoderConfig, GifEncoder, OutputArtifact, WebmEncoder, WebmSpec};
use crate::metrics;
use crate::queue::AdmissionQueue;
use crate::renderer::{Frame, PooledWorker, WorkerPool};

/// Drives a conversion job from admission to encoded artifacts.
pub struct Orchestrator {
    queue: Arc<AdmissionQueue>,
    pool: Arc<WorkerPool>,
    engine: CaptureEngine,
    gif_encoder: GifEncoder,
    webm_encoder: WebmEncoder,
    output_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(
        queue: Arc<AdmissionQueue>,
        pool: Arc<WorkerPool>,
        encoder_config: EncoderConfig,
    ) -> Self {
        Self {
            queue,
            pool,
            engine: CaptureEngine::new(),
            gif_encoder: GifEncoder::new(),
            output_dir: encoder_config.output_dir.clone(),
            webm_encoder: WebmEncoder::new(encoder_config),
        }
    }

    /// Run one conversion job. Progress events are sent best-effort on
    /// `progress` as the job moves through its stages.
    pub async fn convert(
        &self,
        request: ConversionRequest,
        progress: Option<mpsc::Sender<ConversionProgress>>,
    ) -> Result<ConversionResult, ConvertError> {
        if request.variants.is_empty() {
            return Err(ConvertError::EmptyRequest);
        }

        let start = Instant::now();
        self.emit(&progress, &request.job_id, JobStage::Queued, 0, 0);

        let ticket = match self.queue.acquire().await {
            Ok(ticket) => ticket,
            Err(e) => {
                metrics::JOBS_TOTAL.with_label_values(&["rejected"]).inc();
                self.emit(&progress, &request.job_id, JobStage::Failed, 0, 0);
                return Err(e.into());
            }
        };
        self.emit(&progress, &request.job_id, JobStage::Admitted, 0, 0);

        let result = self.run_admitted(&request, &progress).await;
        ticket.release();

        match result {
            Ok(outputs) => {
                metrics::JOBS_TOTAL.with_label_values(&["completed"]).inc();
                self.emit(&progress, &request.job_id, JobStage::Completed, 0, 0);
                tracing::info!(job_id = %request.job_id, elapsed_ms = start.elapsed().as_millis() as u64, "conversion completed");
                Ok(ConversionResult {
                    job_id: request.job_id,
                    outputs,
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            Err(e) => {
                metrics::JOBS_TOTAL.with_label_values(&["failed"]).inc();
                self.emit(&progress, &request.job_id, JobStage::Failed, 0, 0);
                tracing::warn!(job_id = %request.job_id, error = %e, "conversion failed");
                Err(e)
            }
        }
    }

    async fn run_admitted(
        &self,
        request: &ConversionRequest,
        progress: &Option<mpsc::Sender<ConversionProgress>>,
    ) -> Result<VariantOutputs, ConvertError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let worker = self.pool.acquire().await?;
        let result = self.run_variants(&worker, request, progress).await;
        self.pool.release(worker).await;
        result
    }

    async fn run_variants(
        &self,
        worker: &PooledWorker,
        request: &ConversionRequest,
        progress: &Option<mpsc::Sender<ConversionProgress>>,
    ) -> Result<VariantOutputs, ConvertError> {
        let mut outputs = VariantOutputs::default();
        if let Some(spec) = &request.variants.gif {
            outputs.gif = Some(self.convert_gif(worker, request, spec, progress).await?);
        }
        if let Some(spec) = &request.variants.emoji {
            outputs.emoji = Some(self.convert_emoji(worker, request, spec, progress).await?);
        }
        if let Some(spec) = &request.variants.sticker {
            outputs.sticker = Some(self.convert_sticker(worker, request, spec, progress).await?);
        }
        Ok(outputs)
    }

    async fn convert_gif(
        &self,
        worker: &PooledWorker,
        request: &ConversionRequest,
        spec: &GifSpec,
        progress: &Option<mpsc::Sender<ConversionProgress>>,
    ) -> Result<OutputArtifact, ConvertError> {
        let capture = CaptureSpec {
            width: spec.width,
            height: spec.height,
            fps: spec.fps,
            duration_secs: spec.duration_secs,
        };
        let frames = self
            .capture_variant(worker, request, Variant::Gif, &capture, progress)
            .await?;

        self.emit(
            progress,
            &request.job_id,
            JobStage::Encoding {
                variant: Variant::Gif,
            },
            0,
            frames.len() as u32,
        );
        let path = self.output_dir.join(format!("{}.gif", request.job_id));
        let encode_tx = forward_encode_progress(&request.job_id, Variant::Gif, progress);
        Ok(self
            .gif_encoder
            .encode(frames, spec.fps, &path, encode_tx)
            .await?)
    }

    async fn convert_emoji(
        &self,
        worker: &PooledWorker,
        request: &ConversionRequest,
        spec: &EmojiSpec,
        progress: &Option<mpsc::Sender<ConversionProgress>>,
    ) -> Result<OutputArtifact, ConvertError> {
        let capture = emoji_capture_spec(spec);
        let frames = self
            .capture_variant(worker, request, Variant::Emoji, &capture, progress)
            .await?;

        self.emit(
            progress,
            &request.job_id,
            JobStage::Encoding {
                variant: Variant::Emoji,
            },
            0,
            frames.len() as u32,
        );
        let webm = WebmSpec {
            width: spec.size,
            height: spec.size,
            fps: spec.fps,
            max_duration_secs: capture.duration_secs,
        };
        let path = self
            .output_dir
            .join(format!("{}-emoji.webm", request.job_id));
        let encode_tx = forward_encode_progress(&request.job_id, Variant::Emoji, progress);
        Ok(self
            .webm_encoder
            .encode(frames, &webm, &path, encode_tx)
            .await?)
    }

    async fn convert_sticker(
        &self,
        worker: &PooledWorker,
        request: &ConversionRequest,
        spec: &StickerSpec,
        progress: &Option<mpsc::Sender<ConversionProgress>>,
    ) -> Result<OutputArtifact, ConvertError> {
        let capture = sticker_capture_spec(spec);
        let frames = self
            .capture_variant(worker, request, Variant::Sticker, &capture, progress)
            .await?;

        self.emit(
            progress,
            &request.job_id,
            JobStage::Encoding {
                variant: Variant::Sticker,
            },
            0,
            frames.len() as u32,
        );
        let webm = WebmSpec {
            width: capture.width,
            height: capture.height,
            fps: spec.fps,
            max_duration_secs: capture.duration_secs,
        };
        let path = self
            .output_dir
            .join(format!("{}-sticker.webm", request.job_id));
        let encode_tx = forward_encode_progress(&request.job_id, Variant::Sticker, progress);
        Ok(self
            .webm_encoder
            .encode(frames, &webm, &path, encode_tx)
            .await?)
    }

    async fn capture_variant(
        &self,
        worker: &PooledWorker,
        request: &ConversionRequest,
        variant: Variant,
        capture: &CaptureSpec,
        progress: &Option<mpsc::Sender<ConversionProgress>>,
    ) -> Result<Vec<Frame>, ConvertError> {
        let total = frame_count(capture.fps, capture.duration_secs);
        self.emit(
            progress,
            &request.job_id,
            JobStage::Capturing { variant },
            0,
            total,
        );
        let start = Instant::now();
        let frames = self
            .engine
            .capture(worker.worker(), &request.svg, capture)
            .await?;
        metrics::CAPTURE_DURATION
            .with_label_values(&[variant.as_str()])
            .observe(start.elapsed().as_secs_f64());
        Ok(frames)
    }

    fn emit(
        &self,
        progress: &Option<mpsc::Sender<ConversionProgress>>,
        job_id: &str,
        stage: JobStage,
        current: u32,
        total: u32,
    ) {
        if let Some(tx) = progress {
            let _ = tx.try_send(ConversionProgress {
                job_id: job_id.to_string(),
                stage,
                current,
                total,
            });
        }
    }
}

/// Emojis are captured at twice the target size so the encoder's
/// lanczos downscale cleans up thin strokes.
fn emoji_capture_spec(spec: &EmojiSpec) -> CaptureSpec {
    CaptureSpec {
        width: spec.size * 2,
        height: spec.size * 2,
        fps: spec.fps,
        duration_secs: spec.duration_secs.min(EMOJI_MAX_DURATION_SECS),
    }
}

fn sticker_capture_spec(spec: &StickerSpec) -> CaptureSpec {
    let (width, height) = sticker_dimensions(spec.source_width, spec.source_height);
    CaptureSpec {
        width,
        height,
        fps: spec.fps,
        duration_secs: spec.duration_secs.min(STICKER_MAX_DURATION_SECS),
    }
}

/// Bridge encoder progress events onto the job's progress stream.
fn forward_encode_progress(
    job_id: &str,
    variant: Variant,
    progress: &Option<mpsc::Sender<ConversionProgress>>,
) -> Option<mpsc::Sender<EncodeProgress>> {
    let tx = progress.as_ref()?.clone();
    let job_id = job_id.to_string();
    let (encode_tx, mut encode_rx) = mpsc::channel::<EncodeProgress>(32);
    tokio::spawn(async move {
        while let Some(event) = encode_rx.recv().await {
            let _ = tx.try_send(ConversionProgress {
                job_id: job_id.clone(),
                stage: JobStage::Encoding { variant },
                current: event.frame,
                total: event.total_frames,
            });
        }
    });
    Some(encode_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{AdmissionError, QueueConfig};
    use crate::renderer::PoolConfig;
    use crate::testing::{fixtures, MockRenderBackend};
    use std::sync::Arc;

    fn gif_request(job_id: &str) -> ConversionRequest {
        ConversionRequest {
            job_id: job_id.to_string(),
            svg: fixtures::animated_svg(),
            variants: crate::convert::VariantSet {
                gif: Some(GifSpec {
                    width: 16,
                    height: 16,
                    fps: 10,
                    duration_secs: 0.5,
                }),
                ..Default::default()
            },
        }
    }

    struct Harness {
        backend: Arc<MockRenderBackend>,
        queue: Arc<AdmissionQueue>,
        pool: Arc<WorkerPool>,
        orchestrator: Orchestrator,
        _output_dir: tempfile::TempDir,
    }

    fn harness(queue_config: QueueConfig) -> Harness {
        let backend = Arc::new(MockRenderBackend::new());
        let queue = AdmissionQueue::new(queue_config);
        let pool = WorkerPool::new(PoolConfig::default(), backend.clone());
        let output_dir = tempfile::tempdir().unwrap();
        let encoder_config =
            EncoderConfig::default().with_output_dir(output_dir.path().to_path_buf());
        let orchestrator = Orchestrator::new(Arc::clone(&queue), Arc::clone(&pool), encoder_config);
        Harness {
            backend,
            queue,
            pool,
            orchestrator,
            _output_dir: output_dir,
        }
    }

    #[tokio::test]
    async fn test_gif_conversion_lifecycle() {
        let h = harness(QueueConfig::default());
        let (tx, mut rx) = mpsc::channel(64);

        let result = h
            .orchestrator
            .convert(gif_request("job-1"), Some(tx))
            .await
            .unwrap();

        let gif = result.outputs.gif.unwrap();
        assert!(gif.path.exists());
        assert_eq!(gif.width, 16);
        assert!(gif.size_bytes > 0);
        assert!(result.outputs.emoji.is_none());

        // All resources returned.
        assert_eq!(h.queue.stats().active_jobs, 0);
        assert_eq!(h.pool.stats().available, 1);
        assert_eq!(h.backend.open_sessions(), 0);

        let mut stages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.job_id, "job-1");
            stages.push(event.stage);
        }
        assert_eq!(stages.first(), Some(&JobStage::Queued));
        assert!(stages.contains(&JobStage::Admitted));
        assert!(stages.contains(&JobStage::Capturing {
            variant: Variant::Gif
        }));
        assert!(stages.contains(&JobStage::Encoding {
            variant: Variant::Gif
        }));
        assert_eq!(stages.last(), Some(&JobStage::Completed));
    }

    #[tokio::test]
    async fn test_capture_failure_releases_resources() {
        let h = harness(QueueConfig::default());
        h.backend.set_fail_capture(true);

        let err = h
            .orchestrator
            .convert(gif_request("job-2"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Capture(_)));

        assert_eq!(h.queue.stats().active_jobs, 0);
        assert_eq!(h.pool.stats().available, 1);
        assert_eq!(h.backend.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_invalid_document_is_invalid_input() {
        let h = harness(QueueConfig::default());
        let mut request = gif_request("job-3");
        request.svg = "not a document".to_string();

        let err = h.orchestrator.convert(request, None).await.unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(h.queue.stats().active_jobs, 0);
    }

    #[tokio::test]
    async fn test_empty_request_rejected_before_admission() {
        let h = harness(QueueConfig::default());
        let request = ConversionRequest {
            job_id: "job-4".to_string(),
            svg: fixtures::animated_svg(),
            variants: Default::default(),
        };

        let err = h.orchestrator.convert(request, None).await.unwrap_err();
        assert!(matches!(err, ConvertError::EmptyRequest));
        assert_eq!(h.queue.stats().active_jobs, 0);
    }

    #[tokio::test]
    async fn test_admission_rejection_is_distinguishable() {
        let h = harness(QueueConfig {
            max_concurrent: 1,
            max_queue_size: 0,
            job_timeout_secs: 5,
        });
        let _held = h.queue.acquire().await.unwrap();

        let err = h
            .orchestrator
            .convert(gif_request("job-5"), None)
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert!(matches!(
            err,
            ConvertError::Admission(AdmissionError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn test_emoji_capture_doubles_size_and_caps_duration() {
        let capture = emoji_capture_spec(&EmojiSpec {
            size: 64,
            fps: 30,
            duration_secs: 5.0,
        });
        assert_eq!((capture.width, capture.height), (128, 128));
        assert_eq!(capture.duration_secs, 3.0);
    }

    #[test]
    fn test_sticker_capture_uses_platform_dimensions() {
        let capture = sticker_capture_spec(&StickerSpec {
            source_width: 386,
            source_height: 310,
            fps: 30,
            duration_secs: 10.0,
        });
        assert_eq!((capture.width, capture.height), (512, 411));
        assert_eq!(capture.duration_secs, 3.0);
    }
}
