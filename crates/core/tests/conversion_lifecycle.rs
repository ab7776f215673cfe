//! Conversion lifecycle integration tests.
//!
//! These tests drive the orchestrator with a mock renderer backend:
//! - Full job lifecycle down to a decodable artifact
//! - Admission limits under concurrent load
//! - Resource release on worker failure
//! - Queue shutdown behavior

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;

use svgmoji_core::{
    convert::{
        ConversionRequest, ConvertError, EmojiSpec, GifSpec, JobStage, Orchestrator, StickerSpec,
        VariantSet,
    },
    encoder::EncoderConfig,
    queue::{AdmissionError, AdmissionQueue, QueueConfig},
    renderer::{PoolConfig, WorkerPool},
    testing::{fixtures, MockRenderBackend},
};

/// Test helper wiring the orchestrator to mocks.
struct TestHarness {
    orchestrator: Arc<Orchestrator>,
    backend: Arc<MockRenderBackend>,
    queue: Arc<AdmissionQueue>,
    pool: Arc<WorkerPool>,
    output_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_queue_config(QueueConfig::default())
    }

    fn with_queue_config(queue_config: QueueConfig) -> Self {
        let output_dir = TempDir::new().expect("Failed to create output dir");
        let backend = Arc::new(MockRenderBackend::new());
        let queue = AdmissionQueue::new(queue_config);
        let pool = WorkerPool::new(PoolConfig::default(), backend.clone());
        let encoder_config =
            EncoderConfig::default().with_output_dir(output_dir.path().to_path_buf());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&queue),
            Arc::clone(&pool),
            encoder_config,
        ));
        Self {
            orchestrator,
            backend,
            queue,
            pool,
            output_dir,
        }
    }

    fn gif_request(&self, job_id: &str) -> ConversionRequest {
        ConversionRequest {
            job_id: job_id.to_string(),
            svg: fixtures::animated_svg(),
            variants: VariantSet {
                gif: Some(GifSpec {
                    width: 32,
                    height: 32,
                    fps: 10,
                    duration_secs: 1.0,
                }),
                ..Default::default()
            },
        }
    }
}

#[tokio::test]
async fn test_full_lifecycle_produces_decodable_gif() {
    let h = TestHarness::new();
    h.backend
        .set_animations(vec![fixtures::style_animation("pulse", 500.0, None)]);

    let (tx, mut rx) = mpsc::channel(128);
    let result = h
        .orchestrator
        .convert(h.gif_request("lifecycle-1"), Some(tx))
        .await
        .expect("conversion should succeed");

    let artifact = result.outputs.gif.expect("gif artifact");
    assert!(artifact.path.starts_with(h.output_dir.path()));

    // The artifact must be a real GIF with the full frame count.
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options
        .read_info(std::fs::File::open(&artifact.path).unwrap())
        .unwrap();
    let mut frames = 0;
    while decoder.read_next_frame().unwrap().is_some() {
        frames += 1;
    }
    assert_eq!(frames, 10);

    // Progress runs from Queued to Completed.
    let mut stages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        stages.push(event.stage);
    }
    assert_eq!(stages.first(), Some(&JobStage::Queued));
    assert_eq!(stages.last(), Some(&JobStage::Completed));
}

#[tokio::test]
async fn test_concurrent_jobs_respect_admission_limit() {
    let h = TestHarness::with_queue_config(QueueConfig {
        max_concurrent: 2,
        max_queue_size: 10,
        job_timeout_secs: 30,
    });

    let mut handles = Vec::new();
    for i in 0..6 {
        let orchestrator = Arc::clone(&h.orchestrator);
        let request = h.gif_request(&format!("concurrent-{i}"));
        handles.push(tokio::spawn(async move {
            orchestrator.convert(request, None).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().expect("conversion should succeed");
    }

    // Everything drained back to zero.
    let stats = h.queue.stats();
    assert_eq!(stats.active_jobs, 0);
    assert_eq!(stats.queue_length, 0);
    assert_eq!(h.backend.open_sessions(), 0);

    // The pool never grew past what admission allows.
    assert!(h.pool.stats().size <= 2);
}

#[tokio::test]
async fn test_worker_failure_releases_ticket_and_worker() {
    let h = TestHarness::new();
    h.backend.set_fail_capture(true);

    let err = h
        .orchestrator
        .convert(h.gif_request("failing-1"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::Capture(_)));

    // A subsequent job reuses the recovered capacity.
    h.backend.set_fail_capture(false);
    h.orchestrator
        .convert(h.gif_request("failing-2"), None)
        .await
        .expect("conversion after failure should succeed");

    assert_eq!(h.queue.stats().active_jobs, 0);
    assert_eq!(h.pool.stats().borrowed, 0);
}

// Runs the real WebM encoder; needs ffmpeg on the PATH.
#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_all_three_variants_end_to_end() {
    let h = TestHarness::new();
    h.backend
        .set_animations(vec![fixtures::style_animation("pulse", 500.0, None)]);

    let request = ConversionRequest {
        job_id: "three-variants-1".to_string(),
        svg: fixtures::animated_svg(),
        variants: VariantSet {
            gif: Some(GifSpec {
                width: 64,
                height: 64,
                fps: 10,
                duration_secs: 1.0,
            }),
            emoji: Some(EmojiSpec {
                size: 100,
                fps: 10,
                duration_secs: 1.0,
            }),
            sticker: Some(StickerSpec {
                source_width: 386,
                source_height: 310,
                fps: 10,
                duration_secs: 1.0,
            }),
        },
    };

    let result = h
        .orchestrator
        .convert(request, None)
        .await
        .expect("three-variant conversion should succeed");

    let gif = result.outputs.gif.expect("gif artifact");
    assert_eq!((gif.width, gif.height), (64, 64));
    assert!(gif.size_bytes > 0);

    let emoji = result.outputs.emoji.expect("emoji artifact");
    assert_eq!((emoji.width, emoji.height), (100, 100));
    assert!(emoji.size_bytes > 0);

    let sticker = result.outputs.sticker.expect("sticker artifact");
    assert_eq!((sticker.width, sticker.height), (512, 411));
    assert!(sticker.size_bytes > 0);

    for artifact in [&gif, &emoji, &sticker] {
        assert!(artifact.path.starts_with(h.output_dir.path()));
        assert!(artifact.path.exists());
    }

    // Admission fully drained.
    assert_eq!(h.queue.stats().active_jobs, 0);
    assert_eq!(h.pool.stats().borrowed, 0);
}

#[tokio::test]
async fn test_shutdown_rejects_new_jobs() {
    let h = TestHarness::new();
    h.queue.shutdown();

    let err = h
        .orchestrator
        .convert(h.gif_request("late-1"), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConvertError::Admission(AdmissionError::ShuttingDown)
    ));
}
