//! End-to-end API tests against the in-process router with a mock
//! renderer backend. GIF conversions run the real encoder; WebM
//! variants are disabled here since they shell out to ffmpeg.

mod common;

use axum::http::StatusCode;
use common::{fixtures, TestFixture};

const GIF_ONLY: &[(&str, &str)] = &[
    ("gifWidth", "32"),
    ("gifHeight", "32"),
    ("fps", "10"),
    ("duration", "0.5"),
    ("generateWebm", "false"),
    ("generateSticker", "false"),
];

#[tokio::test]
async fn health_reports_status_and_stats() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert!(response.body["version"].is_string());
    assert_eq!(response.body["queue"]["active_jobs"], 0);
    assert_eq!(response.body["queue"]["max_concurrent"], 2);
    assert_eq!(response.body["pool"]["size"], 0);
}

#[tokio::test]
async fn queue_status_reports_counters() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/queue-status").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["queue"]["queue_length"], 0);
    assert_eq!(response.body["pool"]["available"], 0);
}

#[tokio::test]
async fn config_is_sanitized() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/config").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["pool"]["renderer_configured"].is_boolean());
    // Filesystem paths must not leak
    let text = response.body.to_string();
    assert!(!text.contains("renderer_path"));
    assert!(!text.contains("output_dir"));
}

#[tokio::test]
async fn metrics_endpoint_returns_prometheus_text() {
    let fixture = TestFixture::new().await;

    let (status, body, _) = fixture.get_raw("/api/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("svgmoji_http_requests"));
}

#[tokio::test]
async fn convert_produces_downloadable_gif() {
    let fixture = TestFixture::new().await;
    let svg = fixtures::animated_svg();

    let response = fixture.post_convert(Some(&svg), GIF_ONLY).await;
    assert_eq!(response.status, StatusCode::OK, "body: {}", response.body);

    let gif = &response.body["gif"];
    assert!(gif["filename"].as_str().unwrap().ends_with(".gif"));
    assert!(gif["size_bytes"].as_u64().unwrap() > 0);
    assert_eq!(gif["width"], 32);
    assert_eq!(gif["height"], 32);
    assert!(response.body.get("emoji").is_none());
    assert!(response.body.get("sticker").is_none());

    // The artifact is on disk and served by the download endpoint
    let url = gif["url"].as_str().unwrap();
    let (status, bytes, content_type) = fixture.get_raw(url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/gif"));
    assert_eq!(&bytes[..3], b"GIF");
}

#[tokio::test]
async fn convert_without_file_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture.post_convert(None, GIF_ONLY).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("No SVG file"));
}

#[tokio::test]
async fn convert_rejects_non_svg_upload() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_convert(Some("this is not markup"), GIF_ONLY)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn convert_with_all_variants_disabled_is_rejected() {
    let fixture = TestFixture::new().await;
    let svg = fixtures::animated_svg();

    let response = fixture
        .post_convert(
            Some(&svg),
            &[
                ("generateGif", "false"),
                ("generateWebm", "false"),
                ("generateSticker", "false"),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn convert_reuses_pooled_worker_across_jobs() {
    let fixture = TestFixture::new().await;
    let svg = fixtures::animated_svg();

    for _ in 0..3 {
        let response = fixture.post_convert(Some(&svg), GIF_ONLY).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    assert_eq!(fixture.backend.launch_count(), 1);
    assert_eq!(fixture.backend.open_sessions(), 0);
}

#[tokio::test]
async fn download_rejects_path_traversal() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/download/..evil.gif").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn download_missing_file_is_404() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/download/nope.gif").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn artifacts_land_in_output_dir() {
    let fixture = TestFixture::new().await;
    let svg = fixtures::animated_svg();

    let response = fixture.post_convert(Some(&svg), GIF_ONLY).await;
    assert_eq!(response.status, StatusCode::OK);

    let filename = response.body["gif"]["filename"].as_str().unwrap().to_string();
    assert!(fixture.output_dir.join(filename).exists());
}
