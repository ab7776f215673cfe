//! Common test utilities for exercising the HTTP API in-process.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use svgmoji_core::{
    testing::MockRenderBackend, AdmissionQueue, Config, Orchestrator, WorkerPool,
};
use svgmoji_server::api::create_router;
use svgmoji_server::state::AppState;

pub use svgmoji_core::testing::fixtures;

const BOUNDARY: &str = "svgmoji-test-boundary";

/// In-process server backed by a mock renderer.
pub struct TestFixture {
    pub router: Router,
    pub backend: Arc<MockRenderBackend>,
    pub output_dir: PathBuf,
    #[allow(dead_code)]
    temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_dir = temp_dir.path().join("output");

        let mut config = Config::default();
        config.queue.max_concurrent = 2;
        config.queue.max_queue_size = 4;
        config.encoder.output_dir = output_dir.clone();
        config.encoder.temp_dir = temp_dir.path().join("tmp");

        let backend = Arc::new(MockRenderBackend::new());
        let pool = WorkerPool::new(config.pool.clone(), backend.clone());
        let queue = AdmissionQueue::new(config.queue.clone());
        let orchestrator = Orchestrator::new(
            Arc::clone(&queue),
            Arc::clone(&pool),
            config.encoder.clone(),
        );

        let state = Arc::new(AppState::new(config, queue, pool, orchestrator));
        let router = create_router(state);

        Self {
            router,
            backend,
            output_dir,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Fetch a path, returning the raw status and headers without
    /// decoding the body as JSON.
    pub async fn get_raw(&self, path: &str) -> (StatusCode, Vec<u8>, Option<String>) {
        let request = Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec(), content_type)
    }

    /// POST a multipart form with an optional SVG part named `svg` and
    /// plain text fields.
    pub async fn post_convert(
        &self,
        svg: Option<&str>,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let body = multipart_body(svg, fields);
        let request = Request::builder()
            .method("POST")
            .uri("/api/convert")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };
        TestResponse { status, body }
    }
}

fn multipart_body(svg: Option<&str>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = String::new();
    if let Some(svg) = svg {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"svg\"; filename=\"input.svg\"\r\nContent-Type: image/svg+xml\r\n\r\n{svg}\r\n"
        ));
    }
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body.into_bytes()
}
