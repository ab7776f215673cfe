//! Subprocess-backed renderer worker.
//!
//! [`HeadlessRenderer`] spawns the configured headless renderer
//! executable and talks the line-delimited JSON protocol over its
//! stdin/stdout. Each worker owns one process; requests within a
//! worker are strictly sequential.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Duration};
use uuid::Uuid;

use super::config::PoolConfig;
use super::error::RenderError;
use super::protocol::{error_from_response, Request, Response};
use super::traits::{RenderBackend, RenderWorker};
use super::types::{AnimationInfo, Frame, SeekTarget, SessionId};

/// Flags passed to every renderer process. Sandboxing and GPU paths
/// are useless inside a container and slow startup down.
const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-gpu",
    "--disable-crash-reporter",
    "--disable-dev-shm-usage",
];

const DEFAULT_RENDERER: &str = "svgmoji-renderer";

/// Backend that launches headless renderer subprocesses.
pub struct HeadlessRenderer {
    config: PoolConfig,
}

impl HeadlessRenderer {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    fn executable(&self) -> PathBuf {
        self.config
            .renderer_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RENDERER))
    }
}

#[async_trait]
impl RenderBackend for HeadlessRenderer {
    fn name(&self) -> &str {
        "headless"
    }

    async fn launch(&self) -> Result<Box<dyn RenderWorker>, RenderError> {
        let path = self.executable();
        let mut child = Command::new(&path)
            .args(LAUNCH_ARGS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RenderError::LaunchFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| RenderError::LaunchFailed {
            path: path.clone(),
            reason: "stdin not captured".to_string(),
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RenderError::LaunchFailed {
                path: path.clone(),
                reason: "stdout not captured".to_string(),
            })?;

        let worker = HeadlessWorker {
            id: Uuid::new_v4().to_string(),
            io: Mutex::new(WorkerIo {
                child,
                stdin,
                lines: BufReader::new(stdout).lines(),
            }),
            next_request_id: AtomicU64::new(1),
            alive: AtomicBool::new(true),
            config: self.config.clone(),
        };

        // Handshake: the worker must answer a ping before it counts
        // as launched.
        let id = worker.next_id();
        worker
            .send(Request::Ping { id })
            .await
            .map_err(|e| RenderError::LaunchFailed {
                path,
                reason: format!("handshake failed: {e}"),
            })?;

        tracing::debug!(worker_id = %worker.id, "renderer worker launched");
        Ok(Box::new(worker))
    }
}

struct WorkerIo {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

/// One live renderer process.
pub struct HeadlessWorker {
    id: String,
    io: Mutex<WorkerIo>,
    next_request_id: AtomicU64,
    alive: AtomicBool,
    config: PoolConfig,
}

impl HeadlessWorker {
    fn next_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn send(&self, req: Request<'_>) -> Result<Response, RenderError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(RenderError::worker_gone("worker marked dead"));
        }

        let request_id = req.id();
        let mut line =
            serde_json::to_string(&req).map_err(|e| RenderError::protocol(e.to_string()))?;
        line.push('\n');

        let mut io = self.io.lock().await;
        let result = timeout(self.config.response_timeout(), async {
            io.stdin.write_all(line.as_bytes()).await?;
            io.stdin.flush().await?;
            loop {
                match io.lines.next_line().await? {
                    Some(text) if text.trim().is_empty() => continue,
                    Some(text) => {
                        let resp: Response = serde_json::from_str(&text).map_err(|e| {
                            RenderError::protocol(format!("bad response line: {e}"))
                        })?;
                        // Skip stale answers to requests that timed out.
                        if resp.id() != request_id {
                            continue;
                        }
                        return Ok(resp);
                    }
                    None => return Err(RenderError::worker_gone("stdout closed")),
                }
            }
        })
        .await;

        match result {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(e)) => {
                if e.is_fatal_to_worker() {
                    self.alive.store(false, Ordering::SeqCst);
                }
                Err(e)
            }
            Err(_) => {
                self.alive.store(false, Ordering::SeqCst);
                Err(RenderError::ResponseTimeout {
                    timeout_secs: self.config.response_timeout_secs,
                })
            }
        }
    }

    /// Unwraps an ok response, converting worker errors.
    fn ok_fields(
        resp: Response,
    ) -> Result<
        (
            Option<SessionId>,
            Option<Vec<AnimationInfo>>,
            Option<super::protocol::FramePayload>,
        ),
        RenderError,
    > {
        match resp {
            Response::Ok {
                session,
                animations,
                frame,
                ..
            } => Ok((session, animations, frame)),
            Response::Error { code, message, .. } => Err(error_from_response(&code, &message)),
        }
    }
}

#[async_trait]
impl RenderWorker for HeadlessWorker {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_alive(&self) -> bool {
        if !self.alive.load(Ordering::SeqCst) {
            return false;
        }
        let mut io = self.io.lock().await;
        match io.child.try_wait() {
            Ok(None) => true,
            _ => {
                self.alive.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    async fn open_document(
        &self,
        svg: &str,
        width: u32,
        height: u32,
    ) -> Result<SessionId, RenderError> {
        let id = self.next_id();
        let resp = self
            .send(Request::OpenDocument {
                id,
                svg,
                width,
                height,
            })
            .await?;
        let (session, _, _) = Self::ok_fields(resp)?;
        let session =
            session.ok_or_else(|| RenderError::protocol("open_document returned no session"))?;
        // Let layout and font loading settle before the first capture.
        sleep(Duration::from_millis(self.config.load_settle_ms)).await;
        Ok(session)
    }

    async fn animations(&self, session: &SessionId) -> Result<Vec<AnimationInfo>, RenderError> {
        let id = self.next_id();
        let resp = self.send(Request::ListAnimations { id, session }).await?;
        let (_, animations, _) = Self::ok_fields(resp)?;
        animations.ok_or_else(|| RenderError::protocol("list_animations returned no animations"))
    }

    async fn seek(&self, session: &SessionId, targets: &[SeekTarget]) -> Result<(), RenderError> {
        let id = self.next_id();
        let resp = self
            .send(Request::Seek {
                id,
                session,
                targets,
            })
            .await?;
        Self::ok_fields(resp)?;
        Ok(())
    }

    async fn capture(&self, session: &SessionId) -> Result<Frame, RenderError> {
        // Give the engine a beat to apply the seeked styles.
        sleep(Duration::from_millis(self.config.frame_settle_ms)).await;
        let id = self.next_id();
        let resp = self.send(Request::Capture { id, session }).await?;
        let (_, _, frame) = Self::ok_fields(resp)?;
        let payload = frame.ok_or_else(|| RenderError::protocol("capture returned no frame"))?;
        let rgba = BASE64
            .decode(&payload.rgba)
            .map_err(|e| RenderError::protocol(format!("bad frame encoding: {e}")))?;
        let expected = (payload.width as usize) * (payload.height as usize) * 4;
        if rgba.len() != expected {
            return Err(RenderError::protocol(format!(
                "frame is {} bytes, expected {expected}",
                rgba.len()
            )));
        }
        Ok(Frame {
            width: payload.width,
            height: payload.height,
            rgba,
        })
    }

    async fn close_session(&self, session: &SessionId) -> Result<(), RenderError> {
        let id = self.next_id();
        let resp = self.send(Request::CloseSession { id, session }).await?;
        Self::ok_fields(resp)?;
        Ok(())
    }

    async fn reset(&self) -> Result<(), RenderError> {
        let id = self.next_id();
        let resp = self.send(Request::Reset { id }).await?;
        Self::ok_fields(resp)?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        // Ask nicely first, then make sure the process is gone.
        let id = self.next_id();
        let _ = self.send(Request::Shutdown { id }).await;
        self.alive.store(false, Ordering::SeqCst);

        let mut io = self.io.lock().await;
        let _ = io.child.start_kill();
        let _ = io.child.wait().await;
        tracing::debug!(worker_id = %self.id, "renderer worker shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_launch_missing_executable_fails() {
        let backend = HeadlessRenderer::new(PoolConfig {
            renderer_path: Some(PathBuf::from("/nonexistent/renderer")),
            ..Default::default()
        });
        let err = backend.launch().await.unwrap_err();
        assert!(matches!(err, RenderError::LaunchFailed { .. }));
    }

    #[tokio::test]
    async fn test_launch_non_protocol_executable_fails_handshake() {
        // `true` exits immediately without answering the ping.
        let backend = HeadlessRenderer::new(PoolConfig {
            renderer_path: Some(PathBuf::from("/bin/true")),
            response_timeout_secs: 2,
            ..Default::default()
        });
        let err = backend.launch().await.unwrap_err();
        match err {
            RenderError::LaunchFailed { reason, .. } => {
                assert!(reason.contains("handshake"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
