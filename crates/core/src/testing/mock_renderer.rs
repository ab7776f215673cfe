//! Mock renderer backend and worker for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::renderer::{
    AnimationInfo, Frame, RenderBackend, RenderError, RenderWorker, SeekTarget, SessionId,
};

#[derive(Default)]
struct Shared {
    animations: Mutex<Vec<AnimationInfo>>,
    fill: Mutex<[u8; 4]>,
    fail_next_launches: AtomicUsize,
    fail_reset: AtomicBool,
    fail_capture: AtomicBool,
    reject_documents: AtomicBool,
    launch_count: AtomicUsize,
    reset_count: AtomicUsize,
    seek_log: Mutex<Vec<Vec<SeekTarget>>>,
    workers: Mutex<Vec<Arc<WorkerState>>>,
}

struct WorkerState {
    alive: AtomicBool,
    sessions: Mutex<HashMap<String, MockSession>>,
}

struct MockSession {
    width: u32,
    height: u32,
}

/// Mock implementation of the renderer traits.
///
/// Provides controllable behavior for testing:
/// - Configure the animation set open documents report
/// - Inject launch, reset and capture failures
/// - Kill workers to exercise validation paths
/// - Record every seek for assertions
///
/// # Example
///
/// ```rust,ignore
/// use svgmoji_core::testing::MockRenderBackend;
///
/// let backend = Arc::new(MockRenderBackend::new());
/// backend.set_animations(vec![/* ... */]);
/// backend.fail_next_launches(2);
///
/// let pool = WorkerPool::new(config, backend.clone());
/// // ...
/// assert_eq!(backend.launch_count(), 3);
/// ```
#[derive(Default)]
pub struct MockRenderBackend {
    shared: Arc<Shared>,
}

impl MockRenderBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        *backend.shared.fill.lock().unwrap() = [255, 0, 0, 255];
        backend
    }

    /// Animations every opened document will report.
    pub fn set_animations(&self, animations: Vec<AnimationInfo>) {
        *self.shared.animations.lock().unwrap() = animations;
    }

    /// RGBA color captured frames are filled with.
    pub fn set_fill(&self, color: [u8; 4]) {
        *self.shared.fill.lock().unwrap() = color;
    }

    /// Make the next `n` launches fail.
    pub fn fail_next_launches(&self, n: usize) {
        self.shared.fail_next_launches.store(n, Ordering::SeqCst);
    }

    /// Make every `reset` fail.
    pub fn set_fail_reset(&self, fail: bool) {
        self.shared.fail_reset.store(fail, Ordering::SeqCst);
    }

    /// Make every `capture` fail.
    pub fn set_fail_capture(&self, fail: bool) {
        self.shared.fail_capture.store(fail, Ordering::SeqCst);
    }

    /// Make `open_document` reject everything as invalid input.
    pub fn set_reject_documents(&self, reject: bool) {
        self.shared.reject_documents.store(reject, Ordering::SeqCst);
    }

    /// Mark every launched worker dead.
    pub fn kill_all(&self) {
        for state in self.shared.workers.lock().unwrap().iter() {
            state.alive.store(false, Ordering::SeqCst);
        }
    }

    /// Launch attempts observed, failed ones included.
    pub fn launch_count(&self) -> usize {
        self.shared.launch_count.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) -> usize {
        self.shared.reset_count.load(Ordering::SeqCst)
    }

    /// Sessions currently open across all workers.
    pub fn open_sessions(&self) -> usize {
        self.shared
            .workers
            .lock()
            .unwrap()
            .iter()
            .map(|w| w.sessions.lock().unwrap().len())
            .sum()
    }

    /// Every `seek` call in order, across all workers.
    pub fn seek_log(&self) -> Vec<Vec<SeekTarget>> {
        self.shared.seek_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderBackend for MockRenderBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn launch(&self) -> Result<Box<dyn RenderWorker>, RenderError> {
        let n = self.shared.launch_count.fetch_add(1, Ordering::SeqCst);

        let remaining = self.shared.fail_next_launches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.shared
                .fail_next_launches
                .store(remaining - 1, Ordering::SeqCst);
            return Err(RenderError::LaunchFailed {
                path: PathBuf::from("mock-renderer"),
                reason: "injected launch failure".to_string(),
            });
        }

        let state = Arc::new(WorkerState {
            alive: AtomicBool::new(true),
            sessions: Mutex::new(HashMap::new()),
        });
        self.shared.workers.lock().unwrap().push(Arc::clone(&state));
        Ok(Box::new(MockRenderWorker {
            id: format!("mock-worker-{n}"),
            shared: Arc::clone(&self.shared),
            state,
            next_session: AtomicU64::new(0),
        }))
    }
}

/// Worker produced by [`MockRenderBackend`].
pub struct MockRenderWorker {
    id: String,
    shared: Arc<Shared>,
    state: Arc<WorkerState>,
    next_session: AtomicU64,
}

impl MockRenderWorker {
    fn session(&self, session: &SessionId) -> Result<(u32, u32), RenderError> {
        let sessions = self.state.sessions.lock().unwrap();
        let entry = sessions
            .get(&session.0)
            .ok_or_else(|| RenderError::SessionNotFound(session.clone()))?;
        Ok((entry.width, entry.height))
    }
}

#[async_trait]
impl RenderWorker for MockRenderWorker {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::SeqCst)
    }

    async fn open_document(
        &self,
        svg: &str,
        width: u32,
        height: u32,
    ) -> Result<SessionId, RenderError> {
        if self.shared.reject_documents.load(Ordering::SeqCst) || !svg.contains("<svg") {
            return Err(RenderError::InvalidInput {
                reason: "document has no SVG root".to_string(),
            });
        }
        let n = self.next_session.fetch_add(1, Ordering::SeqCst);
        let id = format!("{}-session-{n}", self.id);
        self.state
            .sessions
            .lock()
            .unwrap()
            .insert(id.clone(), MockSession { width, height });
        Ok(SessionId(id))
    }

    async fn animations(&self, session: &SessionId) -> Result<Vec<AnimationInfo>, RenderError> {
        self.session(session)?;
        Ok(self.shared.animations.lock().unwrap().clone())
    }

    async fn seek(&self, session: &SessionId, targets: &[SeekTarget]) -> Result<(), RenderError> {
        self.session(session)?;
        self.shared.seek_log.lock().unwrap().push(targets.to_vec());
        Ok(())
    }

    async fn capture(&self, session: &SessionId) -> Result<Frame, RenderError> {
        let (width, height) = self.session(session)?;
        if self.shared.fail_capture.load(Ordering::SeqCst) {
            return Err(RenderError::RenderFailed {
                reason: "injected capture failure".to_string(),
            });
        }
        let fill = *self.shared.fill.lock().unwrap();
        Ok(Frame::solid(width, height, fill))
    }

    async fn close_session(&self, session: &SessionId) -> Result<(), RenderError> {
        self.state
            .sessions
            .lock()
            .unwrap()
            .remove(&session.0)
            .ok_or_else(|| RenderError::SessionNotFound(session.clone()))?;
        Ok(())
    }

    async fn reset(&self) -> Result<(), RenderError> {
        self.shared.reset_count.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_reset.load(Ordering::SeqCst) {
            return Err(RenderError::RenderFailed {
                reason: "injected reset failure".to_string(),
            });
        }
        self.state.sessions.lock().unwrap().clear();
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        self.state.alive.store(false, Ordering::SeqCst);
        self.state.sessions.lock().unwrap().clear();
        Ok(())
    }
}
