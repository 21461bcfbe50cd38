//! The viewer frame loop as a tokio task.
//!
//! A [`ViewerHandle`] owns the channel into a task that owns the
//! [`SceneRenderer`]. Commands are applied in arrival order between frames,
//! and the interval tick is the only caller of [`SceneRenderer::tick`], so
//! no locking is needed. Dropping the handle closes the channel, which stops
//! the loop and disposes the renderer.

use super::{InputEvent, SceneRenderer, SceneSummary, Spherical};
use crate::error::Img2GlbError;
use glam::Vec3;
use image::RgbaImage;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Point-in-time copy of the renderer state.
#[derive(Debug, Clone)]
pub struct ViewerState {
    pub target: Spherical,
    pub current: Spherical,
    pub orbit_target: Vec3,
    pub frames: u64,
    pub material_count: usize,
    pub frame: Option<RgbaImage>,
}

enum Command {
    Input(InputEvent),
    Load(Vec<u8>, oneshot::Sender<Result<SceneSummary, Img2GlbError>>),
    State(oneshot::Sender<ViewerState>),
    Dispose(oneshot::Sender<()>),
}

#[derive(Debug)]
pub struct ViewerHandle {
    tx: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl ViewerHandle {
    /// Start the frame loop. Must be called inside a tokio runtime.
    pub fn spawn(renderer: SceneRenderer, frame_interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(renderer, rx, frame_interval));
        Self { tx, task: Some(task) }
    }

    /// Queue an input event. Returns false once the loop has stopped.
    pub fn send_input(&self, event: InputEvent) -> bool {
        self.tx.send(Command::Input(event)).is_ok()
    }

    /// Load an asset into the running viewer.
    pub async fn load(&self, bytes: Vec<u8>) -> Result<SceneSummary, Img2GlbError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Load(bytes, reply))
            .map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())?
    }

    /// Current renderer state, or `None` once the loop has stopped.
    pub async fn state(&self) -> Option<ViewerState> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command::State(reply)).ok()?;
        rx.await.ok()
    }

    /// Stop the loop and release everything. Safe to call more than once.
    pub async fn dispose(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Dispose(reply)).is_ok() {
            let _ = rx.await;
        }
        if let Err(e) = task.await {
            warn!("Viewer loop ended abnormally: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

fn stopped() -> Img2GlbError {
    Img2GlbError::AssetLoad("viewer loop has stopped".into())
}

async fn run(
    mut renderer: SceneRenderer,
    mut rx: mpsc::UnboundedReceiver<Command>,
    frame_interval: Duration,
) {
    let mut ticker = tokio::time::interval(frame_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = Instant::now();
    debug!("Viewer loop started ({:?} per frame)", frame_interval);

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Input(event)) => renderer.handle_input(event),
                Some(Command::Load(bytes, reply)) => {
                    let _ = reply.send(renderer.load_asset(&bytes));
                }
                Some(Command::State(reply)) => {
                    let _ = reply.send(ViewerState {
                        target: renderer.target(),
                        current: renderer.current(),
                        orbit_target: renderer.orbit_target(),
                        frames: renderer.frames_rendered(),
                        material_count: renderer.material_count(),
                        frame: renderer.snapshot(),
                    });
                }
                Some(Command::Dispose(reply)) => {
                    renderer.dispose();
                    let _ = reply.send(());
                    break;
                }
                None => {
                    renderer.dispose();
                    break;
                }
            },
            _ = ticker.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last).as_secs_f32();
                last = now;
                renderer.tick(dt);
            }
        }
    }
    debug!("Viewer loop stopped after {} frames", renderer.frames_rendered());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use crate::viewer::SoftwareSurface;

    fn handle() -> ViewerHandle {
        let renderer = SceneRenderer::new(ViewerConfig::default(), Box::new(SoftwareSurface::new(32, 32)));
        ViewerHandle::spawn(renderer, Duration::from_millis(16))
    }

    #[tokio::test(start_paused = true)]
    async fn frames_advance_toward_input_target() {
        let h = handle();
        assert!(h.send_input(InputEvent::Wheel { delta_y: 80.0 }));
        tokio::time::sleep(Duration::from_millis(16 * 120)).await;

        let state = h.state().await.unwrap();
        assert!(state.frames > 60, "only {} frames", state.frames);
        assert!(state.target.radius > 140.0);
        assert!((state.current.radius - state.target.radius).abs() < 1.0);
        assert!(state.frame.is_some());
    }

    #[tokio::test]
    async fn bad_asset_is_reported_and_loop_keeps_running() {
        let h = handle();
        let err = h.load(b"nope".to_vec()).await.unwrap_err();
        assert!(matches!(err, Img2GlbError::AssetLoad(_)));
        assert!(h.is_running());
        assert!(h.state().await.is_some());
    }

    #[tokio::test]
    async fn dispose_twice_is_harmless() {
        let mut h = handle();
        h.dispose().await;
        h.dispose().await;
        assert!(!h.is_running());
        assert!(!h.send_input(InputEvent::Wheel { delta_y: 1.0 }));
        assert!(h.state().await.is_none());
        assert!(h.load(Vec::new()).await.is_err());
    }
}
