//! Async driver around the try-on state machine
//!
//! The driver owns the machine inside a single task. Commands from the UI
//! and completions from collaborators are turned into [`SessionInput`]s, and
//! the resulting effects are carried out here: loads, camera requests, the
//! tracker and sharing all run as separate tasks that report back through a
//! completion channel.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tryon_capture::{ShareError, ShareMethod, ShareOutcome, ShareTarget};
use tryon_core::Axis;
use uuid::Uuid;

use crate::collaborators::{
    AssetError, AssetLoader, CameraLease, CameraSlot, CapabilityError, CapabilityProbe, FaceDetector, FrameSource,
    MediaDevices, MediaError, OverlaySurface, VideoConstraints,
};
use crate::machine::{CameraStatus, Effect, LoadTicket, SessionEvent, SessionInput, TryOnSession};
use crate::mode::SessionMode;
use crate::tracker::{FaceTracker, TrackerEvent, DEFAULT_DETECTION_INTERVAL};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session is closed")]
    Closed,
    #[error("Session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// User commands accepted by a running session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SelectProduct(String),
    SwitchMode(SessionMode),
    SetScale(f64),
    SetPosition(Axis, f64),
    SetRotation(Axis, f64),
    ResetPlacement,
    /// Anchor the model at a surface hit in the AR scene
    HitTest([f64; 3]),
    RetryCamera,
    /// Composite the current camera frame with the overlay
    Capture,
    OpenShare,
    DismissShare,
    Share(ShareMethod),
}

/// Platform services used by the session
#[derive(Clone)]
pub struct Collaborators {
    pub capability: Arc<dyn CapabilityProbe>,
    pub media: Arc<dyn MediaDevices>,
    pub assets: Arc<dyn AssetLoader>,
    pub overlay: Arc<dyn OverlaySurface>,
    pub detector: Arc<dyn FaceDetector>,
    pub share: Arc<dyn ShareTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverConfig {
    pub camera: VideoConstraints,
    pub detection_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            camera: VideoConstraints::default(),
            detection_interval: DEFAULT_DETECTION_INTERVAL,
        }
    }
}

enum Completion {
    Capability(Result<bool, CapabilityError>),
    Asset(LoadTicket, Result<(), AssetError>),
    /// The lease stops the stream if the completion is dropped unread
    Camera(u64, Result<CameraLease, MediaError>),
    Shared(Uuid, Result<ShareOutcome, ShareError>),
}

/// Handle to a running session
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands.send(command).await.map_err(|_| SessionError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stop the session, releasing the camera and the tracker
    pub async fn shutdown(self) -> Result<(), SessionError> {
        drop(self.commands);
        self.task.await?;
        Ok(())
    }
}

pub struct SessionDriver;

impl SessionDriver {
    /// Start the session task
    pub fn spawn(machine: TryOnSession, collaborators: Collaborators, config: DriverConfig) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (completion_tx, completion_rx) = mpsc::channel(32);
        let (tracker_tx, tracker_rx) = mpsc::channel(8);
        let (events, _) = broadcast::channel(100);

        let runner = Runner {
            machine,
            collaborators,
            config,
            camera: Arc::new(CameraSlot::new()),
            tracker: None,
            events: events.clone(),
            completion_tx,
            tracker_tx,
        };
        let task = tokio::spawn(runner.run(command_rx, completion_rx, tracker_rx));

        SessionHandle {
            commands: command_tx,
            events,
            task,
        }
    }
}

struct Runner {
    machine: TryOnSession,
    collaborators: Collaborators,
    config: DriverConfig,
    camera: Arc<CameraSlot>,
    tracker: Option<FaceTracker>,
    events: broadcast::Sender<SessionEvent>,
    completion_tx: mpsc::Sender<Completion>,
    tracker_tx: mpsc::Sender<TrackerEvent>,
}

impl Runner {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut completions: mpsc::Receiver<Completion>,
        mut tracker_events: mpsc::Receiver<TrackerEvent>,
    ) {
        info!("Try-on session started");

        loop {
            let input = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => Some(self.command_input(command)),
                    None => break,
                },
                Some(done) = completions.recv() => self.completion_input(done),
                Some(event) = tracker_events.recv() => Some(match event {
                    TrackerEvent::Detected(landmarks) => SessionInput::FaceDetected(landmarks),
                    TrackerEvent::Lost => SessionInput::FaceLost,
                }),
            };

            if let Some(input) = input {
                let effects = self.machine.handle(input);
                self.perform(effects).await;
            }
        }

        let effects = self.machine.teardown();
        self.perform(effects).await;

        // Streams that arrived after the last command are stopped here
        completions.close();
        while let Ok(done) = completions.try_recv() {
            if let Completion::Camera(request, Ok(lease)) = done {
                debug!(request = request, "Releasing camera stream opened during shutdown");
                drop(lease);
            }
        }
        info!("Try-on session stopped");
    }

    fn command_input(&self, command: SessionCommand) -> SessionInput {
        match command {
            SessionCommand::SelectProduct(id) => SessionInput::SelectProduct(id),
            SessionCommand::SwitchMode(mode) => SessionInput::SwitchMode(mode),
            SessionCommand::SetScale(v) => SessionInput::SetScale(v),
            SessionCommand::SetPosition(axis, v) => SessionInput::SetPosition(axis, v),
            SessionCommand::SetRotation(axis, v) => SessionInput::SetRotation(axis, v),
            SessionCommand::ResetPlacement => SessionInput::ResetPlacement,
            SessionCommand::HitTest(point) => SessionInput::HitTest(point),
            SessionCommand::RetryCamera => SessionInput::RetryCamera,
            SessionCommand::Capture => SessionInput::Capture {
                video: self.camera.current_frame(),
                render: self.collaborators.overlay.snapshot(&self.machine.placement()),
            },
            SessionCommand::OpenShare => SessionInput::OpenShare,
            SessionCommand::DismissShare => SessionInput::DismissShare,
            SessionCommand::Share(method) => SessionInput::Share(method),
        }
    }

    fn completion_input(&self, done: Completion) -> Option<SessionInput> {
        match done {
            Completion::Capability(Ok(supported)) => Some(SessionInput::CapabilityResolved(supported)),
            Completion::Capability(Err(e)) => {
                warn!(error = %e, "Capability query failed, assuming no immersive AR");
                Some(SessionInput::CapabilityResolved(false))
            }
            Completion::Asset(ticket, Ok(())) => Some(SessionInput::AssetLoaded(ticket)),
            Completion::Asset(ticket, Err(e)) => Some(SessionInput::AssetFailed(ticket, e)),
            Completion::Camera(request, Ok(lease)) => {
                if self.machine.camera_status() == CameraStatus::Requested && self.machine.camera_request() == request
                {
                    self.camera.install(lease);
                    Some(SessionInput::CameraOpened(request))
                } else {
                    // Dropping the lease stops the late stream
                    debug!(request = request, "Camera stream arrived after it was released");
                    None
                }
            }
            Completion::Camera(request, Err(e)) => Some(SessionInput::CameraFailed(request, e)),
            Completion::Shared(artifact, result) => Some(SessionInput::ShareFinished { artifact, result }),
        }
    }

    async fn perform(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Emit(event) => {
                    let _ = self.events.send(event);
                }
                Effect::ProbeCapability => {
                    let probe = self.collaborators.capability.clone();
                    let tx = self.completion_tx.clone();
                    tokio::spawn(async move {
                        let result = probe.immersive_ar_supported().await;
                        let _ = tx.send(Completion::Capability(result)).await;
                    });
                }
                Effect::LoadAsset(request) => {
                    let loader = self.collaborators.assets.clone();
                    let tx = self.completion_tx.clone();
                    debug!(asset = %request.asset, generation = request.ticket.generation, "Loading asset");
                    tokio::spawn(async move {
                        let result = loader.load(request.asset).await;
                        let _ = tx.send(Completion::Asset(request.ticket, result)).await;
                    });
                }
                Effect::AcquireCamera(request) => {
                    let media = self.collaborators.media.clone();
                    let constraints = self.config.camera;
                    let tx = self.completion_tx.clone();
                    debug!(request = request, "Requesting camera");
                    tokio::spawn(async move {
                        let result = media.open(constraints).await.map(CameraLease::new);
                        let _ = tx.send(Completion::Camera(request, result)).await;
                    });
                }
                Effect::ReleaseCamera => {
                    if self.camera.release() {
                        info!("Camera released");
                    }
                }
                Effect::StartTracker => {
                    if self.tracker.is_none() {
                        self.tracker = Some(FaceTracker::spawn(
                            self.collaborators.detector.clone(),
                            self.camera.clone(),
                            self.config.detection_interval,
                            self.tracker_tx.clone(),
                        ));
                    }
                }
                Effect::StopTracker => {
                    if let Some(tracker) = self.tracker.take() {
                        let cycles = tracker.shutdown().await;
                        debug!(cycles = cycles, "Tracker shut down");
                    }
                }
                Effect::Share {
                    artifact,
                    product,
                    method,
                } => {
                    let share = self.collaborators.share.clone();
                    let tx = self.completion_tx.clone();
                    let id = artifact.id;
                    tokio::spawn(async move {
                        let result =
                            tokio::task::spawn_blocking(move || share.share(&artifact, product.as_str(), method))
                                .await
                                .unwrap_or_else(|e| Err(ShareError::Native(e.to_string())));
                        let _ = tx.send(Completion::Shared(id, result)).await;
                    });
                }
            }
        }
    }
}
