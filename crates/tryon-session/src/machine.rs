//! Try-on mode state machine
//!
//! The machine is a plain value: it consumes [`SessionInput`] messages and
//! answers with a list of [`Effect`]s for the driver to carry out. It never
//! talks to a collaborator directly, so every transition can be exercised
//! without a runtime.
//!
//! States: `idle -> loading -> ready -> capturing -> ready -> sharing -> ready`.
//! Selecting a product from any state re-enters `loading`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tryon_capture::{capture, CaptureArtifact, Frame, OutputDims, ShareError, ShareMethod, ShareOutcome};
use tryon_core::{
    AssetRef, Axis, Category, FaceLandmarks, ModelResolver, Placement, PlacementController, ProductId,
    ProductRepository, Viewport,
};
use uuid::Uuid;

use crate::collaborators::{AssetError, MediaError};
use crate::mode::{check_switch, select_mode, SessionMode};

/// Coarse state of the try-on view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TryOnState {
    Idle,
    Loading,
    Ready,
    Capturing,
    Sharing,
}

/// Identity of one asset load; completions carrying an older ticket are stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub product: ProductId,
}

/// Request for the asset loader
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub ticket: LoadTicket,
    pub asset: AssetRef,
    pub category: Category,
}

/// Camera permission / stream status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    Off,
    Requested,
    Live,
    /// Denied or unavailable; only an explicit retry requests it again
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Blocking until the user retries (camera denied)
    PermissionBlocked,
    /// Dismissible hint (unsupported mode requested)
    Advisory,
    CaptureFailed,
    ShareFailed,
    LoadFailed,
    Info,
}

impl NoticeKind {
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::PermissionBlocked)
    }
}

/// User-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    fn new(kind: NoticeKind, title: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

/// Events for the surrounding UI
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged { from: TryOnState, to: TryOnState },
    ProductSelected {
        product: ProductId,
        category: Category,
        name: Option<String>,
    },
    ModeChanged(SessionMode),
    PlacementChanged(Placement),
    ControlsVisible(bool),
    FacePresence(bool),
    CameraAvailable(bool),
    CaptureStored { id: Uuid, width: u32, height: u32 },
    ShareSurface(bool),
    Shared(ShareOutcome),
    Notice(Notice),
}

/// Messages consumed by the machine
#[derive(Debug)]
pub enum SessionInput {
    SelectProduct(String),
    CapabilityResolved(bool),
    AssetLoaded(LoadTicket),
    AssetFailed(LoadTicket, AssetError),
    CameraOpened(u64),
    CameraFailed(u64, MediaError),
    RetryCamera,
    SwitchMode(SessionMode),
    SetScale(f64),
    SetPosition(Axis, f64),
    SetRotation(Axis, f64),
    ResetPlacement,
    /// Surface hit in the immersive scene; the first one anchors the model
    HitTest([f64; 3]),
    FaceDetected(FaceLandmarks),
    FaceLost,
    Capture {
        video: Option<Frame>,
        render: Option<Frame>,
    },
    OpenShare,
    DismissShare,
    Share(ShareMethod),
    ShareFinished {
        artifact: Uuid,
        result: Result<ShareOutcome, ShareError>,
    },
}

/// Work for the driver
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Emit(SessionEvent),
    ProbeCapability,
    LoadAsset(LoadRequest),
    /// Open the camera; the completion must carry this request id
    AcquireCamera(u64),
    ReleaseCamera,
    StartTracker,
    StopTracker,
    Share {
        artifact: CaptureArtifact,
        product: ProductId,
        method: ShareMethod,
    },
}

/// Static session parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Viewport used to normalize face landmarks
    pub viewport: Viewport,
    /// Size of captured stills
    pub capture: OutputDims,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::new(1280.0, 720.0),
            capture: OutputDims::new(1280, 720),
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveProduct {
    id: ProductId,
    category: Category,
    asset: AssetRef,
    ticket: LoadTicket,
}

/// The try-on session state machine
pub struct TryOnSession {
    config: SessionConfig,
    catalog: Arc<dyn ProductRepository>,
    resolver: ModelResolver,
    state: TryOnState,
    mode: SessionMode,
    active: Option<ActiveProduct>,
    placement: PlacementController,
    generation: u64,
    xr_supported: Option<bool>,
    probe_pending: bool,
    camera: CameraStatus,
    camera_request: u64,
    tracker_running: bool,
    face_present: bool,
    controls_visible: bool,
    artifact: Option<CaptureArtifact>,
    share_in_flight: bool,
    anchored: bool,
}

impl TryOnSession {
    pub fn new(config: SessionConfig, catalog: Arc<dyn ProductRepository>, resolver: ModelResolver) -> Self {
        Self {
            config,
            catalog,
            resolver,
            state: TryOnState::Idle,
            mode: SessionMode::default(),
            active: None,
            placement: PlacementController::new(Category::Unknown),
            generation: 0,
            xr_supported: None,
            probe_pending: false,
            camera: CameraStatus::Off,
            camera_request: 0,
            tracker_running: false,
            face_present: false,
            controls_visible: false,
            artifact: None,
            share_in_flight: false,
            anchored: false,
        }
    }

    pub fn state(&self) -> TryOnState {
        self.state
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn placement(&self) -> Placement {
        self.placement.placement()
    }

    pub fn active_product(&self) -> Option<&ProductId> {
        self.active.as_ref().map(|a| &a.id)
    }

    pub fn active_asset(&self) -> Option<&AssetRef> {
        self.active.as_ref().map(|a| &a.asset)
    }

    pub fn artifact(&self) -> Option<&CaptureArtifact> {
        self.artifact.as_ref()
    }

    pub fn camera_status(&self) -> CameraStatus {
        self.camera
    }

    /// Id of the most recent camera request
    pub fn camera_request(&self) -> u64 {
        self.camera_request
    }

    pub fn xr_supported(&self) -> Option<bool> {
        self.xr_supported
    }

    pub fn face_present(&self) -> bool {
        self.face_present
    }

    pub fn controls_visible(&self) -> bool {
        self.controls_visible
    }

    /// Whether a hit test has placed the model in the current scene
    pub fn anchored(&self) -> bool {
        self.anchored
    }

    pub fn tracker_running(&self) -> bool {
        self.tracker_running
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Process one input message
    pub fn handle(&mut self, input: SessionInput) -> Vec<Effect> {
        let mut out = Vec::new();
        match input {
            SessionInput::SelectProduct(id) => self.select_product(&id, &mut out),
            SessionInput::CapabilityResolved(supported) => self.capability_resolved(supported, &mut out),
            SessionInput::AssetLoaded(ticket) => self.asset_loaded(ticket, &mut out),
            SessionInput::AssetFailed(ticket, err) => self.asset_failed(ticket, err, &mut out),
            SessionInput::CameraOpened(request) => self.camera_opened(request, &mut out),
            SessionInput::CameraFailed(request, err) => self.camera_failed(request, err, &mut out),
            SessionInput::RetryCamera => self.retry_camera(&mut out),
            SessionInput::SwitchMode(target) => self.switch_mode(target, &mut out),
            SessionInput::SetScale(v) => {
                if self.active.is_some() {
                    self.placement.set_scale(v);
                    self.emit_placement(&mut out);
                }
            }
            SessionInput::SetPosition(axis, v) => {
                if self.active.is_some() {
                    self.placement.set_position(axis, v);
                    self.emit_placement(&mut out);
                }
            }
            SessionInput::SetRotation(axis, v) => {
                if self.active.is_some() {
                    self.placement.set_rotation(axis, v);
                    self.emit_placement(&mut out);
                }
            }
            SessionInput::ResetPlacement => {
                if self.active.is_some() {
                    self.placement.reset();
                    self.anchored = false;
                    self.emit_placement(&mut out);
                }
            }
            SessionInput::HitTest(point) => self.hit_test(point, &mut out),
            SessionInput::FaceDetected(landmarks) => self.face_detected(&landmarks, &mut out),
            SessionInput::FaceLost => self.set_face_present(false, &mut out),
            SessionInput::Capture { video, render } => self.capture(video.as_ref(), render.as_ref(), &mut out),
            SessionInput::OpenShare => self.open_share(&mut out),
            SessionInput::DismissShare => {
                if self.state == TryOnState::Sharing {
                    self.transition(TryOnState::Ready, &mut out);
                    emit(&mut out, SessionEvent::ShareSurface(false));
                }
            }
            SessionInput::Share(method) => self.share(method, &mut out),
            SessionInput::ShareFinished { artifact, result } => self.share_finished(artifact, result, &mut out),
        }
        out
    }

    /// Effects that release every resource the session holds
    pub fn teardown(&mut self) -> Vec<Effect> {
        let mut out = Vec::new();
        if self.tracker_running {
            self.tracker_running = false;
            out.push(Effect::StopTracker);
        }
        if matches!(self.camera, CameraStatus::Requested | CameraStatus::Live) {
            self.camera = CameraStatus::Off;
            out.push(Effect::ReleaseCamera);
        }
        out
    }

    fn select_product(&mut self, raw_id: &str, out: &mut Vec<Effect>) {
        let id = ProductId::new(raw_id);
        let category = id.category();
        let resolved = self.resolver.resolve(Some(raw_id));

        let name = match self.catalog.get(raw_id) {
            Ok(product) => Some(product.name),
            Err(e) => {
                debug!(product = %id, error = %e, "Product not in catalog");
                None
            }
        };

        self.generation += 1;
        let ticket = LoadTicket {
            generation: self.generation,
            product: id.clone(),
        };

        // Anything tied to the previous product goes
        self.artifact = None;
        self.share_in_flight = false;
        self.anchored = false;
        self.placement.rebind(category);
        if self.controls_visible {
            self.controls_visible = false;
            emit(out, SessionEvent::ControlsVisible(false));
        }

        self.active = Some(ActiveProduct {
            id: id.clone(),
            category,
            asset: resolved.asset.clone(),
            ticket: ticket.clone(),
        });

        info!(
            product = %id,
            category = %category,
            asset = %resolved.asset,
            "Product selected"
        );

        emit(
            out,
            SessionEvent::ProductSelected {
                product: id,
                category,
                name,
            },
        );
        self.transition(TryOnState::Loading, out);

        let mode = select_mode(category, self.xr_supported.unwrap_or(false));
        self.set_mode(mode, out);

        if category != Category::Glasses && self.xr_supported.is_none() && !self.probe_pending {
            self.probe_pending = true;
            out.push(Effect::ProbeCapability);
        }

        self.emit_placement(out);
        out.push(Effect::LoadAsset(LoadRequest {
            ticket,
            asset: resolved.asset,
            category,
        }));
    }

    fn capability_resolved(&mut self, supported: bool, out: &mut Vec<Effect>) {
        self.probe_pending = false;
        self.xr_supported = Some(supported);
        info!(supported = supported, "Immersive AR capability resolved");

        // Re-evaluate presentation for the product already on screen
        if let Some(category) = self.active.as_ref().map(|a| a.category) {
            if category != Category::Glasses {
                self.set_mode(select_mode(category, supported), out);
            }
        }
    }

    fn asset_loaded(&mut self, ticket: LoadTicket, out: &mut Vec<Effect>) {
        if !self.is_current(&ticket) || self.state != TryOnState::Loading {
            debug!(
                product = %ticket.product,
                generation = ticket.generation,
                "Ignoring stale asset load"
            );
            return;
        }

        self.transition(TryOnState::Ready, out);
        self.controls_visible = true;
        emit(out, SessionEvent::ControlsVisible(true));
        emit(
            out,
            SessionEvent::Notice(Notice::new(
                NoticeKind::Info,
                "Model loaded successfully",
                "You can now adjust the position, scale, and rotation.",
            )),
        );
    }

    fn asset_failed(&mut self, ticket: LoadTicket, err: AssetError, out: &mut Vec<Effect>) {
        if !self.is_current(&ticket) || self.state != TryOnState::Loading {
            debug!(product = %ticket.product, "Ignoring stale asset failure");
            return;
        }

        warn!(product = %ticket.product, error = %err, "Asset failed to load");
        self.transition(TryOnState::Idle, out);
        emit(
            out,
            SessionEvent::Notice(Notice::new(NoticeKind::LoadFailed, "Could not load model", err.to_string())),
        );
    }

    fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.active.as_ref().map_or(false, |a| a.ticket == *ticket)
    }

    fn camera_opened(&mut self, request: u64, out: &mut Vec<Effect>) {
        if self.camera != CameraStatus::Requested || request != self.camera_request {
            debug!(request = request, "Discarding stale camera stream");
            return;
        }
        self.camera = CameraStatus::Live;
        emit(out, SessionEvent::CameraAvailable(true));
    }

    fn camera_failed(&mut self, request: u64, err: MediaError, out: &mut Vec<Effect>) {
        if self.camera != CameraStatus::Requested || request != self.camera_request {
            debug!(request = request, error = %err, "Ignoring stale camera failure");
            return;
        }

        warn!(error = %err, "Camera unavailable");
        self.camera = CameraStatus::Blocked;
        emit(out, SessionEvent::CameraAvailable(false));

        let message = match err {
            MediaError::PermissionDenied => "Allow camera access and retry to use virtual try-on.".to_string(),
            MediaError::Unavailable(reason) => format!("The camera could not be started: {}", reason),
        };
        emit(
            out,
            SessionEvent::Notice(Notice::new(NoticeKind::PermissionBlocked, "Camera access required", message)),
        );
    }

    fn retry_camera(&mut self, out: &mut Vec<Effect>) {
        if self.camera != CameraStatus::Blocked {
            return;
        }
        info!("Retrying camera access");
        self.camera = CameraStatus::Off;
        self.sync_resources(out);
    }

    fn switch_mode(&mut self, target: SessionMode, out: &mut Vec<Effect>) {
        let Some(category) = self.active.as_ref().map(|a| a.category) else {
            debug!(mode = %target, "Mode switch without a product");
            return;
        };

        match check_switch(category, self.xr_supported, target) {
            Ok(()) => self.set_mode(target, out),
            Err(e) => {
                debug!(mode = %target, error = %e, "Mode switch rejected");
                emit(
                    out,
                    SessionEvent::Notice(Notice::new(NoticeKind::Advisory, "Mode not available", e.to_string())),
                );
            }
        }
    }

    fn set_mode(&mut self, mode: SessionMode, out: &mut Vec<Effect>) {
        if self.mode != mode {
            info!(from = %self.mode, to = %mode, "Presentation mode changed");
            self.mode = mode;
            self.anchored = false;
            emit(out, SessionEvent::ModeChanged(mode));
        }
        if !mode.runs_tracker() {
            self.set_face_present(false, out);
        }
        self.sync_resources(out);
    }

    /// Bring camera and tracker in line with the current mode
    fn sync_resources(&mut self, out: &mut Vec<Effect>) {
        let active = self.active.is_some();

        let wants_camera = active && self.mode.needs_camera();
        match (wants_camera, self.camera) {
            (true, CameraStatus::Off) => {
                self.camera_request += 1;
                self.camera = CameraStatus::Requested;
                out.push(Effect::AcquireCamera(self.camera_request));
            }
            (false, CameraStatus::Requested | CameraStatus::Live) => {
                self.camera = CameraStatus::Off;
                out.push(Effect::ReleaseCamera);
            }
            _ => {}
        }

        let wants_tracker = active && self.mode.runs_tracker();
        if wants_tracker != self.tracker_running {
            self.tracker_running = wants_tracker;
            out.push(if wants_tracker {
                Effect::StartTracker
            } else {
                Effect::StopTracker
            });
        }
    }

    fn hit_test(&mut self, point: [f64; 3], out: &mut Vec<Effect>) {
        if self.anchored || self.mode != SessionMode::WebXr || self.state != TryOnState::Ready {
            debug!(point = ?point, "Ignoring hit test");
            return;
        }

        let position = self.placement.place_at(point);
        self.anchored = true;
        info!(position = ?position, "Model anchored");
        self.emit_placement(out);
        emit(
            out,
            SessionEvent::Notice(Notice::new(
                NoticeKind::Info,
                "Model placed",
                "The 3D model has been placed in your environment.",
            )),
        );
    }

    fn face_detected(&mut self, landmarks: &FaceLandmarks, out: &mut Vec<Effect>) {
        if self.mode != SessionMode::FaceTracking || self.active.is_none() {
            return;
        }
        self.set_face_present(true, out);
        if self.placement.follow_landmarks(landmarks, self.config.viewport) {
            self.emit_placement(out);
        }
    }

    fn set_face_present(&mut self, present: bool, out: &mut Vec<Effect>) {
        if self.face_present != present {
            self.face_present = present;
            emit(out, SessionEvent::FacePresence(present));
        }
    }

    fn capture(&mut self, video: Option<&Frame>, render: Option<&Frame>, out: &mut Vec<Effect>) {
        if self.state != TryOnState::Ready {
            debug!(state = ?self.state, "Capture requested outside ready state");
            emit(
                out,
                SessionEvent::Notice(Notice::new(
                    NoticeKind::CaptureFailed,
                    "Screenshot failed",
                    "The try-on view is not ready yet.",
                )),
            );
            return;
        }

        self.transition(TryOnState::Capturing, out);

        match capture(video, render, self.config.capture) {
            Ok(artifact) => {
                info!(
                    capture = %artifact.id,
                    width = artifact.width,
                    height = artifact.height,
                    "Screenshot taken"
                );
                emit(
                    out,
                    SessionEvent::CaptureStored {
                        id: artifact.id,
                        width: artifact.width,
                        height: artifact.height,
                    },
                );
                self.artifact = Some(artifact);
                self.transition(TryOnState::Ready, out);
                self.transition(TryOnState::Sharing, out);
                emit(out, SessionEvent::ShareSurface(true));
            }
            Err(e) => {
                warn!(error = %e, "Screenshot failed");
                emit(
                    out,
                    SessionEvent::Notice(Notice::new(NoticeKind::CaptureFailed, "Screenshot failed", e.to_string())),
                );
                self.transition(TryOnState::Ready, out);
            }
        }
    }

    fn open_share(&mut self, out: &mut Vec<Effect>) {
        if self.state == TryOnState::Ready && self.artifact.is_some() {
            self.transition(TryOnState::Sharing, out);
            emit(out, SessionEvent::ShareSurface(true));
        }
    }

    fn share(&mut self, method: ShareMethod, out: &mut Vec<Effect>) {
        if self.state != TryOnState::Sharing || self.share_in_flight {
            return;
        }
        let (Some(artifact), Some(active)) = (&self.artifact, &self.active) else {
            return;
        };

        self.share_in_flight = true;
        out.push(Effect::Share {
            artifact: artifact.clone(),
            product: active.id.clone(),
            method,
        });
    }

    fn share_finished(&mut self, artifact: Uuid, result: Result<ShareOutcome, ShareError>, out: &mut Vec<Effect>) {
        if self.artifact.as_ref().map(|a| a.id) != Some(artifact) {
            debug!(capture = %artifact, "Ignoring share result for a discarded capture");
            return;
        }
        self.share_in_flight = false;
        match result {
            Ok(outcome) => {
                let message = match &outcome {
                    ShareOutcome::Shared => "Your AR try-on has been shared.".to_string(),
                    ShareOutcome::Downloaded(path) => {
                        format!("Your AR try-on has been downloaded to {}.", path.display())
                    }
                };
                emit(out, SessionEvent::Shared(outcome));
                emit(
                    out,
                    SessionEvent::Notice(Notice::new(NoticeKind::Info, "Capture exported", message)),
                );
                if self.state == TryOnState::Sharing {
                    self.transition(TryOnState::Ready, out);
                    emit(out, SessionEvent::ShareSurface(false));
                }
            }
            Err(e) => {
                // Artifact stays so the user can retry or download instead
                warn!(error = %e, "Sharing failed");
                emit(
                    out,
                    SessionEvent::Notice(Notice::new(
                        NoticeKind::ShareFailed,
                        "Error sharing image",
                        format!("{}. Please try again.", e),
                    )),
                );
            }
        }
    }

    fn transition(&mut self, to: TryOnState, out: &mut Vec<Effect>) {
        let from = self.state;
        if from == to {
            return;
        }
        debug!(from = ?from, to = ?to, "State transition");
        self.state = to;
        emit(out, SessionEvent::StateChanged { from, to });
    }

    fn emit_placement(&self, out: &mut Vec<Effect>) {
        emit(out, SessionEvent::PlacementChanged(self.placement.placement()));
    }
}

fn emit(out: &mut Vec<Effect>, event: SessionEvent) {
    out.push(Effect::Emit(event));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::testing::solid_frame;
    use std::path::PathBuf;
    use tryon_core::{InMemoryCatalog, Point2};

    fn session() -> TryOnSession {
        TryOnSession::new(
            SessionConfig {
                viewport: Viewport::new(1280.0, 720.0),
                capture: OutputDims::new(8, 4),
            },
            Arc::new(InMemoryCatalog::builtin()),
            ModelResolver::builtin(),
        )
    }

    fn events(effects: &[Effect]) -> Vec<&SessionEvent> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Emit(ev) => Some(ev),
                _ => None,
            })
            .collect()
    }

    fn load_request(effects: &[Effect]) -> LoadRequest {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::LoadAsset(req) => Some(req.clone()),
                _ => None,
            })
            .expect("selection should request an asset load")
    }

    fn camera_request(effects: &[Effect]) -> Option<u64> {
        effects.iter().find_map(|e| match e {
            Effect::AcquireCamera(id) => Some(*id),
            _ => None,
        })
    }

    /// Select a product and complete its load
    fn ready_with(session: &mut TryOnSession, product: &str) -> Vec<Effect> {
        let effects = session.handle(SessionInput::SelectProduct(product.to_string()));
        let req = load_request(&effects);
        session.handle(SessionInput::AssetLoaded(req.ticket));
        assert_eq!(session.state(), TryOnState::Ready);
        effects
    }

    fn frames() -> (Option<Frame>, Option<Frame>) {
        (
            Some(solid_frame(8, 4, [255, 0, 0, 255])),
            Some(solid_frame(8, 4, [0, 0, 0, 0])),
        )
    }

    #[test]
    fn test_select_glasses() {
        let mut s = session();
        let effects = s.handle(SessionInput::SelectProduct("glasses-1".to_string()));

        assert_eq!(s.state(), TryOnState::Loading);
        assert_eq!(s.mode(), SessionMode::FaceTracking);
        assert_eq!(s.placement().position, [0.0, 0.2, -1.0]);
        assert_eq!(s.placement().scale, 1.0);

        let req = load_request(&effects);
        assert_eq!(req.asset.as_str(), "/models/glasses-aviator.glb");
        assert_eq!(req.category, Category::Glasses);

        // Face tracking needs the camera and the tracker; no capability probe
        assert!(camera_request(&effects).is_some());
        assert!(effects.contains(&Effect::StartTracker));
        assert!(!effects.contains(&Effect::ProbeCapability));

        assert!(events(&effects).contains(&&SessionEvent::ProductSelected {
            product: ProductId::new("glasses-1"),
            category: Category::Glasses,
            name: Some("Classic Aviator".to_string()),
        }));
    }

    #[test]
    fn test_select_shirt_with_xr() {
        let mut s = session();
        s.handle(SessionInput::CapabilityResolved(true));

        let effects = s.handle(SessionInput::SelectProduct("shirt-2".to_string()));
        assert_eq!(s.mode(), SessionMode::WebXr);
        assert_eq!(s.placement().position, [0.0, -1.0, -3.0]);
        // The XR session owns the camera
        assert!(camera_request(&effects).is_none());
        assert!(!effects.contains(&Effect::ProbeCapability));
    }

    #[test]
    fn test_capability_probe_once_and_reevaluated() {
        let mut s = session();
        let effects = s.handle(SessionInput::SelectProduct("jacket-1".to_string()));
        assert_eq!(s.mode(), SessionMode::WebGl);
        assert!(effects.contains(&Effect::ProbeCapability));

        // A second selection while the probe is pending does not probe again
        let effects = s.handle(SessionInput::SelectProduct("shirt-1".to_string()));
        assert!(!effects.contains(&Effect::ProbeCapability));

        // Capability arrives: presentation switches, camera released
        let effects = s.handle(SessionInput::CapabilityResolved(true));
        assert_eq!(s.mode(), SessionMode::WebXr);
        assert!(effects.contains(&Effect::ReleaseCamera));
        assert!(events(&effects).contains(&&SessionEvent::ModeChanged(SessionMode::WebXr)));
    }

    #[test]
    fn test_glasses_ignore_xr_capability() {
        let mut s = session();
        s.handle(SessionInput::CapabilityResolved(true));
        s.handle(SessionInput::SelectProduct("glasses-2".to_string()));
        assert_eq!(s.mode(), SessionMode::FaceTracking);

        s.handle(SessionInput::CapabilityResolved(true));
        assert_eq!(s.mode(), SessionMode::FaceTracking);
    }

    #[test]
    fn test_unknown_product_falls_back() {
        let mut s = session();
        let effects = s.handle(SessionInput::SelectProduct("unknown-id".to_string()));
        let req = load_request(&effects);
        assert!(req.asset.is_fallback());
        assert_eq!(s.placement().position, [0.0, 0.0, -2.0]);
        assert_eq!(s.mode(), SessionMode::WebGl);
    }

    #[test]
    fn test_load_completes_to_ready() {
        let mut s = session();
        let effects = s.handle(SessionInput::SelectProduct("shirt-1".to_string()));
        let effects = s.handle(SessionInput::AssetLoaded(load_request(&effects).ticket));

        assert_eq!(s.state(), TryOnState::Ready);
        assert!(s.controls_visible());
        assert!(events(&effects).contains(&&SessionEvent::ControlsVisible(true)));
    }

    #[test]
    fn test_stale_load_ignored() {
        let mut s = session();
        let first = load_request(&s.handle(SessionInput::SelectProduct("glasses-1".to_string())));
        let second = load_request(&s.handle(SessionInput::SelectProduct("shirt-1".to_string())));

        // The glasses load finishes late
        let effects = s.handle(SessionInput::AssetLoaded(first.ticket.clone()));
        assert!(effects.is_empty());
        assert_eq!(s.state(), TryOnState::Loading);
        assert_eq!(s.active_product(), Some(&ProductId::new("shirt-1")));

        // Reselecting the same product still invalidates older loads
        let third = load_request(&s.handle(SessionInput::SelectProduct("shirt-1".to_string())));
        assert!(s.handle(SessionInput::AssetLoaded(second.ticket)).is_empty());
        assert_eq!(s.state(), TryOnState::Loading);

        s.handle(SessionInput::AssetLoaded(third.ticket));
        assert_eq!(s.state(), TryOnState::Ready);
    }

    #[test]
    fn test_asset_failure_returns_to_idle() {
        let mut s = session();
        let req = load_request(&s.handle(SessionInput::SelectProduct("jacket-1".to_string())));
        let effects = s.handle(SessionInput::AssetFailed(
            req.ticket,
            AssetError::NotFound("/models/jacket.glb".to_string()),
        ));
        assert_eq!(s.state(), TryOnState::Idle);
        assert!(events(&effects)
            .iter()
            .any(|e| matches!(e, SessionEvent::Notice(n) if n.kind == NoticeKind::LoadFailed)));
    }

    #[test]
    fn test_overrides_clamped() {
        let mut s = session();
        ready_with(&mut s, "glasses-1");

        s.handle(SessionInput::SetScale(5.0));
        assert_eq!(s.placement().scale, 2.0);

        s.handle(SessionInput::SetPosition(Axis::Z, 4.0));
        assert_eq!(s.placement().position[2], 0.0);

        s.handle(SessionInput::SetRotation(Axis::X, -10.0));
        assert_eq!(s.placement().rotation[0], -std::f64::consts::PI);
        assert!(s.placement().is_within_bounds());
    }

    #[test]
    fn test_reset_restores_default() {
        let mut s = session();
        ready_with(&mut s, "jacket-1");

        s.handle(SessionInput::SetScale(0.4));
        s.handle(SessionInput::SetPosition(Axis::X, 1.5));
        s.handle(SessionInput::SetRotation(Axis::Y, 2.0));

        let effects = s.handle(SessionInput::ResetPlacement);
        let default = Category::Jacket.default_placement();
        assert_eq!(s.placement(), default);
        // One atomic placement update
        let updates: Vec<_> = events(&effects)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::PlacementChanged(_)))
            .collect();
        assert_eq!(updates, vec![&SessionEvent::PlacementChanged(default)]);
    }

    #[test]
    fn test_product_change_discards_placement() {
        let mut s = session();
        ready_with(&mut s, "glasses-1");
        s.handle(SessionInput::SetScale(1.8));

        s.handle(SessionInput::SelectProduct("shirt-2".to_string()));
        assert_eq!(s.placement(), Category::Shirt.default_placement());
    }

    #[test]
    fn test_face_landmarks_move_glasses() {
        let mut s = session();
        ready_with(&mut s, "glasses-1");

        let mut points = vec![Point2::new(640.0, 360.0); 68];
        points[36] = Point2::new(600.0, 360.0);
        points[45] = Point2::new(680.0, 360.0);
        let landmarks = FaceLandmarks::new(points).unwrap();

        let effects = s.handle(SessionInput::FaceDetected(landmarks));
        assert!(s.face_present());
        assert_eq!(s.placement().position, [0.0, 0.0, -1.0]);
        assert!(events(&effects).contains(&&SessionEvent::FacePresence(true)));

        let effects = s.handle(SessionInput::FaceLost);
        assert!(!s.face_present());
        assert_eq!(events(&effects), vec![&SessionEvent::FacePresence(false)]);

        // Repeated "lost" signals are not re-announced
        assert!(s.handle(SessionInput::FaceLost).is_empty());
    }

    #[test]
    fn test_face_landmarks_ignored_outside_face_tracking() {
        let mut s = session();
        ready_with(&mut s, "shirt-1");
        let before = s.placement();

        let landmarks = FaceLandmarks::new(vec![Point2::new(10.0, 10.0); 68]).unwrap();
        assert!(s.handle(SessionInput::FaceDetected(landmarks)).is_empty());
        assert_eq!(s.placement(), before);
    }

    #[test]
    fn test_capture_success_opens_share() {
        let mut s = session();
        ready_with(&mut s, "glasses-1");

        let (video, render) = frames();
        let effects = s.handle(SessionInput::Capture { video, render });

        assert_eq!(s.state(), TryOnState::Sharing);
        let artifact = s.artifact().expect("artifact stored");
        assert_eq!((artifact.width, artifact.height), (8, 4));

        let evs = events(&effects);
        assert!(evs.contains(&&SessionEvent::StateChanged {
            from: TryOnState::Ready,
            to: TryOnState::Capturing
        }));
        assert!(evs.contains(&&SessionEvent::StateChanged {
            from: TryOnState::Capturing,
            to: TryOnState::Ready
        }));
        assert!(evs.contains(&&SessionEvent::ShareSurface(true)));
    }

    #[test]
    fn test_capture_without_video_keeps_previous_artifact() {
        let mut s = session();
        ready_with(&mut s, "glasses-1");

        let (video, render) = frames();
        s.handle(SessionInput::Capture { video, render });
        let first_id = s.artifact().unwrap().id;
        s.handle(SessionInput::DismissShare);
        assert_eq!(s.state(), TryOnState::Ready);

        let (_, render) = frames();
        let effects = s.handle(SessionInput::Capture { video: None, render });

        assert_eq!(s.state(), TryOnState::Ready);
        assert_eq!(s.artifact().unwrap().id, first_id);
        assert!(events(&effects)
            .iter()
            .any(|e| matches!(e, SessionEvent::Notice(n) if n.kind == NoticeKind::CaptureFailed)));
        assert!(!events(&effects).contains(&&SessionEvent::ShareSurface(true)));
    }

    #[test]
    fn test_capture_without_render_surface() {
        let mut s = session();
        ready_with(&mut s, "shirt-1");

        let (video, _) = frames();
        s.handle(SessionInput::Capture { video, render: None });
        assert_eq!(s.state(), TryOnState::Ready);
        assert!(s.artifact().is_none());
    }

    #[test]
    fn test_capture_while_loading_rejected() {
        let mut s = session();
        s.handle(SessionInput::SelectProduct("shirt-1".to_string()));

        let (video, render) = frames();
        s.handle(SessionInput::Capture { video, render });
        assert_eq!(s.state(), TryOnState::Loading);
        assert!(s.artifact().is_none());
    }

    #[test]
    fn test_share_flow() {
        let mut s = session();
        ready_with(&mut s, "shirt-2");
        let (video, render) = frames();
        s.handle(SessionInput::Capture { video, render });

        let id = s.artifact().unwrap().id;
        let effects = s.handle(SessionInput::Share(ShareMethod::Preferred));
        assert!(matches!(
            effects.as_slice(),
            [Effect::Share { artifact, product, method: ShareMethod::Preferred }]
                if product.as_str() == "shirt-2" && artifact.id == id
        ));

        // Duplicate request while in flight is dropped
        assert!(s.handle(SessionInput::Share(ShareMethod::Preferred)).is_empty());

        // Failure keeps the artifact and the share surface
        s.handle(SessionInput::ShareFinished {
            artifact: id,
            result: Err(ShareError::Native("closed".to_string())),
        });
        assert_eq!(s.state(), TryOnState::Sharing);
        assert!(s.artifact().is_some());

        // Retry as download
        let effects = s.handle(SessionInput::Share(ShareMethod::Download));
        assert_eq!(effects.len(), 1);
        let path = PathBuf::from("/tmp/ar-tryon-shirt-2.png");
        let effects = s.handle(SessionInput::ShareFinished {
            artifact: id,
            result: Ok(ShareOutcome::Downloaded(path.clone())),
        });
        assert_eq!(s.state(), TryOnState::Ready);
        assert!(events(&effects).contains(&&SessionEvent::Shared(ShareOutcome::Downloaded(path))));

        // Artifact can be shared again later
        s.handle(SessionInput::OpenShare);
        assert_eq!(s.state(), TryOnState::Sharing);
    }

    #[test]
    fn test_product_change_discards_artifact() {
        let mut s = session();
        ready_with(&mut s, "glasses-1");
        let (video, render) = frames();
        s.handle(SessionInput::Capture { video, render });
        assert!(s.artifact().is_some());

        s.handle(SessionInput::SelectProduct("glasses-2".to_string()));
        assert!(s.artifact().is_none());
        assert_eq!(s.state(), TryOnState::Loading);
    }

    #[test]
    fn test_late_share_result_for_previous_product_ignored() {
        let mut s = session();
        ready_with(&mut s, "shirt-1");
        let (video, render) = frames();
        s.handle(SessionInput::Capture { video, render });
        let first = s.artifact().unwrap().id;
        assert_eq!(s.handle(SessionInput::Share(ShareMethod::Preferred)).len(), 1);

        // New product, new capture, new share in flight
        let effects = s.handle(SessionInput::SelectProduct("shirt-2".to_string()));
        s.handle(SessionInput::AssetLoaded(load_request(&effects).ticket));
        let (video, render) = frames();
        s.handle(SessionInput::Capture { video, render });
        let second = s.artifact().unwrap().id;
        assert_ne!(first, second);
        assert_eq!(s.handle(SessionInput::Share(ShareMethod::Preferred)).len(), 1);

        let effects = s.handle(SessionInput::ShareFinished {
            artifact: first,
            result: Ok(ShareOutcome::Shared),
        });
        assert!(effects.is_empty());
        assert_eq!(s.state(), TryOnState::Sharing);
        // Still in flight for the current capture
        assert!(s.handle(SessionInput::Share(ShareMethod::Download)).is_empty());

        let effects = s.handle(SessionInput::ShareFinished {
            artifact: second,
            result: Ok(ShareOutcome::Shared),
        });
        assert!(events(&effects).contains(&&SessionEvent::Shared(ShareOutcome::Shared)));
        assert_eq!(s.state(), TryOnState::Ready);
    }

    #[test]
    fn test_first_hit_anchors_model() {
        let mut s = session();
        s.handle(SessionInput::CapabilityResolved(true));
        ready_with(&mut s, "jacket-1");
        assert!(!s.anchored());

        let effects = s.handle(SessionInput::HitTest([0.5, -0.4, -9.0]));
        assert!(s.anchored());
        assert_eq!(s.placement().position, [0.5, -0.4, -5.0]);
        let evs = events(&effects);
        assert!(evs.contains(&&SessionEvent::PlacementChanged(s.placement())));
        assert!(evs
            .iter()
            .any(|e| matches!(e, SessionEvent::Notice(n) if n.kind == NoticeKind::Info && n.title == "Model placed")));

        // Later hits do not move the anchored model
        assert!(s.handle(SessionInput::HitTest([1.0, 1.0, -1.0])).is_empty());
        assert_eq!(s.placement().position, [0.5, -0.4, -5.0]);

        // Sliders still adjust it
        s.handle(SessionInput::SetPosition(Axis::X, 0.0));
        assert_eq!(s.placement().position[0], 0.0);
    }

    #[test]
    fn test_reset_and_product_change_rearm_hit_test() {
        let mut s = session();
        s.handle(SessionInput::CapabilityResolved(true));
        ready_with(&mut s, "shirt-1");
        s.handle(SessionInput::HitTest([1.0, 0.0, -2.0]));

        s.handle(SessionInput::ResetPlacement);
        assert!(!s.anchored());
        assert_eq!(s.placement(), Category::Shirt.default_placement());
        s.handle(SessionInput::HitTest([0.2, 0.0, -2.0]));
        assert_eq!(s.placement().position, [0.2, 0.0, -2.0]);

        ready_with(&mut s, "jacket-2");
        assert!(!s.anchored());
        assert!(!s.handle(SessionInput::HitTest([0.0, 0.0, -1.0])).is_empty());
    }

    #[test]
    fn test_hit_test_ignored_outside_immersive_scene() {
        let mut s = session();
        ready_with(&mut s, "glasses-1");
        assert!(s.handle(SessionInput::HitTest([0.0, 0.0, -1.0])).is_empty());

        let mut s = session();
        s.handle(SessionInput::CapabilityResolved(false));
        ready_with(&mut s, "shirt-1");
        assert_eq!(s.mode(), SessionMode::WebGl);
        assert!(s.handle(SessionInput::HitTest([0.0, 0.0, -1.0])).is_empty());
        assert!(!s.anchored());

        // Not before the model is loaded
        let mut s = session();
        s.handle(SessionInput::CapabilityResolved(true));
        s.handle(SessionInput::SelectProduct("shirt-1".to_string()));
        assert!(s.handle(SessionInput::HitTest([0.0, 0.0, -1.0])).is_empty());
    }

    #[test]
    fn test_mode_switch_preserves_placement() {
        let mut s = session();
        s.handle(SessionInput::CapabilityResolved(true));
        ready_with(&mut s, "shirt-1");
        assert_eq!(s.mode(), SessionMode::WebXr);

        s.handle(SessionInput::SetScale(1.4));
        let before = s.placement();

        let effects = s.handle(SessionInput::SwitchMode(SessionMode::WebGl));
        assert_eq!(s.mode(), SessionMode::WebGl);
        assert_eq!(s.placement(), before);
        assert_eq!(s.state(), TryOnState::Ready);
        assert!(camera_request(&effects).is_some());
    }

    #[test]
    fn test_forcing_unsupported_mode_is_advisory() {
        let mut s = session();
        s.handle(SessionInput::CapabilityResolved(false));
        ready_with(&mut s, "shirt-1");

        let effects = s.handle(SessionInput::SwitchMode(SessionMode::WebXr));
        assert_eq!(s.mode(), SessionMode::WebGl);
        assert!(events(&effects)
            .iter()
            .any(|e| matches!(e, SessionEvent::Notice(n) if n.kind == NoticeKind::Advisory)));

        // Glasses cannot leave face tracking
        ready_with(&mut s, "glasses-1");
        s.handle(SessionInput::SwitchMode(SessionMode::WebGl));
        assert_eq!(s.mode(), SessionMode::FaceTracking);
    }

    #[test]
    fn test_camera_denial_blocks_until_retry() {
        let mut s = session();
        let effects = s.handle(SessionInput::SelectProduct("glasses-1".to_string()));
        let request = camera_request(&effects).unwrap();

        let effects = s.handle(SessionInput::CameraFailed(request, MediaError::PermissionDenied));
        assert_eq!(s.camera_status(), CameraStatus::Blocked);
        let evs = events(&effects);
        assert!(evs.contains(&&SessionEvent::CameraAvailable(false)));
        assert!(evs
            .iter()
            .any(|e| matches!(e, SessionEvent::Notice(n) if n.kind.is_persistent())));

        // Not retried implicitly, even on product change
        let effects = s.handle(SessionInput::SelectProduct("glasses-2".to_string()));
        assert!(camera_request(&effects).is_none());

        let effects = s.handle(SessionInput::RetryCamera);
        let retry = camera_request(&effects).unwrap();
        assert!(retry > request);
        s.handle(SessionInput::CameraOpened(retry));
        assert_eq!(s.camera_status(), CameraStatus::Live);
    }

    #[test]
    fn test_stale_camera_stream_discarded() {
        let mut s = session();
        let effects = s.handle(SessionInput::SelectProduct("shirt-1".to_string()));
        let first = camera_request(&effects).unwrap();

        // Camera no longer wanted, then wanted again
        s.handle(SessionInput::CapabilityResolved(true));
        let effects = s.handle(SessionInput::SwitchMode(SessionMode::WebGl));
        let second = camera_request(&effects).unwrap();

        s.handle(SessionInput::CameraOpened(first));
        assert_eq!(s.camera_status(), CameraStatus::Requested);
        s.handle(SessionInput::CameraOpened(second));
        assert_eq!(s.camera_status(), CameraStatus::Live);
    }

    #[test]
    fn test_leaving_face_tracking_stops_tracker() {
        let mut s = session();
        ready_with(&mut s, "glasses-1");
        assert!(s.tracker_running());

        let effects = s.handle(SessionInput::SelectProduct("shirt-1".to_string()));
        assert!(effects.contains(&Effect::StopTracker));
        assert!(!s.tracker_running());
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut s = session();
        let effects = s.handle(SessionInput::SelectProduct("glasses-1".to_string()));
        s.handle(SessionInput::CameraOpened(camera_request(&effects).unwrap()));

        let effects = s.teardown();
        assert!(effects.contains(&Effect::StopTracker));
        assert!(effects.contains(&Effect::ReleaseCamera));
        assert!(s.teardown().is_empty());
    }
}
