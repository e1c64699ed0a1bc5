//! Tryon Session - Interaction core of the virtual try-on view
//!
//! This crate provides:
//! - Presentation mode selection (WebXR, WebGL overlay, face tracking)
//! - The try-on state machine (load, adjust, capture, share)
//! - The face tracker task feeding landmarks into the session
//! - The async driver that runs a session against platform collaborators
//! - Demo authenticity and fit services

pub mod collaborators;
pub mod driver;
pub mod machine;
pub mod mode;
pub mod services;
pub mod tracker;

pub use collaborators::{
    AssetError, AssetLoader, CameraLease, CameraSlot, CapabilityError, CapabilityProbe, DetectorError, FaceDetector,
    FacingMode, FrameSource, MediaDevices, MediaError, MediaStream, OverlaySurface, VideoConstraints,
};
pub use driver::{Collaborators, DriverConfig, SessionCommand, SessionDriver, SessionError, SessionHandle};
pub use machine::{
    CameraStatus, Effect, LoadRequest, LoadTicket, Notice, NoticeKind, SessionConfig, SessionEvent, SessionInput,
    TryOnSession, TryOnState,
};
pub use mode::{check_switch, select_mode, ModeSwitchError, SessionMode};
pub use services::{
    AuthenticityLedger, AuthenticityRecord, BodyMeasurements, FaceMeasurements, FitAdvisor, LookupError,
    OwnershipToken, Recommendation, Size,
};
pub use tracker::{FaceTracker, TrackerEvent, DEFAULT_DETECTION_INTERVAL};
