//! Periodic face detection over the live camera feed
//!
//! The tracker owns one tokio task. Each cycle it grabs the current frame,
//! runs the detector and forwards the result. A cycle only starts after the
//! previous detection finished, so at most one detection is in flight.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tryon_core::FaceLandmarks;

use crate::collaborators::{FaceDetector, FrameSource};

/// Default spacing between detection cycles (~60 Hz)
pub const DEFAULT_DETECTION_INTERVAL: Duration = Duration::from_millis(16);

/// Result of one detection cycle
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Detected(FaceLandmarks),
    /// No frame, no face, or the detector failed
    Lost,
}

/// Handle to a running tracker task; dropping it cancels the task
pub struct FaceTracker {
    cancel: CancellationToken,
    task: Option<JoinHandle<u64>>,
}

impl FaceTracker {
    pub fn spawn<S>(
        detector: Arc<dyn FaceDetector>,
        source: Arc<S>,
        interval: Duration,
        events: mpsc::Sender<TrackerEvent>,
    ) -> Self
    where
        S: FrameSource + ?Sized + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let interval = interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            debug!(interval_ms = interval.as_millis() as u64, "Face tracker started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut cycles: u64 = 0;

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                cycles += 1;

                let event = match source.current_frame() {
                    None => TrackerEvent::Lost,
                    Some(frame) => {
                        let result = tokio::select! {
                            biased;
                            _ = token.cancelled() => break,
                            result = detector.detect(&frame) => result,
                        };
                        match result {
                            Ok(Some(landmarks)) => TrackerEvent::Detected(landmarks),
                            Ok(None) => TrackerEvent::Lost,
                            Err(e) => {
                                warn!(error = %e, "Face detection failed");
                                TrackerEvent::Lost
                            }
                        }
                    }
                };

                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    sent = events.send(event) => {
                        if sent.is_err() {
                            debug!("Tracker event receiver closed");
                            break;
                        }
                    }
                }
            }

            debug!(cycles = cycles, "Face tracker stopped");
            cycles
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Cancel the task and wait for it to finish. Returns the number of
    /// cycles it ran.
    pub async fn shutdown(mut self) -> u64 {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => match task.await {
                Ok(cycles) => cycles,
                Err(e) => {
                    warn!(error = %e, "Face tracker task failed");
                    0
                }
            },
            None => 0,
        }
    }
}

impl Drop for FaceTracker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
