//! Human-readable pipeline status.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fmt;

/// Pipeline state shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Initializing,
    LoadingHeadModel,
    ArInitialized,
    CameraStarted,
    CameraDenied,
    CameraUnsupported,
    /// Frame source failed for a reason other than permission; carries the error text
    SourceError(String),
    /// Detector backend could not be created; carries the error text
    DetectorError(String),
    HeadModelLoaded,
    HeadModelError,
    /// Accessory attached; carries its display name
    AccessoryLoaded(String),
    /// Accessory load failed; carries the error text
    AccessoryLoadFailed(String),
    TrackingFace,
    NoFaceDetected,
    SelectAccessory,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "Initializing..."),
            Self::LoadingHeadModel => write!(f, "AR Mode : Loading head model..."),
            Self::ArInitialized => write!(f, "AR initialized - Move face into view"),
            Self::CameraStarted => write!(f, "Camera started - Move face into view"),
            Self::CameraDenied => write!(f, "Camera access denied - Please allow camera permission"),
            Self::CameraUnsupported => write!(f, "Camera not supported on this device"),
            Self::SourceError(reason) => write!(f, "Error opening video source: {reason}"),
            Self::DetectorError(reason) => write!(f, "Error starting face detector: {reason}"),
            Self::HeadModelLoaded => write!(f, "Head model loaded"),
            Self::HeadModelError => write!(f, "Error loading head model"),
            Self::AccessoryLoaded(name) => write!(f, "Glasses loaded with color: {name}"),
            Self::AccessoryLoadFailed(reason) => write!(f, "Error loading glasses: {reason}"),
            Self::TrackingFace => write!(f, "Tracking face..."),
            Self::NoFaceDetected => write!(f, "No face detected"),
            Self::SelectAccessory => write!(f, "Select glasses to try on"),
        }
    }
}

/// Publishes status changes, dropping repeats of the current status
pub struct StatusReporter {
    current: Status,
    subscribers: Vec<Sender<Status>>,
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusReporter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: Status::Initializing,
            subscribers: Vec::new(),
        }
    }

    #[must_use]
    pub const fn current(&self) -> &Status {
        &self.current
    }

    /// Receive every future status change
    pub fn subscribe(&mut self) -> Receiver<Status> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Set the status; returns `false` if it was already current
    pub fn report(&mut self, status: Status) -> bool {
        if status == self.current {
            return false;
        }
        log::info!("Status: {status}");
        self.subscribers.retain(|tx| tx.send(status.clone()).is_ok());
        self.current = status;
        true
    }
}
