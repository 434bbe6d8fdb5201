//! Detector backend abstraction.
//!
//! A backend turns one camera frame into either a full anchor set in the
//! frame's own pixel space or `NotFound`. Backends never see render-space
//! coordinates; mapping happens downstream in the pose pipeline.

use crate::{
    cascade_detector::CascadeDetector,
    config::{DetectorConfig, DetectorKind},
    landmark_detector::LandmarkDetector,
    types::{Frame, RawAnchors},
    Result,
};

/// Outcome of one detection cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionResult {
    /// A face was found; anchors are in detector pixel space
    Found(RawAnchors),
    /// No usable face this cycle
    NotFound,
}

impl DetectionResult {
    /// Wrap anchors, demoting any set with a non-finite coordinate to `NotFound`
    #[must_use]
    pub fn from_anchors(anchors: RawAnchors) -> Self {
        if anchors.is_finite() {
            Self::Found(anchors)
        } else {
            log::debug!("Discarding detection with non-finite anchors");
            Self::NotFound
        }
    }

    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    #[must_use]
    pub const fn anchors(&self) -> Option<&RawAnchors> {
        match self {
            Self::Found(anchors) => Some(anchors),
            Self::NotFound => None,
        }
    }
}

/// A face/eye detector that runs on the detector worker thread
pub trait DetectorBackend: Send {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Detect anchors in a frame.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying model fails on this frame; the
    /// worker logs it and treats the cycle as `NotFound`.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult>;
}

impl<T: DetectorBackend + ?Sized> DetectorBackend for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult> {
        (**self).detect(frame)
    }
}

/// Build the backend selected in the configuration.
///
/// # Errors
///
/// Returns an error if the model files cannot be loaded or the backend was
/// compiled out (missing `onnx` / `opencv` feature).
pub fn create_backend(config: &DetectorConfig) -> Result<Box<dyn DetectorBackend>> {
    log::info!("Creating {:?} detector backend", config.backend);
    match config.backend {
        DetectorKind::Landmark => Ok(Box::new(LandmarkDetector::from_config(config)?)),
        DetectorKind::Cascade => Ok(Box::new(CascadeDetector::from_config(config)?)),
    }
}
