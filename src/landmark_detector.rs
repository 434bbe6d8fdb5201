//! Dense face-mesh landmark backend.

use crate::{
    config::DetectorConfig,
    constants::{LANDMARK_LEFT_EAR, LANDMARK_LEFT_EYE, LANDMARK_NOSE, LANDMARK_RIGHT_EAR, LANDMARK_RIGHT_EYE},
    detector::{DetectionResult, DetectorBackend},
    types::{Frame, RawAnchors, RawPoint},
    Error, Result,
};
use image::RgbImage;

/// One face mesh in normalized image coordinates.
///
/// `x` and `y` are in `[0, 1]` relative to the frame; `z` is the model's
/// relative depth in the same unit as `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMesh {
    pub points: Vec<RawPoint>,
    /// Face presence score in `[0, 1]`
    pub confidence: f32,
}

/// A model that produces a dense face mesh from an RGB frame
pub trait FaceMeshModel: Send {
    fn name(&self) -> &str;

    /// Run the model on a frame; `None` means no face candidate at all.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn infer(&mut self, image: &RgbImage) -> Result<Option<FaceMesh>>;
}

/// Detector backend that reads anchors from fixed face-mesh indices
pub struct LandmarkDetector {
    model: Box<dyn FaceMeshModel>,
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
    tracking: bool,
}

impl LandmarkDetector {
    #[must_use]
    pub fn new(model: Box<dyn FaceMeshModel>, min_detection_confidence: f32, min_tracking_confidence: f32) -> Self {
        log::info!(
            "Initializing LandmarkDetector ({}) with detection {min_detection_confidence}, tracking {min_tracking_confidence}",
            model.name()
        );
        Self {
            model,
            min_detection_confidence,
            min_tracking_confidence,
            tracking: false,
        }
    }

    /// Build the detector around the ONNX face-mesh model named in the config.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded, or the crate was built
    /// without the `onnx` feature.
    #[cfg(feature = "onnx")]
    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        let model = crate::mark_detection::MarkDetector::new(&config.landmark_model)?;
        Ok(Self::new(
            Box::new(model),
            config.min_detection_confidence,
            config.min_tracking_confidence,
        ))
    }

    /// # Errors
    ///
    /// Always fails: the landmark backend needs the `onnx` feature.
    #[cfg(not(feature = "onnx"))]
    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        Err(Error::ModelError(format!(
            "Landmark backend ({}) requires the `onnx` feature",
            config.landmark_model.display()
        )))
    }

    /// Whether a face was reported on the previous cycle
    #[must_use]
    pub const fn is_tracking(&self) -> bool {
        self.tracking
    }

    fn threshold(&self) -> f32 {
        if self.tracking {
            self.min_tracking_confidence
        } else {
            self.min_detection_confidence
        }
    }

    /// Pick the anchor landmarks out of a mesh and scale them to frame pixels.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh is too small to contain the anchor indices.
    pub fn anchors_from_mesh(mesh: &FaceMesh, width: f64, height: f64) -> Result<RawAnchors> {
        let point = |index: usize| -> Result<RawPoint> {
            let p = mesh.points.get(index).ok_or_else(|| {
                Error::ModelValidationError(format!(
                    "Face mesh has {} points, landmark {index} is missing",
                    mesh.points.len()
                ))
            })?;
            Ok(RawPoint {
                x: p.x * width,
                y: p.y * height,
                z: p.z,
            })
        };

        Ok(RawAnchors::new(point(LANDMARK_LEFT_EYE)?, point(LANDMARK_RIGHT_EYE)?, point(LANDMARK_NOSE)?)
            .with_ears(point(LANDMARK_LEFT_EAR)?, point(LANDMARK_RIGHT_EAR)?))
    }
}

impl DetectorBackend for LandmarkDetector {
    fn name(&self) -> &str {
        "landmark"
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult> {
        let Some(mesh) = self.model.infer(&frame.image)? else {
            self.tracking = false;
            return Ok(DetectionResult::NotFound);
        };

        if mesh.confidence < self.threshold() {
            log::debug!(
                "Face confidence {:.2} below threshold {:.2} (tracking: {})",
                mesh.confidence,
                self.threshold(),
                self.tracking
            );
            self.tracking = false;
            return Ok(DetectionResult::NotFound);
        }

        let size = frame.size();
        let result = DetectionResult::from_anchors(Self::anchors_from_mesh(&mesh, size.width, size.height)?);
        self.tracking = result.is_found();
        Ok(result)
    }
}
