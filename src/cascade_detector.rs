//! Haar-cascade style backend: coarse face and eye boxes.
//!
//! The eye boxes give the two eye anchors directly. The nose is taken as the
//! face-box center and the ears as the face-box edges at eye height, which is
//! coarse but keeps roll and scale recovery working on this backend too.

use crate::{
    config::DetectorConfig,
    detector::{DetectionResult, DetectorBackend},
    types::{BoxRegion, Frame, RawAnchors, RawPoint},
    utils::safe_cast::f64_to_u32_clamp,
    Result,
};
use image::GrayImage;

/// Face and eye box detector
pub trait CascadeModel: Send {
    fn name(&self) -> &str;

    /// Face boxes in frame pixels.
    ///
    /// # Errors
    ///
    /// Returns an error if the classifier fails.
    fn detect_faces(&mut self, gray: &GrayImage) -> Result<Vec<BoxRegion>>;

    /// Eye boxes relative to the given face crop.
    ///
    /// # Errors
    ///
    /// Returns an error if the classifier fails.
    fn detect_eyes(&mut self, face: &GrayImage) -> Result<Vec<BoxRegion>>;
}

/// Detector backend driven by a [`CascadeModel`]
pub struct CascadeDetector {
    model: Box<dyn CascadeModel>,
}

impl CascadeDetector {
    #[must_use]
    pub fn new(model: Box<dyn CascadeModel>) -> Self {
        log::info!("Initializing CascadeDetector ({})", model.name());
        Self { model }
    }

    /// Load the face and eye cascades named in the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a cascade file cannot be loaded.
    #[cfg(feature = "opencv")]
    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        Ok(Self::new(Box::new(haar::HaarCascade::from_config(config)?)))
    }

    /// # Errors
    ///
    /// Always fails: the cascade backend needs the `opencv` feature.
    #[cfg(not(feature = "opencv"))]
    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        Err(crate::Error::ModelError(format!(
            "Cascade backend ({}) requires the `opencv` feature",
            config.face_cascade.display()
        )))
    }

    /// Build anchors from a face box and frame-space eye boxes.
    ///
    /// Returns `None` with fewer than two eyes. With more, the two largest win.
    #[must_use]
    pub fn anchors_from_boxes(face: &BoxRegion, eyes: &[BoxRegion]) -> Option<RawAnchors> {
        if eyes.len() < 2 {
            return None;
        }

        let mut eyes = eyes.to_vec();
        eyes.sort_by(|a, b| b.area().total_cmp(&a.area()));
        eyes.truncate(2);
        eyes.sort_by(|a, b| a.x.total_cmp(&b.x));

        let left_eye = eyes[0].center();
        let right_eye = eyes[1].center();
        let eye_y = (left_eye.y + right_eye.y) / 2.0;

        Some(
            RawAnchors::new(left_eye, right_eye, face.center())
                .with_ears(RawPoint::new(face.x, eye_y), RawPoint::new(face.x + face.width, eye_y)),
        )
    }

    /// Cut the face box out of the frame, clipped to the image.
    ///
    /// Returns the crop with its actual origin and size in frame pixels.
    fn crop(gray: &GrayImage, face: &BoxRegion) -> (GrayImage, BoxRegion) {
        let left = f64_to_u32_clamp(face.x, 0, gray.width());
        let top = f64_to_u32_clamp(face.y, 0, gray.height());
        let right = f64_to_u32_clamp(face.x + face.width, left, gray.width());
        let bottom = f64_to_u32_clamp(face.y + face.height, top, gray.height());
        let (width, height) = (right - left, bottom - top);

        let region = BoxRegion::new(f64::from(left), f64::from(top), f64::from(width), f64::from(height));
        (image::imageops::crop_imm(gray, left, top, width, height).to_image(), region)
    }
}

impl DetectorBackend for CascadeDetector {
    fn name(&self) -> &str {
        "cascade"
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult> {
        let gray = image::imageops::grayscale(&frame.image);

        let faces = self.model.detect_faces(&gray)?;
        let Some(face) = faces.into_iter().max_by(|a, b| a.area().total_cmp(&b.area())) else {
            return Ok(DetectionResult::NotFound);
        };

        let (roi, origin) = Self::crop(&gray, &face);
        let eyes: Vec<BoxRegion> = self
            .model
            .detect_eyes(&roi)?
            .iter()
            .map(|eye| eye.offset_by(&origin))
            .collect();

        match Self::anchors_from_boxes(&face, &eyes) {
            Some(anchors) => Ok(DetectionResult::from_anchors(anchors)),
            None => {
                log::debug!("Face found but only {} eye(s) detected", eyes.len());
                Ok(DetectionResult::NotFound)
            }
        }
    }
}

#[cfg(feature = "opencv")]
mod haar {
    use super::CascadeModel;
    use crate::{
        config::DetectorConfig,
        types::BoxRegion,
        utils::image_conversion::gray_image_to_mat,
        Error, Result,
    };
    use image::GrayImage;
    use opencv::{
        core::{Rect, Size, Vector},
        objdetect::CascadeClassifier,
        prelude::*,
    };
    use std::path::Path;

    /// `OpenCV` Haar cascades for faces and eyes
    pub struct HaarCascade {
        face: CascadeClassifier,
        eye: CascadeClassifier,
        scale_factor: f64,
        min_neighbors: i32,
    }

    fn load(path: &Path) -> Result<CascadeClassifier> {
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::InvalidInput(format!("Non UTF-8 cascade path: {}", path.display())))?;
        let classifier = CascadeClassifier::new(path_str)?;
        if classifier.empty()? {
            return Err(Error::ModelError(format!("Failed to load cascade: {}", path.display())));
        }
        Ok(classifier)
    }

    fn run(classifier: &mut CascadeClassifier, gray: &GrayImage, scale_factor: f64, min_neighbors: i32) -> Result<Vec<BoxRegion>> {
        let mat = gray_image_to_mat(gray)?;
        let mut found = Vector::<Rect>::new();
        classifier.detect_multi_scale(
            &mat,
            &mut found,
            scale_factor,
            min_neighbors,
            0,
            Size::default(),
            Size::default(),
        )?;
        Ok(found
            .iter()
            .map(|r| BoxRegion::new(f64::from(r.x), f64::from(r.y), f64::from(r.width), f64::from(r.height)))
            .collect())
    }

    impl HaarCascade {
        pub fn from_config(config: &DetectorConfig) -> Result<Self> {
            log::info!(
                "Loading Haar cascades: {} / {}",
                config.face_cascade.display(),
                config.eye_cascade.display()
            );
            Ok(Self {
                face: load(&config.face_cascade)?,
                eye: load(&config.eye_cascade)?,
                scale_factor: config.cascade_scale_factor,
                min_neighbors: config.cascade_min_neighbors,
            })
        }
    }

    impl CascadeModel for HaarCascade {
        fn name(&self) -> &str {
            "haar"
        }

        fn detect_faces(&mut self, gray: &GrayImage) -> Result<Vec<BoxRegion>> {
            run(&mut self.face, gray, self.scale_factor, self.min_neighbors)
        }

        fn detect_eyes(&mut self, face: &GrayImage) -> Result<Vec<BoxRegion>> {
            if face.width() == 0 || face.height() == 0 {
                return Ok(Vec::new());
            }
            run(&mut self.eye, face, self.scale_factor, self.min_neighbors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    struct FixedBoxes {
        faces: Vec<BoxRegion>,
        eyes: Vec<BoxRegion>,
        last_roi: Option<(u32, u32)>,
    }

    impl CascadeModel for FixedBoxes {
        fn name(&self) -> &str {
            "fixed"
        }

        fn detect_faces(&mut self, _gray: &GrayImage) -> Result<Vec<BoxRegion>> {
            Ok(self.faces.clone())
        }

        fn detect_eyes(&mut self, face: &GrayImage) -> Result<Vec<BoxRegion>> {
            self.last_roi = Some(face.dimensions());
            Ok(self.eyes.clone())
        }
    }

    fn detect(faces: Vec<BoxRegion>, eyes: Vec<BoxRegion>) -> DetectionResult {
        let mut detector = CascadeDetector::new(Box::new(FixedBoxes {
            faces,
            eyes,
            last_roi: None,
        }));
        detector.detect(&Frame::new(RgbImage::new(640, 480), 0)).unwrap()
    }

    #[test]
    fn test_eyes_offset_into_frame_space() {
        let face = BoxRegion::new(200.0, 100.0, 200.0, 200.0);
        let eyes = vec![
            BoxRegion::new(120.0, 60.0, 40.0, 30.0),
            BoxRegion::new(40.0, 60.0, 40.0, 30.0),
        ];
        let result = detect(vec![face], eyes);
        let anchors = result.anchors().unwrap();

        // lower x is the left eye regardless of detection order
        assert_eq!(anchors.left_eye, RawPoint::new(260.0, 175.0));
        assert_eq!(anchors.right_eye, RawPoint::new(340.0, 175.0));
        assert_eq!(anchors.nose, RawPoint::new(300.0, 200.0));
        let (left_ear, right_ear) = anchors.ears().unwrap();
        assert_eq!((left_ear.x, right_ear.x), (200.0, 400.0));
    }

    #[test]
    fn test_single_eye_is_not_found() {
        let face = BoxRegion::new(200.0, 100.0, 200.0, 200.0);
        let result = detect(vec![face], vec![BoxRegion::new(40.0, 60.0, 40.0, 30.0)]);
        assert_eq!(result, DetectionResult::NotFound);
    }

    #[test]
    fn test_no_face_is_not_found() {
        assert_eq!(detect(Vec::new(), Vec::new()), DetectionResult::NotFound);
    }

    #[test]
    fn test_largest_face_and_eyes_win() {
        let small = BoxRegion::new(0.0, 0.0, 50.0, 50.0);
        let large = BoxRegion::new(300.0, 200.0, 150.0, 150.0);
        let eyes = vec![
            BoxRegion::new(10.0, 40.0, 30.0, 20.0),
            BoxRegion::new(60.0, 90.0, 5.0, 5.0), // nostril false positive
            BoxRegion::new(100.0, 40.0, 30.0, 20.0),
        ];
        let result = detect(vec![small, large], eyes);
        let anchors = result.anchors().unwrap();
        assert_eq!(anchors.left_eye, RawPoint::new(325.0, 250.0));
        assert_eq!(anchors.right_eye, RawPoint::new(415.0, 250.0));
    }

    #[test]
    fn test_face_crop_clamped_to_frame() {
        let gray = GrayImage::new(640, 480);
        let (roi, origin) = CascadeDetector::crop(&gray, &BoxRegion::new(600.0, 400.0, 100.0, 100.0));
        assert_eq!(roi.dimensions(), (40, 80));
        assert_eq!(origin, BoxRegion::new(600.0, 400.0, 40.0, 80.0));

        let (roi, origin) = CascadeDetector::crop(&gray, &BoxRegion::new(-20.0, -10.0, 100.0, 100.0));
        assert_eq!(roi.dimensions(), (80, 90));
        assert_eq!(origin, BoxRegion::new(0.0, 0.0, 80.0, 90.0));
    }

    #[test]
    fn test_eyes_offset_by_clipped_origin() {
        // Face box hangs off the top-left corner; eye boxes are relative to the clipped crop
        let face = BoxRegion::new(-20.0, -10.0, 200.0, 200.0);
        let eyes = vec![
            BoxRegion::new(40.0, 60.0, 40.0, 30.0),
            BoxRegion::new(120.0, 60.0, 40.0, 30.0),
        ];
        let result = detect(vec![face], eyes);
        let anchors = result.anchors().unwrap();
        assert_eq!(anchors.left_eye, RawPoint::new(60.0, 75.0));
        assert_eq!(anchors.right_eye, RawPoint::new(140.0, 75.0));
    }
}
