use crate::{
    constants::FACE_MESH_POINTS,
    landmark_detector::{FaceMesh, FaceMeshModel},
    types::RawPoint,
    Error, Result,
};
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array4, CowArray};
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Face-mesh model input size (square)
const FACE_MESH_INPUT_SIZE: u32 = 192;

/// Coordinates per mesh point (x, y, z)
const COORDS_PER_POINT: usize = 3;

/// Face-mesh landmark model using `ONNX` Runtime.
///
/// Expects a model with a single NHWC `1x192x192x3` float input in `[0, 1]`
/// and two outputs: the flattened mesh (`468 * 3` values in input pixels) and
/// a face-presence logit.
pub struct MarkDetector {
    session: Session,
    input_size: u32,
}

impl MarkDetector {
    /// Create a new landmark detector from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ONNX model file cannot be loaded
    /// - The model does not expose an input and two outputs
    /// - The ONNX runtime environment cannot be created
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!("Initializing MarkDetector with model: {}", model_path.as_ref().display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("face_mesh")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        if session.inputs.is_empty() {
            return Err(Error::ModelValidationError("Model has no inputs".to_string()));
        }
        if session.outputs.len() < 2 {
            return Err(Error::ModelValidationError(format!(
                "Face mesh model needs landmark and score outputs, found {}",
                session.outputs.len()
            )));
        }

        Ok(Self {
            session,
            input_size: FACE_MESH_INPUT_SIZE,
        })
    }

    /// Resize to the model input and normalize to `[0, 1]`
    fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let resized = image::imageops::resize(image, self.input_size, self.input_size, FilterType::Triangle);
        let size = self.input_size as usize;
        let data: Vec<f32> = resized.into_raw().into_iter().map(|v| f32::from(v) / 255.0).collect();

        Array4::from_shape_vec((1, size, size, 3), data)
            .map_err(|e| Error::ModelError(format!("Failed to create input tensor: {e}")))
    }

    /// Run inference, returning the flattened mesh and the raw face logit
    fn forward(&self, input: Array4<f32>) -> Result<(Vec<f32>, f32)> {
        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;
        let mut outputs = outputs.into_iter();

        let mesh_output = outputs
            .next()
            .ok_or_else(|| Error::ModelValidationError("No landmark output from model".to_string()))?;
        let mesh_tensor = mesh_output.try_extract::<f32>()?;
        let mesh: Vec<f32> = mesh_tensor.view().iter().copied().collect();

        let score_output = outputs
            .next()
            .ok_or_else(|| Error::ModelValidationError("No score output from model".to_string()))?;
        let score_tensor = score_output.try_extract::<f32>()?;
        let logit = score_tensor
            .view()
            .iter()
            .next()
            .copied()
            .ok_or_else(|| Error::ModelValidationError("Empty score output".to_string()))?;

        Ok((mesh, logit))
    }

    /// Convert model output to a normalized mesh
    fn postprocess(&self, mesh: &[f32], logit: f32) -> Result<FaceMesh> {
        if mesh.len() < FACE_MESH_POINTS * COORDS_PER_POINT {
            return Err(Error::ModelValidationError(format!(
                "Expected {} mesh values, got {}",
                FACE_MESH_POINTS * COORDS_PER_POINT,
                mesh.len()
            )));
        }

        let size = f64::from(self.input_size);
        let points = mesh
            .chunks_exact(COORDS_PER_POINT)
            .take(FACE_MESH_POINTS)
            .map(|p| RawPoint::with_depth(f64::from(p[0]) / size, f64::from(p[1]) / size, f64::from(p[2]) / size))
            .collect();

        Ok(FaceMesh {
            points,
            confidence: sigmoid(logit),
        })
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl FaceMeshModel for MarkDetector {
    fn name(&self) -> &str {
        "onnx-face-mesh"
    }

    fn infer(&mut self, image: &RgbImage) -> Result<Option<FaceMesh>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(None);
        }
        let input = self.preprocess(image)?;
        let (mesh, logit) = self.forward(input)?;
        self.postprocess(&mesh, logit).map(Some)
    }
}
