//! Configuration management for the try-on engine

use crate::{
    constants::{
        CALIBRATION_MARGIN, CALIBRATION_OFFSET_Y, DEFAULT_CASCADE_MIN_NEIGHBORS, DEFAULT_CASCADE_SCALE_FACTOR,
        DEFAULT_FPS, DEFAULT_MEDIAN_WINDOW, DEFAULT_MIN_DETECTION_CONFIDENCE, DEFAULT_MIN_TRACKING_CONFIDENCE,
        DEFAULT_MOVING_AVERAGE_WINDOW, DEFAULT_REFRESH_RATE, DEFAULT_SCALE, DEFAULT_SMOOTHING_BLEND,
        DEFAULT_VIDEO_HEIGHT, DEFAULT_VIDEO_WIDTH, DEPTH_BASE, DEPTH_NOSE_GAIN, DEPTH_SCALE, HEAD_PROXY_OPACITY,
        PITCH_TILT, REFERENCE_FACE_WIDTH, SCALE_MAX, SCALE_MIN, YAW_LATERAL_GAIN,
    },
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera configuration
    pub camera: CameraConfig,

    /// Detector backend configuration
    pub detector: DetectorConfig,

    /// Pose estimation constants
    pub pose: PoseConfig,

    /// Accessory calibration constants
    pub calibration: CalibrationConfig,

    /// Pose smoothing configuration
    pub smoothing: SmoothingConfig,

    /// Render loop configuration
    pub render: RenderConfig,

    /// Overlay asset sources
    pub assets: AssetConfig,
}

/// Camera capture parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera device index
    pub index: i32,

    /// Requested capture width
    pub width: u32,

    /// Requested capture height
    pub height: u32,

    /// Requested capture rate; the detector never runs faster than this
    pub fps: f64,

    /// Replay a directory of images instead of opening a camera
    pub frames_dir: Option<PathBuf>,

    /// Restart the replay after the last image
    pub loop_frames: bool,
}

/// Which detector backend drives the pose pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Dense face-mesh landmarks
    Landmark,
    /// Haar cascade face and eye boxes
    Cascade,
}

impl std::str::FromStr for DetectorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "landmark" | "landmarks" | "mesh" => Ok(Self::Landmark),
            "cascade" | "haar" => Ok(Self::Cascade),
            other => Err(Error::ConfigError(format!("Unknown detector backend: {other}"))),
        }
    }
}

/// Detector backend parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Backend selected at startup
    pub backend: DetectorKind,

    /// Confidence needed to report a face when none was tracked (0.0-1.0)
    pub min_detection_confidence: f32,

    /// Confidence needed to keep tracking a face (0.0-1.0)
    pub min_tracking_confidence: f32,

    /// Path to the face-mesh ONNX model
    pub landmark_model: PathBuf,

    /// Path to the frontal face Haar cascade
    pub face_cascade: PathBuf,

    /// Path to the eye Haar cascade
    pub eye_cascade: PathBuf,

    /// Cascade pyramid scale step
    pub cascade_scale_factor: f64,

    /// Cascade neighbour count needed to keep a detection
    pub cascade_min_neighbors: i32,
}

/// Pose estimation constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Ear-to-ear width in render pixels that maps to scale 1.0
    pub reference_face_width: f64,

    /// Lateral shift of the overlay per radian of yaw
    pub yaw_lateral_gain: f64,

    /// Depth proxy: z = depth_scale * (depth_base + nose_z * depth_nose_gain)
    pub depth_scale: f64,
    pub depth_base: f64,
    pub depth_nose_gain: f64,

    /// Scale clamp range
    pub scale_min: f64,
    pub scale_max: f64,

    /// Scale used when ear anchors are missing
    pub default_scale: f64,
}

/// Accessory calibration constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Overshoot of the accessory width over the eye distance
    pub margin: f64,

    /// Vertical offset of a calibrated accessory within the overlay root
    pub offset_y: f64,
}

/// Pose smoothing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Filter type: none, exponential, moving_average, median
    pub filter: String,

    /// Exponential filter blend factor
    pub blend: f64,

    /// Moving average window size
    pub moving_average_window: usize,

    /// Median filter window size
    pub median_window: usize,
}

/// What the overlay does while no face is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LostFacePolicy {
    /// Keep the overlay at the last known pose
    Hold,
    /// Hide the overlay until the face is found again
    Hide,
}

/// Render loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Display refresh rate pacing the render loop
    pub refresh_rate: f64,

    /// Window width
    pub window_width: u32,

    /// Window height
    pub window_height: u32,

    /// Forward tilt added to the pitch when posing the overlay
    pub pitch_tilt: f64,

    /// Overlay behaviour on detection misses
    pub on_face_lost: LostFacePolicy,

    /// Opacity of the head proxy materials (kept below 1)
    pub head_proxy_opacity: f32,

    /// Render without a window
    pub headless: bool,
}

/// One accessory variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessoryConfig {
    /// Stable identifier used on the command line
    pub id: String,

    /// Display name used in status messages
    pub name: String,

    /// Asset descriptor path
    pub model: PathBuf,

    /// Frame tint (RGB) applied on load
    #[serde(default)]
    pub color: Option<[u8; 3]>,
}

/// Overlay asset sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Head proxy asset descriptor
    pub head_proxy: PathBuf,

    /// Accessory variants
    pub accessories: Vec<AccessoryConfig>,

    /// Accessory attached when AR mode starts
    pub initial_accessory: Option<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: DEFAULT_VIDEO_WIDTH,
            height: DEFAULT_VIDEO_HEIGHT,
            fps: DEFAULT_FPS,
            frames_dir: None,
            loop_frames: false,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: DetectorKind::Landmark,
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
            min_tracking_confidence: DEFAULT_MIN_TRACKING_CONFIDENCE,
            landmark_model: PathBuf::from("assets/face_mesh.onnx"),
            face_cascade: PathBuf::from("assets/haarcascade_frontalface_default.xml"),
            eye_cascade: PathBuf::from("assets/haarcascade_eye.xml"),
            cascade_scale_factor: DEFAULT_CASCADE_SCALE_FACTOR,
            cascade_min_neighbors: DEFAULT_CASCADE_MIN_NEIGHBORS,
        }
    }
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            reference_face_width: REFERENCE_FACE_WIDTH,
            yaw_lateral_gain: YAW_LATERAL_GAIN,
            depth_scale: DEPTH_SCALE,
            depth_base: DEPTH_BASE,
            depth_nose_gain: DEPTH_NOSE_GAIN,
            scale_min: SCALE_MIN,
            scale_max: SCALE_MAX,
            default_scale: DEFAULT_SCALE,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            margin: CALIBRATION_MARGIN,
            offset_y: CALIBRATION_OFFSET_Y,
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            filter: "exponential".to_string(),
            blend: DEFAULT_SMOOTHING_BLEND,
            moving_average_window: DEFAULT_MOVING_AVERAGE_WINDOW,
            median_window: DEFAULT_MEDIAN_WINDOW,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            refresh_rate: DEFAULT_REFRESH_RATE,
            window_width: 1280,
            window_height: 720,
            pitch_tilt: PITCH_TILT,
            on_face_lost: LostFacePolicy::Hold,
            head_proxy_opacity: HEAD_PROXY_OPACITY,
            headless: false,
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        let variant = |id: &str, name: &str, color: [u8; 3]| AccessoryConfig {
            id: id.to_string(),
            name: name.to_string(),
            model: PathBuf::from("assets/glasses.yaml"),
            color: Some(color),
        };
        Self {
            head_proxy: PathBuf::from("assets/head.yaml"),
            accessories: vec![
                variant("classic", "Classic Black", [20, 20, 20]),
                variant("blue", "Blue Frame", [30, 80, 200]),
                variant("red", "Red Frame", [200, 30, 30]),
                variant("gold", "Gold Frame", [212, 175, 55]),
                variant("silver", "Silver Frame", [192, 192, 192]),
            ],
            initial_accessory: Some("classic".to_string()),
        }
    }
}

impl AssetConfig {
    /// Look up an accessory variant by id
    #[must_use]
    pub fn accessory(&self, id: &str) -> Option<&AccessoryConfig> {
        self.accessories.iter().find(|a| a.id == id)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Create the pose smoothing filter from configuration
    pub fn create_filter(&self) -> Result<Box<dyn crate::filters::PoseFilter>> {
        use crate::filters::{
            create_filter, exponential::ExponentialFilter, median::MedianFilter, moving_average::MovingAverageFilter,
        };

        let smoothing = &self.smoothing;
        match smoothing.filter.as_str() {
            "exponential" if smoothing.blend > 0.0 && smoothing.blend <= 1.0 => {
                Ok(Box::new(ExponentialFilter::new(smoothing.blend)))
            }
            "moving_average" if smoothing.moving_average_window > 0 => {
                Ok(Box::new(MovingAverageFilter::new(smoothing.moving_average_window)))
            }
            "median" if smoothing.median_window % 2 == 1 => Ok(Box::new(MedianFilter::new(smoothing.median_window))),
            "exponential" | "moving_average" | "median" => Err(Error::ConfigError(format!(
                "Invalid parameters for {} smoothing",
                smoothing.filter
            ))),
            spec => create_filter(spec),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let detector = &self.detector;
        if !(0.0..=1.0).contains(&detector.min_detection_confidence) {
            return Err(Error::ConfigError(
                "Detection confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&detector.min_tracking_confidence) {
            return Err(Error::ConfigError(
                "Tracking confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if detector.cascade_scale_factor <= 1.0 {
            return Err(Error::ConfigError(
                "Cascade scale factor must be greater than 1.0".to_string(),
            ));
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::ConfigError("Camera size must be non-zero".to_string()));
        }
        if self.camera.fps <= 0.0 {
            return Err(Error::ConfigError("Camera FPS must be greater than 0".to_string()));
        }

        let pose = &self.pose;
        if pose.reference_face_width <= 0.0 {
            return Err(Error::ConfigError(
                "Reference face width must be greater than 0".to_string(),
            ));
        }
        if !(pose.scale_min > 0.0 && pose.scale_min < pose.scale_max) {
            return Err(Error::ConfigError(
                "Scale range must satisfy 0 < scale_min < scale_max".to_string(),
            ));
        }
        if !(pose.scale_min..=pose.scale_max).contains(&pose.default_scale) {
            return Err(Error::ConfigError(
                "Default scale must lie within the scale range".to_string(),
            ));
        }

        if self.calibration.margin <= 0.0 {
            return Err(Error::ConfigError("Calibration margin must be greater than 0".to_string()));
        }

        self.create_filter()?;

        if self.render.refresh_rate <= 0.0 {
            return Err(Error::ConfigError("Refresh rate must be greater than 0".to_string()));
        }
        if self.render.window_width == 0 || self.render.window_height == 0 {
            return Err(Error::ConfigError("Window size must be non-zero".to_string()));
        }
        if !(0.0..1.0).contains(&self.render.head_proxy_opacity) {
            return Err(Error::ConfigError(
                "Head proxy opacity must be in [0.0, 1.0)".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        for accessory in &self.assets.accessories {
            if !ids.insert(accessory.id.as_str()) {
                return Err(Error::ConfigError(format!("Duplicate accessory id: {}", accessory.id)));
            }
        }
        if let Some(initial) = &self.assets.initial_accessory {
            if self.assets.accessory(initial).is_none() {
                return Err(Error::ConfigError(format!("Unknown initial accessory: {initial}")));
            }
        }

        Ok(())
    }

    /// Check that the model files of the selected backend exist
    pub fn validate_model_paths(&self) -> Result<()> {
        let required: Vec<&Path> = match self.detector.backend {
            DetectorKind::Landmark => vec![&self.detector.landmark_model],
            DetectorKind::Cascade => vec![&self.detector.face_cascade, &self.detector.eye_cascade],
        };
        for path in required {
            if !path.exists() {
                return Err(Error::ConfigError(format!("Detector model not found: {}", path.display())));
            }
        }
        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head Pose Overlay Configuration

camera:
  index: 0
  width: 640
  height: 480
  fps: 30.0
  loop_frames: false

detector:
  backend: landmark
  min_detection_confidence: 0.3
  min_tracking_confidence: 0.3
  landmark_model: "assets/face_mesh.onnx"
  face_cascade: "assets/haarcascade_frontalface_default.xml"
  eye_cascade: "assets/haarcascade_eye.xml"
  cascade_scale_factor: 1.1
  cascade_min_neighbors: 3

pose:
  reference_face_width: 240.0
  yaw_lateral_gain: 190.0
  depth_scale: 0.1
  depth_base: 0.02
  depth_nose_gain: 0.05
  scale_min: 0.1
  scale_max: 2.2
  default_scale: 1.0

calibration:
  margin: 1.2
  offset_y: -5.0

smoothing:
  filter: "exponential"
  blend: 0.1
  moving_average_window: 5
  median_window: 5

render:
  refresh_rate: 60.0
  window_width: 1280
  window_height: 720
  pitch_tilt: 0.4487989505128276
  on_face_lost: hold
  head_proxy_opacity: 0.0
  headless: false

assets:
  head_proxy: "assets/head.yaml"
  initial_accessory: "classic"
  accessories:
    - id: classic
      name: "Classic Black"
      model: "assets/glasses.yaml"
      color: [20, 20, 20]
    - id: blue
      name: "Blue Frame"
      model: "assets/glasses.yaml"
      color: [30, 80, 200]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.detector.backend, DetectorKind::Landmark);
        assert_eq!(config.render.on_face_lost, LostFacePolicy::Hold);
        assert_eq!(config.assets.accessories.len(), 2);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("detector:\n  backend: cascade\n").unwrap();
        assert_eq!(config.detector.backend, DetectorKind::Cascade);
        assert_eq!(config.pose, PoseConfig::default());
        assert_eq!(config.detector.cascade_min_neighbors, 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.pose.scale_min = 3.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.smoothing.filter = "median".to_string();
        config.smoothing.median_window = 4;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.render.head_proxy_opacity = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.assets.initial_accessory = Some("missing".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_detector_kind_from_str() {
        assert_eq!("Cascade".parse::<DetectorKind>().unwrap(), DetectorKind::Cascade);
        assert_eq!("landmark".parse::<DetectorKind>().unwrap(), DetectorKind::Landmark);
        assert!("sonar".parse::<DetectorKind>().is_err());
    }
}
