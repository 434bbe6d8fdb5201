//! Constants used throughout the engine

use std::f64::consts::PI;

/// Face-mesh landmark index of the eye on the image-left side
pub const LANDMARK_LEFT_EYE: usize = 33;
/// Face-mesh landmark index of the eye on the image-right side
pub const LANDMARK_RIGHT_EYE: usize = 263;
/// Face-mesh landmark index of the nose tip
pub const LANDMARK_NOSE: usize = 1;
/// Face-mesh landmark index of the image-left ear (cheek contour)
pub const LANDMARK_LEFT_EAR: usize = 234;
/// Face-mesh landmark index of the image-right ear (cheek contour)
pub const LANDMARK_RIGHT_EAR: usize = 454;

/// Number of points in a face mesh without iris refinement
pub const FACE_MESH_POINTS: usize = 468;

/// Default camera frame size
pub const DEFAULT_VIDEO_WIDTH: u32 = 640;
pub const DEFAULT_VIDEO_HEIGHT: u32 = 480;

/// Default camera frames per second
pub const DEFAULT_FPS: f64 = 30.0;

/// Default display refresh rate driving the render loop
pub const DEFAULT_REFRESH_RATE: f64 = 60.0;

/// Scale clamp bounds for the overlay root
pub const SCALE_MIN: f64 = 0.1;
pub const SCALE_MAX: f64 = 2.2;

/// Scale used when no ear anchors are available
pub const DEFAULT_SCALE: f64 = 1.0;

/// Ear-to-ear render-space width that maps to a scale of 1.0
pub const REFERENCE_FACE_WIDTH: f64 = 240.0;

/// Lateral shift per radian of yaw
pub const YAW_LATERAL_GAIN: f64 = 190.0;

/// Depth proxy terms: z = DEPTH_SCALE * (DEPTH_BASE + nose_z * DEPTH_NOSE_GAIN)
pub const DEPTH_SCALE: f64 = 0.1;
pub const DEPTH_BASE: f64 = 0.02;
pub const DEPTH_NOSE_GAIN: f64 = 0.05;

/// Forward tilt added to the pitch when posing the overlay root
pub const PITCH_TILT: f64 = PI / 7.0;

/// Overshoot applied when fitting the accessory width to the eye distance
pub const CALIBRATION_MARGIN: f64 = 1.2;

/// Vertical nudge of a calibrated accessory inside the overlay root
pub const CALIBRATION_OFFSET_Y: f64 = -5.0;

/// Default confidence gates for the landmark detector
pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f32 = 0.3;
pub const DEFAULT_MIN_TRACKING_CONFIDENCE: f32 = 0.3;

/// Default Haar cascade parameters
pub const DEFAULT_CASCADE_SCALE_FACTOR: f64 = 1.1;
pub const DEFAULT_CASCADE_MIN_NEIGHBORS: i32 = 3;

/// Default blend factor of the exponential pose smoother
pub const DEFAULT_SMOOTHING_BLEND: f64 = 0.1;

/// Default window sizes for the windowed pose filters
pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 5;
pub const DEFAULT_MEDIAN_WINDOW: usize = 5;

/// Mesh name fragments hidden on the head proxy
pub const HEAD_PROXY_HIDDEN_MESHES: [&str; 3] = ["glass", "spectacle", "spec"];

/// Opacity of the head proxy materials
pub const HEAD_PROXY_OPACITY: f32 = 0.0;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
