//! Head pose estimation and overlay anchoring for real-time eyewear try-on.
//!
//! A detector thread turns camera frames into a handful of facial anchors
//! (eyes, nose tip, ear contour). The render loop maps those anchors into
//! the mirrored, aspect-filled viewport, recovers a coarse head pose from
//! their geometry and poses an overlay root holding an invisible head proxy
//! and the selected eyewear model.
//!
//! The pipeline per detection:
//! 1. Detector backend (face mesh or Haar cascades) reports raw anchors
//! 2. Coordinate mapping into render space
//! 3. Pose estimation from the anchor geometry
//! 4. Optional smoothing
//! 5. One-shot calibration of a freshly attached accessory
//!
//! # Examples
//!
//! ```
//! use head_pose_overlay::{
//!     coordinate_mapping::CoordinateMapper,
//!     pose_estimation::estimate_pose,
//!     types::{RawAnchors, RawPoint, VideoSize, Viewport},
//! };
//!
//! let viewport = Viewport::new(1280.0, 720.0);
//! let mapper = CoordinateMapper::new(VideoSize::new(640.0, 480.0), viewport);
//!
//! let raw = RawAnchors::new(
//!     RawPoint::new(280.0, 200.0),
//!     RawPoint::new(360.0, 200.0),
//!     RawPoint::new(320.0, 240.0),
//! );
//! let pose = estimate_pose(&mapper.map_anchors(&raw), viewport);
//!
//! // Nose straight below the eye center: no yaw
//! assert!(pose.rotation.yaw.abs() < 1e-9);
//! // No ear anchors: default scale
//! assert_eq!(pose.scale, 1.0);
//! ```
//!
//! ## Smoothing
//!
//! ```
//! use head_pose_overlay::filters::create_filter;
//!
//! # fn main() -> head_pose_overlay::Result<()> {
//! let filter = create_filter("exponential:0.3")?;
//! assert_eq!(filter.name(), "ExponentialFilter");
//! # Ok(())
//! # }
//! ```

/// Points, anchor sets, frames and viewport geometry
pub mod types;

/// Mirrored aspect-fill mapping from detector to render space
pub mod coordinate_mapping;

/// Head pose recovery from anchor geometry
pub mod pose_estimation;

/// Pose smoothing filters
pub mod filters;

/// Detector backend trait and selection
pub mod detector;

/// Face-mesh landmark detector
pub mod landmark_detector;

/// ONNX face-mesh model
#[cfg(feature = "onnx")]
pub mod mark_detection;

/// Haar cascade face and eye detector
pub mod cascade_detector;

/// Camera and image-sequence frame sources
pub mod frame_source;

/// Latest-wins detection handoff
pub mod mailbox;

/// Detector thread
pub mod detector_worker;

/// Render-side mapping, estimation and smoothing
pub mod pose_pipeline;

/// Scene graph: nodes, meshes, transforms, bounds
pub mod scene;

/// Overlay asset loading and attachment
pub mod asset_manager;

/// Accessory fit calibration
pub mod calibration;

/// User-facing status messages
pub mod status;

/// Rendering backends
pub mod renderer;

/// Display-paced render loop
pub mod render_loop;

/// Try-on session
pub mod app;

/// Utility functions for angles, casts and image conversion
pub mod utils;

/// Error types and result handling
pub mod error;

/// Constants used throughout the engine
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
