//! Error types for the overlay anchoring engine.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// `ONNX` Runtime inference failed
    #[cfg(feature = "onnx")]
    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::OrtError),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or processing failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Camera stream could not be opened (permission denied, no device)
    #[error("Camera error: {0}")]
    Camera(String),

    /// No camera support in this build or on this device
    #[error("Camera not supported: {0}")]
    CameraUnsupported(String),

    /// Detector backend failed while processing a frame
    #[error("Detector error: {0}")]
    Detector(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model loading or inference error
    #[error("Model error: {0}")]
    ModelError(String),

    /// Model output has the wrong shape (too few landmarks, etc.)
    #[error("Model validation error: {0}")]
    ModelValidationError(String),

    /// Overlay asset could not be loaded
    #[error("Failed to load {name}: {reason}")]
    AssetLoad {
        /// Asset name as shown in the status line
        name: String,
        /// Underlying cause
        reason: String,
    },

    /// Filter initialization error
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Renderer failed to present a frame
    #[error("Render error: {0}")]
    Render(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic I/O error with description
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Application-specific error type (alias for main Error type)
pub type AppError = Error;

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
