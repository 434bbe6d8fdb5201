//! Pose smoothing filters.
//!
//! Detector output jitters from frame to frame. These filters sit between the
//! pose estimator and the render loop and blend successive poses. Every filter
//! works on the seven pose channels (position xyz, yaw, pitch, roll, scale);
//! angle channels are unwrapped against the previous sample before filtering so
//! averaging never crosses the ±π seam, and wrapped again on output.

/// Exponential blending toward the newest pose
pub mod exponential;

/// Moving average filter for simple smoothing
pub mod moving_average;

/// Median filter for outlier rejection
pub mod median;

use crate::{
    constants::{DEFAULT_MEDIAN_WINDOW, DEFAULT_MOVING_AVERAGE_WINDOW, DEFAULT_SMOOTHING_BLEND},
    pose_estimation::{FacialPose, HeadRotation},
    utils::{unwrap_angle, wrap_angle},
    Error, Result,
};
use nalgebra::Vector3;

/// Number of filtered channels in a pose
pub const POSE_CHANNELS: usize = 7;

/// Channel indices of the angle components
const ANGLE_CHANNELS: [usize; 3] = [3, 4, 5];

/// Trait for all pose filters
pub trait PoseFilter: Send {
    /// Feed a new pose and get the smoothed one
    fn apply(&mut self, pose: FacialPose) -> FacialPose;

    /// Forget all history; the next pose passes through unchanged
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// Converts poses to continuous channel vectors and back
#[derive(Debug, Clone, Default)]
pub struct ChannelCodec {
    last_angles: Option<[f64; 3]>,
}

impl ChannelCodec {
    /// Split a pose into channels, unwrapping angles against the previous sample
    pub fn encode(&mut self, pose: &FacialPose) -> [f64; POSE_CHANNELS] {
        let mut channels = [
            pose.position.x,
            pose.position.y,
            pose.position.z,
            pose.rotation.yaw,
            pose.rotation.pitch,
            pose.rotation.roll,
            pose.scale,
        ];
        if let Some(last) = self.last_angles {
            for (slot, &channel) in ANGLE_CHANNELS.iter().enumerate() {
                channels[channel] = unwrap_angle(last[slot], channels[channel]);
            }
        }
        self.last_angles = Some([channels[3], channels[4], channels[5]]);
        channels
    }

    /// Rebuild a pose from filtered channels
    #[must_use]
    pub fn decode(channels: &[f64; POSE_CHANNELS]) -> FacialPose {
        FacialPose {
            position: Vector3::new(channels[0], channels[1], channels[2]),
            rotation: HeadRotation::new(wrap_angle(channels[3]), wrap_angle(channels[4]), wrap_angle(channels[5])),
            scale: channels[6],
        }
    }

    pub fn reset(&mut self) {
        self.last_angles = None;
    }
}

/// No-op filter that passes through values unchanged
pub struct NoFilter;

impl PoseFilter for NoFilter {
    fn apply(&mut self, pose: FacialPose) -> FacialPose {
        pose
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

fn parse_param<T: std::str::FromStr>(filter_type: &str, value: Option<&str>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::FilterError(format!("Invalid parameter '{raw}' for filter {filter_type}"))),
    }
}

/// Create a pose filter from a spec such as `exponential:0.2` or `median:5`
///
/// # Errors
///
/// Returns an error for unknown filter names or out-of-range parameters
pub fn create_filter(spec: &str) -> Result<Box<dyn PoseFilter>> {
    let mut parts = spec.split(':');
    let name = parts.next().unwrap_or_default().trim().to_lowercase();
    let param = parts.next().map(str::trim);

    match name.as_str() {
        "none" | "nofilter" => Ok(Box::new(NoFilter)),
        "exponential" | "ema" => {
            let blend: f64 = parse_param(spec, param, DEFAULT_SMOOTHING_BLEND)?;
            if !(blend > 0.0 && blend <= 1.0) {
                return Err(Error::FilterError(format!("Blend must be in (0, 1], got {blend}")));
            }
            Ok(Box::new(exponential::ExponentialFilter::new(blend)))
        }
        "moving_average" | "movingaverage" => {
            let window: usize = parse_param(spec, param, DEFAULT_MOVING_AVERAGE_WINDOW)?;
            if window == 0 {
                return Err(Error::FilterError("Window size must be greater than 0".to_string()));
            }
            Ok(Box::new(moving_average::MovingAverageFilter::new(window)))
        }
        "median" => {
            let window: usize = parse_param(spec, param, DEFAULT_MEDIAN_WINDOW)?;
            if window == 0 || window % 2 == 0 {
                return Err(Error::FilterError(format!(
                    "Window size must be odd and greater than 0, got {window}"
                )));
            }
            Ok(Box::new(median::MedianFilter::new(window)))
        }
        _ => Err(Error::FilterError(format!("Unknown filter type: {spec}"))),
    }
}

#[cfg(test)]
pub(crate) fn pose_with(yaw: f64, roll: f64, x: f64, scale: f64) -> FacialPose {
    FacialPose {
        position: Vector3::new(x, 0.0, 0.0),
        rotation: HeadRotation::new(yaw, 0.0, roll),
        scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_no_filter() {
        let mut filter = NoFilter;
        let pose = pose_with(0.2, 0.1, 10.0, 1.5);
        assert_eq!(filter.apply(pose), pose);
    }

    #[test]
    fn test_create_filter() {
        assert!(create_filter("none").is_ok());
        assert!(create_filter("exponential").is_ok());
        assert!(create_filter("exponential:0.25").is_ok());
        assert!(create_filter("median:3").is_ok());
        assert!(create_filter("unknown").is_err());
        assert!(create_filter("median:4").is_err());
        assert!(create_filter("exponential:abc").is_err());
    }

    #[test]
    fn test_codec_unwraps_across_seam() {
        let mut codec = ChannelCodec::default();
        codec.encode(&pose_with(0.0, PI - 0.01, 0.0, 1.0));
        let channels = codec.encode(&pose_with(0.0, -PI + 0.01, 0.0, 1.0));
        assert!((channels[5] - (PI + 0.01)).abs() < 1e-12);

        let decoded = ChannelCodec::decode(&channels);
        assert!((decoded.rotation.roll - (-PI + 0.01)).abs() < 1e-12);
    }
}
