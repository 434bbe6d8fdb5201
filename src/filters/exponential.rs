use super::{ChannelCodec, PoseFilter, POSE_CHANNELS};
use crate::pose_estimation::FacialPose;

/// Exponential smoothing: each output moves `blend` of the way toward the new pose
pub struct ExponentialFilter {
    blend: f64,
    codec: ChannelCodec,
    last: Option<[f64; POSE_CHANNELS]>,
}

impl ExponentialFilter {
    /// # Panics
    ///
    /// Panics if blend is not in the range (0, 1]
    #[must_use]
    pub fn new(blend: f64) -> Self {
        assert!(blend > 0.0 && blend <= 1.0, "Blend must be in (0, 1]");
        Self {
            blend,
            codec: ChannelCodec::default(),
            last: None,
        }
    }

    #[must_use]
    pub const fn blend(&self) -> f64 {
        self.blend
    }
}

impl PoseFilter for ExponentialFilter {
    fn apply(&mut self, pose: FacialPose) -> FacialPose {
        let target = self.codec.encode(&pose);
        let smoothed = match self.last {
            Some(last) => {
                let mut out = last;
                for (current, goal) in out.iter_mut().zip(target) {
                    *current = self.blend.mul_add(goal - *current, *current);
                }
                out
            }
            None => target,
        };
        self.last = Some(smoothed);
        ChannelCodec::decode(&smoothed)
    }

    fn reset(&mut self) {
        self.codec.reset();
        self.last = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}
