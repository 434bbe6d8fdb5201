use super::{ChannelCodec, PoseFilter, POSE_CHANNELS};
use crate::pose_estimation::FacialPose;
use std::collections::VecDeque;

/// Moving average filter
pub struct MovingAverageFilter {
    window_size: usize,
    codec: ChannelCodec,
    buffer: VecDeque<[f64; POSE_CHANNELS]>,
}

impl MovingAverageFilter {
    /// # Panics
    ///
    /// Panics if the window size is zero
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        assert!(window_size > 0, "Window size must be greater than 0");
        Self {
            window_size,
            codec: ChannelCodec::default(),
            buffer: VecDeque::with_capacity(window_size),
        }
    }
}

impl PoseFilter for MovingAverageFilter {
    #[allow(clippy::cast_precision_loss)] // Window sizes are small
    fn apply(&mut self, pose: FacialPose) -> FacialPose {
        if self.buffer.len() >= self.window_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(self.codec.encode(&pose));

        let count = self.buffer.len() as f64;
        let mut average = [0.0; POSE_CHANNELS];
        for sample in &self.buffer {
            for (acc, value) in average.iter_mut().zip(sample) {
                *acc += value;
            }
        }
        for value in &mut average {
            *value /= count;
        }
        ChannelCodec::decode(&average)
    }

    fn reset(&mut self) {
        self.codec.reset();
        self.buffer.clear();
    }

    fn name(&self) -> &str {
        "MovingAverageFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::pose_with;

    #[test]
    fn test_moving_average() {
        let mut filter = MovingAverageFilter::new(3);

        assert_eq!(filter.apply(pose_with(0.0, 0.0, 10.0, 1.0)).position.x, 10.0);
        assert_eq!(filter.apply(pose_with(0.0, 0.0, 20.0, 1.0)).position.x, 15.0);
        assert_eq!(filter.apply(pose_with(0.0, 0.0, 30.0, 1.0)).position.x, 20.0);

        // Window is full, oldest value should be dropped
        assert_eq!(filter.apply(pose_with(0.0, 0.0, 40.0, 1.0)).position.x, 30.0);
    }

    #[test]
    fn test_scale_stays_within_input_range() {
        let mut filter = MovingAverageFilter::new(4);
        for scale in [0.1, 2.2, 0.1, 2.2, 1.0] {
            let pose = filter.apply(pose_with(0.0, 0.0, 0.0, scale));
            assert!(pose.scale >= 0.1 && pose.scale <= 2.2);
        }
    }
}
