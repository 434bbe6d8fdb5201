use super::{ChannelCodec, PoseFilter, POSE_CHANNELS};
use crate::pose_estimation::FacialPose;
use std::collections::VecDeque;

/// Per-channel median filter; rejects single-frame detector spikes
pub struct MedianFilter {
    window_size: usize,
    codec: ChannelCodec,
    buffer: VecDeque<[f64; POSE_CHANNELS]>,
}

impl MedianFilter {
    /// # Panics
    ///
    /// Panics if the window size is zero or even
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        assert!(window_size > 0, "Window size must be greater than 0");
        assert!(window_size % 2 == 1, "Median filter window size must be odd");
        Self {
            window_size,
            codec: ChannelCodec::default(),
            buffer: VecDeque::with_capacity(window_size),
        }
    }

    fn calculate_median(values: &mut [f64]) -> f64 {
        values.sort_by(f64::total_cmp);

        let len = values.len();
        if len == 0 {
            0.0
        } else if len % 2 == 0 {
            (values[len / 2 - 1] + values[len / 2]) / 2.0
        } else {
            values[len / 2]
        }
    }
}

impl PoseFilter for MedianFilter {
    fn apply(&mut self, pose: FacialPose) -> FacialPose {
        if self.buffer.len() >= self.window_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(self.codec.encode(&pose));

        let mut medians = [0.0; POSE_CHANNELS];
        let mut column = Vec::with_capacity(self.buffer.len());
        for (channel, median) in medians.iter_mut().enumerate() {
            column.clear();
            column.extend(self.buffer.iter().map(|sample| sample[channel]));
            *median = Self::calculate_median(&mut column);
        }
        ChannelCodec::decode(&medians)
    }

    fn reset(&mut self) {
        self.codec.reset();
        self.buffer.clear();
    }

    fn name(&self) -> &str {
        "MedianFilter"
    }
}
