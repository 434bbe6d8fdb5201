//! Render-side pose pipeline: map detector anchors, estimate, smooth.
//!
//! The pipeline owns the current pose. `NotFound` never touches it; what the
//! overlay does during a miss is decided by the lost-face policy.

use crate::{
    config::LostFacePolicy,
    coordinate_mapping::CoordinateMapper,
    detector::DetectionResult,
    filters::{NoFilter, PoseFilter},
    pose_estimation::{FacialPose, PoseEstimator},
    types::{RenderAnchors, VideoSize, Viewport},
};

/// Result of feeding one detection through the pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PipelineUpdate {
    /// New pose computed from these render-space anchors
    Tracked { anchors: RenderAnchors, pose: FacialPose },
    /// No usable face; the previous pose is kept
    Lost,
}

pub struct PosePipeline {
    viewport: Viewport,
    mapper: Option<CoordinateMapper>,
    estimator: PoseEstimator,
    filter: Box<dyn PoseFilter>,
    policy: LostFacePolicy,
    pose: Option<FacialPose>,
    face_present: bool,
}

impl PosePipeline {
    #[must_use]
    pub fn new(viewport: Viewport, estimator: PoseEstimator, filter: Box<dyn PoseFilter>, policy: LostFacePolicy) -> Self {
        log::debug!("Pose pipeline using {} with {policy:?} on face loss", filter.name());
        Self {
            viewport,
            mapper: None,
            estimator,
            filter,
            policy,
            pose: None,
            face_present: false,
        }
    }

    /// Unsmoothed pipeline with default constants
    #[must_use]
    pub fn unfiltered(viewport: Viewport) -> Self {
        Self::new(viewport, PoseEstimator::default(), Box::new(NoFilter), LostFacePolicy::Hold)
    }

    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub const fn mapper(&self) -> Option<&CoordinateMapper> {
        self.mapper.as_ref()
    }

    /// Latest smoothed pose, `None` before the first detection
    #[must_use]
    pub const fn pose(&self) -> Option<&FacialPose> {
        self.pose.as_ref()
    }

    #[must_use]
    pub const fn is_face_present(&self) -> bool {
        self.face_present
    }

    /// Whether the overlay root should be drawn right now
    #[must_use]
    pub fn overlay_visible(&self) -> bool {
        self.pose.is_some()
            && match self.policy {
                LostFacePolicy::Hold => true,
                LostFacePolicy::Hide => self.face_present,
            }
    }

    /// Rebuild the mapping for a new viewport
    pub fn resize(&mut self, viewport: Viewport) {
        log::debug!("Pose pipeline viewport {}x{}", viewport.width, viewport.height);
        self.viewport = viewport;
        self.mapper = self.mapper.map(|mapper| mapper.resized(viewport));
    }

    /// Forget the pose and filter history
    pub fn reset(&mut self) {
        self.pose = None;
        self.face_present = false;
        self.filter.reset();
    }

    fn mapper_for(&mut self, video: VideoSize) -> CoordinateMapper {
        match self.mapper {
            Some(mapper) if mapper.video() == video => mapper,
            _ => {
                let mapper = CoordinateMapper::new(video, self.viewport);
                self.mapper = Some(mapper);
                mapper
            }
        }
    }

    /// Feed one detection result taken from a frame of size `video`
    pub fn process(&mut self, video: VideoSize, result: &DetectionResult) -> PipelineUpdate {
        let DetectionResult::Found(raw) = result else {
            self.face_present = false;
            return PipelineUpdate::Lost;
        };

        let anchors = self.mapper_for(video).map_anchors(raw);
        if !anchors.is_finite() {
            log::debug!("Anchors not finite after mapping (video {}x{})", video.width, video.height);
            self.face_present = false;
            return PipelineUpdate::Lost;
        }

        if !self.face_present {
            self.filter.reset();
        }
        let pose = self.filter.apply(self.estimator.estimate_pose(&anchors, self.viewport));
        self.pose = Some(pose);
        self.face_present = true;

        PipelineUpdate::Tracked { anchors, pose }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        filters::exponential::ExponentialFilter,
        types::{RawAnchors, RawPoint},
    };

    const VIDEO: VideoSize = VideoSize::new(640.0, 480.0);

    fn found(nose_x: f64) -> DetectionResult {
        DetectionResult::Found(RawAnchors::new(
            RawPoint::new(280.0, 200.0),
            RawPoint::new(360.0, 200.0),
            RawPoint::new(nose_x, 240.0),
        ))
    }

    #[test]
    fn test_not_found_keeps_pose() {
        let mut pipeline = PosePipeline::unfiltered(Viewport::new(1280.0, 720.0));
        assert_eq!(pipeline.process(VIDEO, &DetectionResult::NotFound), PipelineUpdate::Lost);
        assert!(pipeline.pose().is_none());

        pipeline.process(VIDEO, &found(320.0));
        let before = *pipeline.pose().unwrap();
        for _ in 0..5 {
            pipeline.process(VIDEO, &DetectionResult::NotFound);
        }
        assert_eq!(*pipeline.pose().unwrap(), before);
        assert!(pipeline.overlay_visible());
    }

    #[test]
    fn test_hide_policy_hides_without_touching_pose() {
        let mut pipeline = PosePipeline::new(
            Viewport::new(1280.0, 720.0),
            PoseEstimator::default(),
            Box::new(NoFilter),
            LostFacePolicy::Hide,
        );
        pipeline.process(VIDEO, &found(320.0));
        assert!(pipeline.overlay_visible());
        let before = *pipeline.pose().unwrap();

        pipeline.process(VIDEO, &DetectionResult::NotFound);
        assert!(!pipeline.overlay_visible());
        assert_eq!(*pipeline.pose().unwrap(), before);
    }

    #[test]
    fn test_filter_resets_on_reacquire() {
        let mut pipeline = PosePipeline::new(
            Viewport::new(1280.0, 720.0),
            PoseEstimator::default(),
            Box::new(ExponentialFilter::new(0.1)),
            LostFacePolicy::Hold,
        );
        pipeline.process(VIDEO, &found(300.0));
        pipeline.process(VIDEO, &DetectionResult::NotFound);

        // After a miss the next pose is taken as-is, not blended with the old one
        let PipelineUpdate::Tracked { pose, anchors } = pipeline.process(VIDEO, &found(340.0)) else {
            panic!("expected a tracked update");
        };
        let direct = PoseEstimator::default().estimate_pose(&anchors, Viewport::new(1280.0, 720.0));
        assert!((pose.rotation.yaw - direct.rotation.yaw).abs() < 1e-12);
    }

    #[test]
    fn test_resize_remaps_next_detection() {
        let mut pipeline = PosePipeline::unfiltered(Viewport::new(1280.0, 720.0));
        pipeline.process(VIDEO, &found(320.0));
        pipeline.resize(Viewport::new(640.0, 480.0));
        assert_eq!(pipeline.mapper().unwrap().viewport(), Viewport::new(640.0, 480.0));

        let PipelineUpdate::Tracked { anchors, .. } = pipeline.process(VIDEO, &found(320.0)) else {
            panic!("expected a tracked update");
        };
        // 1:1 mapping, mirrored
        assert!((anchors.left_eye.x - 360.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_video_size_is_lost() {
        let mut pipeline = PosePipeline::unfiltered(Viewport::new(1280.0, 720.0));
        let update = pipeline.process(VideoSize::new(0.0, 0.0), &found(320.0));
        assert_eq!(update, PipelineUpdate::Lost);
        assert!(pipeline.pose().is_none());
    }
}
