//! Display-paced render loop.
//!
//! Each tick drains the detection mailbox, runs the pose pipeline, attaches
//! finished asset loads, poses the overlay root and renders. The loop never
//! waits on the detector; a tick without a new detection renders the last
//! pose again.

use crate::{
    asset_manager::{AssetEvent, AssetLoader, AssetRole, OverlayAssetManager},
    calibration::CalibrationController,
    config::{AccessoryConfig, Config},
    detector_worker::DetectionMessage,
    mailbox::{Closed, MailboxReceiver, StopSignal},
    pose_estimation::PoseEstimator,
    pose_pipeline::{PipelineUpdate, PosePipeline},
    renderer::{RenderCommand, RenderFrame, Renderer},
    scene::Transform,
    status::{Status, StatusReporter},
    types::{Frame, Viewport},
    Result,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Paces the render loop
pub trait FrameClock {
    /// Block until the next frame is due
    fn wait_next(&mut self);
}

/// Ticks at a fixed rate, skipping missed frames instead of bursting
#[derive(Debug, Clone)]
pub struct FixedRateClock {
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl FixedRateClock {
    /// Clock for a display refreshing `rate` times per second; a non-positive rate does not pace
    #[must_use]
    pub fn new(rate: f64) -> Self {
        Self {
            interval: (rate > 0.0 && rate.is_finite()).then(|| Duration::from_secs_f64(1.0 / rate)),
            next_due: None,
        }
    }
}

impl FrameClock for FixedRateClock {
    fn wait_next(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now + interval);
        if due > now {
            std::thread::sleep(due - now);
            self.next_due = Some(due + interval);
        } else {
            self.next_due = Some(now + interval);
        }
    }
}

/// Drives the overlay from detections to the display
pub struct RenderLoopScheduler<R: Renderer> {
    renderer: R,
    pipeline: PosePipeline,
    assets: OverlayAssetManager,
    calibration: CalibrationController,
    status: StatusReporter,
    detections: Option<MailboxReceiver<DetectionMessage>>,
    catalog: Vec<AccessoryConfig>,
    latest_frame: Option<Frame>,
    pitch_tilt: f64,
    stop: StopSignal,
    stop_on_detector_end: bool,
    ticks: u64,
}

impl<R: Renderer> RenderLoopScheduler<R> {
    #[must_use]
    pub fn new(
        mut renderer: R,
        pipeline: PosePipeline,
        assets: OverlayAssetManager,
        calibration: CalibrationController,
        pitch_tilt: f64,
    ) -> Self {
        if let Err(e) = renderer.resize(pipeline.viewport()) {
            log::warn!("Renderer rejected initial viewport: {e}");
        }
        Self {
            renderer,
            pipeline,
            assets,
            calibration,
            status: StatusReporter::new(),
            detections: None,
            catalog: Vec::new(),
            latest_frame: None,
            pitch_tilt,
            stop: StopSignal::new(),
            stop_on_detector_end: false,
            ticks: 0,
        }
    }

    /// Build the loop from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the smoothing filter cannot be created.
    pub fn from_config(config: &Config, renderer: R, loader: Arc<dyn AssetLoader>) -> Result<Self> {
        let viewport = Viewport::new(
            f64::from(config.render.window_width),
            f64::from(config.render.window_height),
        );
        let pipeline = PosePipeline::new(
            viewport,
            PoseEstimator::new(config.pose.clone()),
            config.create_filter()?,
            config.render.on_face_lost,
        );
        let assets = OverlayAssetManager::new(loader, config.render.head_proxy_opacity);
        let calibration = CalibrationController::new(config.calibration.clone());

        Ok(Self::new(renderer, pipeline, assets, calibration, config.render.pitch_tilt)
            .with_catalog(config.assets.accessories.clone()))
    }

    /// Accessories selectable by position from the renderer
    #[must_use]
    pub fn with_catalog(mut self, catalog: Vec<AccessoryConfig>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Stop once the detector has gone away and its last detection is drawn
    #[must_use]
    pub const fn stop_on_detector_end(mut self, stop: bool) -> Self {
        self.stop_on_detector_end = stop;
        self
    }

    /// Start consuming detections from a worker
    pub fn attach_detector(&mut self, detections: MailboxReceiver<DetectionMessage>) {
        self.detections = Some(detections);
    }

    /// Drop the detection mailbox, which also ends the worker loop
    pub fn detach_detector(&mut self) {
        self.detections = None;
    }

    #[must_use]
    pub const fn pipeline(&self) -> &PosePipeline {
        &self.pipeline
    }

    #[must_use]
    pub const fn assets(&self) -> &OverlayAssetManager {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut OverlayAssetManager {
        &mut self.assets
    }

    #[must_use]
    pub const fn status(&self) -> &StatusReporter {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusReporter {
        &mut self.status
    }

    #[must_use]
    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    #[must_use]
    pub fn catalog(&self) -> &[AccessoryConfig] {
        &self.catalog
    }

    /// The camera frame behind the current pose
    #[must_use]
    pub const fn latest_frame(&self) -> Option<&Frame> {
        self.latest_frame.as_ref()
    }

    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Handle for stopping the loop from elsewhere
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Ask the loop to end after the current tick; safe to repeat
    pub fn stop(&self) {
        self.stop.stop();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Forget the pose, filter history and camera frame of the last session
    pub fn reset_tracking(&mut self) {
        self.pipeline.reset();
        self.latest_frame = None;
    }

    /// Make a stopped loop runnable again with no tracking carried over
    pub fn restart(&mut self) {
        self.reset_tracking();
        self.stop.rearm();
    }

    /// Adopt a new viewport size
    pub fn resize(&mut self, viewport: Viewport) {
        if !(viewport.width > 0.0 && viewport.height > 0.0) {
            log::warn!("Ignoring degenerate viewport {}x{}", viewport.width, viewport.height);
            return;
        }
        self.pipeline.resize(viewport);
        if let Err(e) = self.renderer.resize(viewport) {
            log::warn!("Renderer resize failed: {e}");
        }
    }

    /// Swap in a new accessory from its catalog entry
    pub fn select_accessory(&mut self, accessory: &AccessoryConfig) {
        self.assets
            .replace_accessory_tinted(accessory.name.clone(), accessory.model.clone(), accessory.color);
    }

    /// Detach the accessory and prompt for a new one
    pub fn clear_accessory(&mut self) {
        self.assets.clear_accessory();
        self.status.report(Status::SelectAccessory);
    }

    fn handle_commands(&mut self) {
        while let Some(command) = self.renderer.poll_command() {
            log::debug!("Render command {command:?}");
            match command {
                RenderCommand::SelectAccessory(position) => match self.catalog.get(position).cloned() {
                    Some(accessory) => self.select_accessory(&accessory),
                    None => log::warn!("No accessory at position {}", position + 1),
                },
                RenderCommand::ClearAccessory => self.clear_accessory(),
                RenderCommand::Resize(viewport) => self.resize(viewport),
                RenderCommand::Exit => self.stop(),
            }
        }
    }

    fn apply_asset_events(&mut self) {
        for event in self.assets.poll() {
            let status = match event {
                AssetEvent::Attached {
                    role: AssetRole::HeadProxy,
                    ..
                } => Status::HeadModelLoaded,
                AssetEvent::Attached {
                    role: AssetRole::Accessory,
                    name,
                } => Status::AccessoryLoaded(name),
                AssetEvent::Failed {
                    role: AssetRole::HeadProxy,
                    ..
                } => Status::HeadModelError,
                AssetEvent::Failed {
                    role: AssetRole::Accessory,
                    reason,
                    ..
                } => Status::AccessoryLoadFailed(reason),
            };
            self.status.report(status);
        }
    }

    fn drain_detections(&mut self) {
        let Some(detections) = self.detections.as_ref() else {
            return;
        };
        let message = match detections.take_latest() {
            Ok(Some(message)) => message,
            Ok(None) => return,
            Err(Closed) => {
                log::info!("Detector stopped delivering frames");
                self.detections = None;
                if self.stop_on_detector_end {
                    self.stop();
                }
                return;
            }
        };

        let DetectionMessage { frame, result } = message;
        match self.pipeline.process(frame.size(), &result) {
            PipelineUpdate::Tracked { anchors, .. } => {
                self.status.report(Status::TrackingFace);
                if let Some(accessory) = self.assets.accessory_mut() {
                    self.calibration.calibrate(accessory, &anchors);
                }
            }
            PipelineUpdate::Lost => {
                self.status.report(Status::NoFaceDetected);
            }
        }
        self.latest_frame = Some(frame);
    }

    fn pose_overlay(&mut self) {
        let visible = self.pipeline.overlay_visible();
        let transform = match (self.pipeline.pose(), self.assets.head_proxy()) {
            (Some(pose), Some(_)) => Some(Transform::from_pose(pose, self.pitch_tilt)),
            _ => None,
        };
        let root = self.assets.root_mut();
        if let Some(transform) = transform {
            root.transform = transform;
        }
        root.visible = visible;
    }

    /// Run one frame; returns `false` once the loop should end
    pub fn tick(&mut self) -> bool {
        self.handle_commands();
        self.apply_asset_events();
        self.drain_detections();
        self.pose_overlay();

        let frame = RenderFrame {
            viewport: self.pipeline.viewport(),
            video: self.latest_frame.as_ref(),
            mapper: self.pipeline.mapper(),
            assets: &self.assets,
            pose: self.pipeline.pose(),
            status: self.status.current(),
        };
        if let Err(e) = self.renderer.render(&frame) {
            log::warn!("Render failed on tick {}: {e}", self.ticks);
        }
        self.ticks += 1;

        !self.stop.is_stopped()
    }

    /// Tick until stopped, paced by `clock`
    pub fn run(&mut self, clock: &mut dyn FrameClock) {
        log::info!("Render loop started");
        while self.tick() {
            clock.wait_next();
        }
        log::info!("Render loop stopped after {} ticks", self.ticks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        asset_manager::AssetLoader,
        detector::DetectionResult,
        mailbox::mailbox,
        renderer::HeadlessRenderer,
        scene::{Aabb, Mesh, SceneNode},
        types::{RawAnchors, RawPoint},
        Error,
    };
    use image::RgbImage;
    use nalgebra::Vector3;
    use std::path::Path;

    struct BoxLoader;

    impl AssetLoader for BoxLoader {
        fn load(&self, source: &Path) -> Result<SceneNode> {
            match source.to_str() {
                Some("head") => Ok(SceneNode::new("head")
                    .with_mesh(Mesh::new("face", Aabb::centered(Vector3::new(160.0, 220.0, 180.0))))),
                Some("glasses") => Ok(SceneNode::new("glasses")
                    .with_mesh(Mesh::new("frame", Aabb::centered(Vector3::new(96.0, 30.0, 10.0))))),
                _ => Err(Error::IoError(format!("missing {}", source.display()))),
            }
        }
    }

    fn scheduler() -> RenderLoopScheduler<HeadlessRenderer> {
        let assets = OverlayAssetManager::new(Arc::new(BoxLoader), 0.0);
        RenderLoopScheduler::new(
            HeadlessRenderer::new(),
            PosePipeline::unfiltered(Viewport::new(640.0, 480.0)),
            assets,
            CalibrationController::default(),
            crate::constants::PITCH_TILT,
        )
    }

    fn face_message(index: u64) -> DetectionMessage {
        DetectionMessage {
            frame: Frame::new(RgbImage::new(640, 480), index),
            result: DetectionResult::Found(RawAnchors::new(
                RawPoint::new(280.0, 200.0),
                RawPoint::new(360.0, 200.0),
                RawPoint::new(320.0, 240.0),
            )),
        }
    }

    fn wait_for_assets(scheduler: &mut RenderLoopScheduler<HeadlessRenderer>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while scheduler.assets().is_loading() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_renders_every_tick_without_detections() {
        let mut scheduler = scheduler();
        for _ in 0..3 {
            assert!(scheduler.tick());
        }
        assert_eq!(scheduler.renderer().frames_rendered(), 3);
        assert!(scheduler.pipeline().pose().is_none());
        assert!(!scheduler.assets().root().visible);
    }

    #[test]
    fn test_detection_poses_root_and_calibrates() {
        let mut scheduler = scheduler();
        let (tx, rx) = mailbox();
        scheduler.attach_detector(rx);

        scheduler.assets_mut().load_head_proxy("head");
        wait_for_assets(&mut scheduler);
        scheduler.tick();
        assert_eq!(*scheduler.status().current(), Status::HeadModelLoaded);
        scheduler.assets_mut().replace_accessory("Classic Black", "glasses");
        wait_for_assets(&mut scheduler);
        scheduler.tick();
        assert_eq!(*scheduler.status().current(), Status::AccessoryLoaded("Classic Black".to_string()));

        tx.post(face_message(0)).unwrap();
        scheduler.tick();

        assert_eq!(*scheduler.status().current(), Status::TrackingFace);
        let accessory = scheduler.assets().accessory().unwrap();
        assert!(accessory.calibration.is_calibrated());
        // Eye distance 80 against a 96-wide frame with 1.2 margin
        assert!((accessory.node.transform.scale.x - 1.0).abs() < 1e-9);

        let root = scheduler.assets().root();
        assert!(root.visible);
        assert!((root.transform.scale.x - 1.0).abs() < 1e-9);
        // Nose 40px below the eye line at eye distance 80
        let expected_x = -(0.5_f64).atan() + crate::constants::PITCH_TILT;
        assert!((root.transform.rotation.x - expected_x).abs() < 1e-9);
        assert!(root.transform.rotation.y.abs() < 1e-9);
        assert_eq!(scheduler.latest_frame().map(|f| f.index), Some(0));
    }

    #[test]
    fn test_root_not_posed_without_head_proxy() {
        let mut scheduler = scheduler();
        let (tx, rx) = mailbox();
        scheduler.attach_detector(rx);

        tx.post(face_message(0)).unwrap();
        scheduler.tick();

        assert!(scheduler.pipeline().pose().is_some());
        assert_eq!(scheduler.assets().root().transform, Transform::default());
    }

    #[test]
    fn test_miss_keeps_pose_and_reports() {
        let mut scheduler = scheduler();
        let (tx, rx) = mailbox();
        scheduler.attach_detector(rx);
        scheduler.assets_mut().load_head_proxy("head");
        wait_for_assets(&mut scheduler);

        tx.post(face_message(0)).unwrap();
        scheduler.tick();
        let posed = scheduler.assets().root().transform;

        tx.post(DetectionMessage {
            frame: Frame::new(RgbImage::new(640, 480), 1),
            result: DetectionResult::NotFound,
        })
        .unwrap();
        scheduler.tick();

        assert_eq!(*scheduler.status().current(), Status::NoFaceDetected);
        assert_eq!(scheduler.assets().root().transform, posed);
    }

    #[test]
    fn test_commands_from_renderer() {
        let mut scheduler = scheduler().with_catalog(vec![AccessoryConfig {
            id: "classic".to_string(),
            name: "Classic Black".to_string(),
            model: "glasses".into(),
            color: None,
        }]);

        scheduler.renderer_mut().push_command(RenderCommand::SelectAccessory(0));
        scheduler.renderer_mut().push_command(RenderCommand::Resize(Viewport::new(800.0, 600.0)));
        scheduler.tick();
        wait_for_assets(&mut scheduler);
        scheduler.tick();
        assert!(scheduler.assets().accessory().is_some());
        assert_eq!(scheduler.pipeline().viewport(), Viewport::new(800.0, 600.0));
        assert_eq!(scheduler.renderer().viewport(), Some(Viewport::new(800.0, 600.0)));

        scheduler.renderer_mut().push_command(RenderCommand::ClearAccessory);
        scheduler.tick();
        assert!(scheduler.assets().accessory().is_none());
        assert_eq!(*scheduler.status().current(), Status::SelectAccessory);

        scheduler.renderer_mut().push_command(RenderCommand::Exit);
        assert!(!scheduler.tick());
    }

    #[test]
    fn test_failed_accessory_reports_reason() {
        let mut scheduler = scheduler();
        scheduler.assets_mut().replace_accessory("Gold Frame", "nowhere");
        wait_for_assets(&mut scheduler);
        scheduler.tick();

        let Status::AccessoryLoadFailed(reason) = scheduler.status().current() else {
            panic!("expected a load failure, got {}", scheduler.status().current());
        };
        assert!(reason.contains("missing nowhere"));
        assert!(scheduler.assets().accessory().is_none());
    }

    #[test]
    fn test_stops_when_detector_ends() {
        let mut scheduler = scheduler().stop_on_detector_end(true);
        let (tx, rx) = mailbox();
        scheduler.attach_detector(rx);
        tx.post(face_message(0)).unwrap();
        drop(tx);

        assert!(scheduler.tick());
        assert!(!scheduler.tick());
        assert!(scheduler.pipeline().pose().is_some());
    }

    #[test]
    fn test_restart_clears_stop_and_tracking() {
        let mut scheduler = scheduler();
        let handle = scheduler.stop_signal();
        let (tx, rx) = mailbox();
        scheduler.attach_detector(rx);
        tx.post(face_message(0)).unwrap();
        scheduler.stop();
        assert!(!scheduler.tick());
        assert!(scheduler.pipeline().pose().is_some());
        assert!(scheduler.latest_frame().is_some());

        scheduler.restart();
        assert!(!handle.is_stopped());
        assert!(scheduler.pipeline().pose().is_none());
        assert!(scheduler.latest_frame().is_none());
        assert!(scheduler.tick());
        assert!(!scheduler.assets().root().visible);
    }

    #[test]
    fn test_run_with_free_clock_until_stopped() {
        struct StopAfter(u32, StopSignal);
        impl FrameClock for StopAfter {
            fn wait_next(&mut self) {
                self.0 -= 1;
                if self.0 == 0 {
                    self.1.stop();
                }
            }
        }

        let mut scheduler = scheduler();
        let mut clock = StopAfter(4, scheduler.stop_signal());
        scheduler.run(&mut clock);
        assert_eq!(scheduler.ticks(), 5);
        scheduler.stop();
        assert!(scheduler.is_stopped());
    }

    #[test]
    fn test_fixed_rate_clock_paces() {
        let mut clock = FixedRateClock::new(200.0);
        let start = Instant::now();
        for _ in 0..4 {
            clock.wait_next();
        }
        assert!(start.elapsed() >= Duration::from_millis(15));

        let mut unpaced = FixedRateClock::new(0.0);
        let start = Instant::now();
        unpaced.wait_next();
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
