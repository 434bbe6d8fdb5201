//! Try-on session: wires camera, detector worker, assets and render loop together.

use crate::{
    asset_manager::AssetLoader,
    config::{CameraConfig, Config},
    detector::{create_backend, DetectorBackend},
    detector_worker::DetectorWorker,
    frame_source::{FrameSource, ImageSequenceSource},
    mailbox::mailbox,
    render_loop::{FixedRateClock, RenderLoopScheduler},
    renderer::Renderer,
    status::Status,
    Error, Result,
};
use log::info;
use std::sync::Arc;

/// Open the frame source described by the camera section.
///
/// An image directory takes precedence over the device index.
///
/// # Errors
///
/// Returns [`Error::Camera`] if the source cannot be opened, or
/// [`Error::CameraUnsupported`] if this build has no camera capture.
pub fn open_frame_source(camera: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    if let Some(dir) = &camera.frames_dir {
        let source = ImageSequenceSource::open(dir)?
            .looping(camera.loop_frames)
            .with_fps(camera.fps);
        return Ok(Box::new(source));
    }

    #[cfg(feature = "opencv")]
    {
        let source = crate::frame_source::CameraSource::open(camera.index, camera.width, camera.height, camera.fps)?;
        Ok(Box::new(source))
    }

    #[cfg(not(feature = "opencv"))]
    {
        Err(Error::CameraUnsupported(format!(
            "camera {} requested but capture support is not compiled in",
            camera.index
        )))
    }
}

/// AR try-on session
pub struct TryOnSession<R: Renderer> {
    config: Config,
    scheduler: RenderLoopScheduler<R>,
    worker: Option<DetectorWorker>,
    active: bool,
}

impl<R: Renderer> TryOnSession<R> {
    /// Create a session; nothing runs until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: Config, renderer: R, loader: Arc<dyn AssetLoader>) -> Result<Self> {
        config.validate()?;
        let scheduler = RenderLoopScheduler::from_config(&config, renderer, loader)?;
        Ok(Self {
            config,
            scheduler,
            worker: None,
            active: false,
        })
    }

    /// Stop the render loop when a finite frame source runs out
    #[must_use]
    pub fn stop_on_source_end(mut self, stop: bool) -> Self {
        self.scheduler = self.scheduler.stop_on_detector_end(stop);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn scheduler(&self) -> &RenderLoopScheduler<R> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut RenderLoopScheduler<R> {
        &mut self.scheduler
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn status(&self) -> &Status {
        self.scheduler.status().current()
    }

    /// Enter AR mode with the configured camera and detector.
    ///
    /// # Errors
    ///
    /// Returns an error if the camera cannot be opened or the detector backend
    /// cannot be created. Camera failures are also reported as status.
    pub fn start(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }
        self.begin();

        let source = match open_frame_source(&self.config.camera) {
            Ok(source) => source,
            Err(e) => {
                let status = match (&e, self.config.camera.frames_dir.is_some()) {
                    (Error::CameraUnsupported(_), _) => Status::CameraUnsupported,
                    (Error::Camera(_), false) => Status::CameraDenied,
                    _ => Status::SourceError(e.to_string()),
                };
                self.abort(status);
                return Err(e);
            }
        };
        self.scheduler.status_mut().report(Status::CameraStarted);

        let backend = match create_backend(&self.config.detector) {
            Ok(backend) => backend,
            Err(e) => {
                self.abort(Status::DetectorError(e.to_string()));
                return Err(e);
            }
        };
        self.launch(source, backend)
    }

    /// Enter AR mode with an explicit frame source and detector
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned or the initial
    /// accessory is unknown.
    pub fn start_with(&mut self, source: Box<dyn FrameSource>, backend: Box<dyn DetectorBackend>) -> Result<()> {
        if self.active {
            return Ok(());
        }
        self.begin();
        self.scheduler.status_mut().report(Status::CameraStarted);
        self.launch(source, backend)
    }

    fn begin(&mut self) {
        info!("Entering AR mode");
        self.scheduler.restart();
        self.scheduler.status_mut().report(Status::LoadingHeadModel);
        let head_proxy = self.config.assets.head_proxy.clone();
        self.scheduler.assets_mut().load_head_proxy(head_proxy);
    }

    /// Undo `begin` after a failed start
    fn abort(&mut self, status: Status) {
        log::warn!("AR mode not started: {status}");
        self.scheduler.assets_mut().detach_all();
        self.scheduler.reset_tracking();
        self.scheduler.status_mut().report(status);
    }

    fn launch(&mut self, source: Box<dyn FrameSource>, backend: Box<dyn DetectorBackend>) -> Result<()> {
        let (tx, rx) = mailbox();
        self.scheduler.attach_detector(rx);
        self.worker = Some(DetectorWorker::spawn(source, backend, tx)?);
        self.active = true;

        if let Some(initial) = self.config.assets.initial_accessory.clone() {
            self.select_accessory(&initial)?;
        }
        self.scheduler.status_mut().report(Status::ArInitialized);
        Ok(())
    }

    /// Swap the accessory for the catalog entry `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if no accessory has that id.
    pub fn select_accessory(&mut self, id: &str) -> Result<()> {
        let accessory = self
            .config
            .assets
            .accessory(id)
            .cloned()
            .ok_or_else(|| Error::ConfigError(format!("Unknown accessory: {id}")))?;
        info!("Selecting accessory {} ({})", accessory.id, accessory.name);
        self.scheduler.select_accessory(&accessory);
        Ok(())
    }

    /// Remove the accessory but stay in AR mode
    pub fn clear_accessory(&mut self) {
        self.scheduler.clear_accessory();
    }

    /// Run one render tick; `false` once the loop wants to stop
    pub fn tick(&mut self) -> bool {
        self.scheduler.tick()
    }

    /// Render until the user exits or the source ends, then leave AR mode
    ///
    /// # Errors
    ///
    /// Returns an error if the session has not been started.
    pub fn run(&mut self) -> Result<()> {
        if !self.active {
            return Err(Error::InvalidInput("Session not started".to_string()));
        }
        let mut clock = FixedRateClock::new(self.config.render.refresh_rate);
        self.scheduler.run(&mut clock);
        self.exit();
        Ok(())
    }

    /// Leave AR mode: stop the worker, detach everything, stop the loop.
    ///
    /// Safe to call repeatedly.
    pub fn exit(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
        self.scheduler.detach_detector();
        self.scheduler.stop();
        self.scheduler.reset_tracking();
        if self.active {
            self.scheduler.assets_mut().detach_all();
            self.scheduler.status_mut().report(Status::SelectAccessory);
            info!("Left AR mode");
        }
        self.active = false;
    }
}
