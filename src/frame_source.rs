//! Camera frame sources.

use crate::{
    types::{Frame, VideoSize},
    Error, Result,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Supported still-image extensions for sequence replay
const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Something that yields camera frames
pub trait FrameSource: Send {
    fn name(&self) -> String;

    /// Frame size, if known before the first frame
    fn size(&self) -> Option<VideoSize>;

    /// Block until the next frame; `None` means the stream ended.
    ///
    /// # Errors
    ///
    /// Returns an error if a frame cannot be read.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Replays a directory of still images as a camera stream
pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    position: usize,
    index: u64,
    looping: bool,
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl ImageSequenceSource {
    /// Open a directory of frames, sorted by file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Camera`] if the directory cannot be read or holds no images.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| Error::Camera(format!("Cannot open frame directory {}: {e}", dir.display())))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(Error::Camera(format!("No frames found in {}", dir.display())));
        }
        log::info!("Replaying {} frames from {}", files.len(), dir.display());

        Ok(Self {
            dir,
            files,
            position: 0,
            index: 0,
            looping: false,
            interval: None,
            next_due: None,
        })
    }

    /// Restart from the first frame after the last one
    #[must_use]
    pub const fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Deliver at most `fps` frames per second
    #[must_use]
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.interval = (fps > 0.0 && fps.is_finite()).then(|| Duration::from_secs_f64(1.0 / fps));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn pace(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.next_due = Some(self.next_due.map_or(now, |due| due.max(now)) + interval);
    }
}

impl FrameSource for ImageSequenceSource {
    fn name(&self) -> String {
        format!("frames:{}", self.dir.display())
    }

    fn size(&self) -> Option<VideoSize> {
        let first = self.files.first()?;
        image::image_dimensions(first)
            .ok()
            .map(|(w, h)| VideoSize::new(f64::from(w), f64::from(h)))
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.position >= self.files.len() {
            if !self.looping {
                return Ok(None);
            }
            self.position = 0;
        }
        self.pace();

        let path = &self.files[self.position];
        self.position += 1;
        let image = image::open(path)?.to_rgb8();
        let frame = Frame::new(image, self.index);
        self.index += 1;
        Ok(Some(frame))
    }
}

#[cfg(feature = "opencv")]
pub use camera::CameraSource;

#[cfg(feature = "opencv")]
mod camera {
    use super::FrameSource;
    use crate::{
        types::{Frame, VideoSize},
        utils::image_conversion::bgr_mat_to_rgb_image,
        Error, Result,
    };
    use opencv::{
        core::Mat,
        prelude::*,
        videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
    };

    /// Live camera through `OpenCV` `VideoCapture`
    pub struct CameraSource {
        index: i32,
        capture: VideoCapture,
        frame_index: u64,
    }

    impl CameraSource {
        /// Open a camera and request a capture size and rate.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Camera`] if the device cannot be opened.
        pub fn open(index: i32, width: u32, height: u32, fps: f64) -> Result<Self> {
            log::info!("Opening camera {index}");
            let mut capture = VideoCapture::new(index, videoio::CAP_ANY)
                .map_err(|e| Error::Camera(format!("Camera {index} could not be opened: {e}")))?;
            if !capture.is_opened()? {
                return Err(Error::Camera(format!("Camera {index} could not be opened")));
            }

            capture.set(CAP_PROP_FRAME_WIDTH, f64::from(width))?;
            capture.set(CAP_PROP_FRAME_HEIGHT, f64::from(height))?;
            capture.set(CAP_PROP_FPS, fps)?;
            // Reduce buffer size for lower latency
            capture.set(CAP_PROP_BUFFERSIZE, 1.0)?;

            Ok(Self {
                index,
                capture,
                frame_index: 0,
            })
        }
    }

    impl FrameSource for CameraSource {
        fn name(&self) -> String {
            format!("camera:{}", self.index)
        }

        fn size(&self) -> Option<VideoSize> {
            let width = self.capture.get(CAP_PROP_FRAME_WIDTH).ok()?;
            let height = self.capture.get(CAP_PROP_FRAME_HEIGHT).ok()?;
            (width > 0.0 && height > 0.0).then(|| VideoSize::new(width, height))
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            let mut mat = Mat::default();
            if !self.capture.read(&mut mat)? || mat.empty() {
                return Err(Error::Camera(format!("Camera {} returned no frame", self.index)));
            }
            let frame = Frame::new(bgr_mat_to_rgb_image(&mat)?, self.frame_index);
            self.frame_index += 1;
            Ok(Some(frame))
        }
    }
}
