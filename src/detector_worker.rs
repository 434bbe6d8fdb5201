//! Detector thread: frame source → backend → mailbox.

use crate::{
    detector::{DetectionResult, DetectorBackend},
    frame_source::FrameSource,
    mailbox::{MailboxSender, StopSignal},
    types::Frame,
    Error, Result,
};
use std::thread::JoinHandle;
use std::time::Duration;

/// Pause before retrying after a failed frame read
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Consecutive read failures after which the source is treated as lost
const MAX_READ_FAILURES: u32 = 100;

/// One detection cycle handed to the render side
#[derive(Debug, Clone)]
pub struct DetectionMessage {
    /// The frame the detector looked at
    pub frame: Frame,
    pub result: DetectionResult,
}

/// Owns the detector thread.
///
/// The thread runs until [`stop`](Self::stop) is called, the frame source
/// ends, or the render side drops its mailbox receiver.
pub struct DetectorWorker {
    stop: StopSignal,
    handle: Option<JoinHandle<()>>,
}

impl DetectorWorker {
    /// Spawn the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to create the thread.
    pub fn spawn(
        mut source: Box<dyn FrameSource>,
        mut backend: Box<dyn DetectorBackend>,
        mailbox: MailboxSender<DetectionMessage>,
    ) -> Result<Self> {
        let stop = StopSignal::new();
        let thread_stop = stop.clone();
        log::info!("Starting detector worker: {} on {}", backend.name(), source.name());

        let handle = std::thread::Builder::new()
            .name("detector".to_string())
            .spawn(move || run(source.as_mut(), backend.as_mut(), &mailbox, &thread_stop))
            .map_err(Error::Io)?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it; later calls do nothing
    pub fn stop(&mut self) {
        self.stop.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Detector worker panicked");
            }
            log::info!("Detector worker stopped");
        }
    }

    /// True until the thread has exited
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for DetectorWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    source: &mut dyn FrameSource,
    backend: &mut dyn DetectorBackend,
    mailbox: &MailboxSender<DetectionMessage>,
    stop: &StopSignal,
) {
    let mut read_failures = 0;

    while !stop.is_stopped() {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => {
                read_failures = 0;
                frame
            }
            Ok(None) => {
                log::info!("Frame source {} ended", source.name());
                break;
            }
            Err(e) => {
                read_failures += 1;
                if read_failures >= MAX_READ_FAILURES {
                    log::error!("Giving up on {} after {read_failures} failed reads: {e}", source.name());
                    break;
                }
                log::warn!("Failed to read frame, retrying: {e}");
                std::thread::sleep(READ_RETRY_DELAY);
                continue;
            }
        };

        let result = backend.detect(&frame).unwrap_or_else(|e| {
            log::warn!("Detection failed on frame {}: {e}", frame.index);
            DetectionResult::NotFound
        });
        log::debug!("Frame {}: {}", frame.index, if result.is_found() { "face" } else { "no face" });

        if mailbox.post(DetectionMessage { frame, result }).is_err() {
            log::debug!("Detection mailbox closed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mailbox::{mailbox, Closed},
        types::{RawAnchors, RawPoint, VideoSize},
    };
    use image::RgbImage;
    use std::time::Instant;

    struct CountingSource {
        remaining: Option<u64>,
        next: u64,
    }

    impl FrameSource for CountingSource {
        fn name(&self) -> String {
            "counting".to_string()
        }

        fn size(&self) -> Option<VideoSize> {
            Some(VideoSize::new(8.0, 8.0))
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if let Some(remaining) = self.remaining.as_mut() {
                if *remaining == 0 {
                    return Ok(None);
                }
                *remaining -= 1;
            } else {
                std::thread::sleep(Duration::from_millis(1));
            }
            let frame = Frame::new(RgbImage::new(8, 8), self.next);
            self.next += 1;
            Ok(Some(frame))
        }
    }

    /// Fails on odd frames, finds a face on even ones
    struct FlakyBackend;

    impl DetectorBackend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }

        fn detect(&mut self, frame: &Frame) -> Result<DetectionResult> {
            if frame.index % 2 == 1 {
                return Err(Error::Detector("model hiccup".to_string()));
            }
            Ok(DetectionResult::Found(RawAnchors::new(
                RawPoint::new(2.0, 3.0),
                RawPoint::new(6.0, 3.0),
                RawPoint::new(4.0, 5.0),
            )))
        }
    }

    fn drain(rx: &crate::mailbox::MailboxReceiver<DetectionMessage>) -> Vec<DetectionMessage> {
        let mut seen = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            match rx.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(message)) => seen.push(message),
                Ok(None) => {}
                Err(Closed) => break,
            }
        }
        seen
    }

    #[test]
    fn test_errors_degrade_to_not_found_and_loop_continues() {
        let (tx, rx) = mailbox();
        let source = CountingSource {
            remaining: Some(4),
            next: 0,
        };
        let mut worker = DetectorWorker::spawn(Box::new(source), Box::new(FlakyBackend), tx).unwrap();

        let seen = drain(&rx);
        worker.stop();

        assert!(!seen.is_empty());
        let last = seen.last().unwrap();
        assert_eq!(last.frame.index, 3);
        assert_eq!(last.result, DetectionResult::NotFound);
        for message in &seen {
            assert_eq!(message.result.is_found(), message.frame.index % 2 == 0);
        }
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (tx, _rx) = mailbox();
        let source = CountingSource {
            remaining: None,
            next: 0,
        };
        let mut worker = DetectorWorker::spawn(Box::new(source), Box::new(FlakyBackend), tx).unwrap();
        assert!(worker.is_running());

        worker.stop();
        worker.stop();
        assert!(!worker.is_running());
    }

    #[test]
    fn test_exits_when_receiver_dropped() {
        let (tx, rx) = mailbox();
        let source = CountingSource {
            remaining: None,
            next: 0,
        };
        let worker = DetectorWorker::spawn(Box::new(source), Box::new(FlakyBackend), tx).unwrap();
        drop(rx);

        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!worker.is_running());
    }
}
