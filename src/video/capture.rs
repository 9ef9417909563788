//! # Capture Coordinator
//!
//! Handles Capture edge events: pull the current frame from the video
//! collaborator and hand it to the persistence collaborator.
//!
//! Capture is strictly best-effort and must never stall the control loop:
//!
//! - stream disabled → no-op (there is no capture without an active stream)
//! - phase is Calibrating or Landing → dropped
//! - no live stream or no frame buffered yet → dropped, not retried
//!
//! The target directory is created lazily, once, on the first successful
//! capture attempt. Filenames derive from the capture timestamp.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info};

use crate::error::Result;
use crate::flight::state::FlightPhase;
use crate::video::{PhotoSink, VideoSource};

/// Coordinates photo capture between the video and persistence collaborators.
#[derive(Debug)]
pub struct CaptureCoordinator {
    photo_dir: PathBuf,
    stream_enabled: bool,
    dir_ready: bool,
}

impl CaptureCoordinator {
    /// Creates a coordinator targeting `photo_dir`.
    #[must_use]
    pub fn new<P: AsRef<Path>>(photo_dir: P, stream_enabled: bool) -> Self {
        Self {
            photo_dir: photo_dir.as_ref().to_path_buf(),
            stream_enabled,
            dir_ready: false,
        }
    }

    /// Handles one Capture edge event.
    ///
    /// Returns the path of the saved photo, or `None` when the event was
    /// dropped (stream disabled, phase gate, no frame available).
    ///
    /// # Errors
    ///
    /// Returns an error only when persistence itself fails; the caller logs
    /// it and carries on, a failed capture never aborts the session.
    pub fn on_capture(
        &mut self,
        phase: FlightPhase,
        video: &dyn VideoSource,
        sink: &dyn PhotoSink,
    ) -> Result<Option<PathBuf>> {
        if !self.stream_enabled {
            debug!("Capture ignored: stream disabled");
            return Ok(None);
        }

        if !phase.accepts_capture() {
            debug!("Capture dropped in {:?}", phase);
            return Ok(None);
        }

        if !video.is_streaming() {
            debug!("Capture dropped: stream not live");
            return Ok(None);
        }

        let Some(frame) = video.current_frame() else {
            debug!("Capture dropped: no frame buffered yet");
            return Ok(None);
        };

        if !self.dir_ready {
            sink.ensure_directory(&self.photo_dir)?;
            self.dir_ready = true;
        }

        let filename = format!("photo_{}.h264", Local::now().format("%Y%m%d_%H%M%S_%3f"));
        let path = self.photo_dir.join(filename);
        sink.save(&frame, &path)?;
        info!("Captured photo: {}", path.display());

        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::mocks::{MockSink, MockVideo};

    fn live_video() -> MockVideo {
        let video = MockVideo::new();
        video.set_streaming(true);
        video.set_frame(b"\x00\x00\x00\x01nal");
        video
    }

    #[test]
    fn test_capture_saves_while_airborne() {
        let mut coordinator = CaptureCoordinator::new("/tmp/photos", true);
        let video = live_video();
        let sink = MockSink::new();

        let saved = coordinator
            .on_capture(FlightPhase::Airborne, &video, &sink)
            .unwrap();

        let path = saved.unwrap();
        assert!(path.starts_with("/tmp/photos"));
        assert_eq!(sink.saved_paths(), vec![path]);
    }

    #[test]
    fn test_stream_disabled_is_noop() {
        let mut coordinator = CaptureCoordinator::new("/tmp/photos", false);
        let video = live_video();
        let sink = MockSink::new();

        let saved = coordinator
            .on_capture(FlightPhase::Airborne, &video, &sink)
            .unwrap();

        assert!(saved.is_none());
        assert!(sink.saved_paths().is_empty());
        assert!(sink.ensured_paths().is_empty());
    }

    #[test]
    fn test_capture_dropped_while_calibrating() {
        let mut coordinator = CaptureCoordinator::new("/tmp/photos", true);
        let video = live_video();
        let sink = MockSink::new();

        let saved = coordinator
            .on_capture(FlightPhase::Calibrating, &video, &sink)
            .unwrap();

        assert!(saved.is_none());
        assert!(sink.saved_paths().is_empty());
    }

    #[test]
    fn test_capture_dropped_while_landing() {
        let mut coordinator = CaptureCoordinator::new("/tmp/photos", true);
        let video = live_video();
        let sink = MockSink::new();

        let saved = coordinator
            .on_capture(FlightPhase::Landing, &video, &sink)
            .unwrap();

        assert!(saved.is_none());
    }

    #[test]
    fn test_capture_miss_when_no_frame() {
        let mut coordinator = CaptureCoordinator::new("/tmp/photos", true);
        let video = MockVideo::new();
        video.set_streaming(true);
        let sink = MockSink::new();

        let saved = coordinator
            .on_capture(FlightPhase::Airborne, &video, &sink)
            .unwrap();

        assert!(saved.is_none());
        assert!(sink.saved_paths().is_empty());
    }

    #[test]
    fn test_capture_dropped_when_stream_not_live() {
        let mut coordinator = CaptureCoordinator::new("/tmp/photos", true);
        let video = MockVideo::new();
        video.set_frame(b"stale");
        let sink = MockSink::new();

        let saved = coordinator
            .on_capture(FlightPhase::Airborne, &video, &sink)
            .unwrap();

        assert!(saved.is_none());
    }

    #[test]
    fn test_directory_is_created_once() {
        let mut coordinator = CaptureCoordinator::new("/tmp/photos", true);
        let video = live_video();
        let sink = MockSink::new();

        coordinator
            .on_capture(FlightPhase::Airborne, &video, &sink)
            .unwrap();
        coordinator
            .on_capture(FlightPhase::Airborne, &video, &sink)
            .unwrap();

        assert_eq!(sink.ensured_paths().len(), 1);
        assert_eq!(sink.saved_paths().len(), 2);
    }

    #[test]
    fn test_capture_to_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        let photo_dir = dir.path().join("photos");
        let mut coordinator = CaptureCoordinator::new(&photo_dir, true);
        let video = live_video();
        let sink = crate::video::DiskPhotoSink;

        let saved = coordinator
            .on_capture(FlightPhase::Grounded, &video, &sink)
            .unwrap()
            .unwrap();

        assert!(saved.exists());
        assert_eq!(std::fs::read(&saved).unwrap(), b"\x00\x00\x00\x01nal");
    }
}
