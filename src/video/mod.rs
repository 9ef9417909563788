//! # Video Module
//!
//! Trait contracts for the video and photo-persistence collaborators, the
//! UDP stream monitor, and the capture coordinator.
//!
//! The video path runs on its own cadence and shares nothing with the
//! control loop except the published flight phase and a pull-based frame
//! snapshot. Frame decoding and display are out of scope: a captured still
//! is the latest raw H.264 access unit as received from the drone.

pub mod capture;
pub mod stream;

use std::path::Path;
use std::time::Instant;

use bytes::Bytes;

use crate::error::Result;

/// One video frame as received from the drone (raw encoded bytes).
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw H.264 access unit.
    pub data: Bytes,
    /// When the frame finished arriving.
    pub received_at: Instant,
}

/// The video collaborator: stream liveness plus on-demand frame snapshots.
pub trait VideoSource: Send + Sync {
    /// Whether video packets are currently arriving.
    fn is_streaming(&self) -> bool;

    /// The most recent complete frame, if any has arrived yet.
    ///
    /// Pull-based and cheap; never blocks on the network.
    fn current_frame(&self) -> Option<Frame>;
}

/// The persistence collaborator for captured photos.
pub trait PhotoSink: Send {
    /// Creates the target directory if it does not exist yet.
    fn ensure_directory(&self, path: &Path) -> Result<()>;

    /// Writes one frame to the given path.
    fn save(&self, frame: &Frame, path: &Path) -> Result<()>;
}

/// Photo sink writing to the local filesystem.
#[derive(Debug, Default)]
pub struct DiskPhotoSink;

impl PhotoSink for DiskPhotoSink {
    fn ensure_directory(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    fn save(&self, frame: &Frame, path: &Path) -> Result<()> {
        std::fs::write(path, &frame.data)?;
        Ok(())
    }
}
