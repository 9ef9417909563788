//! # Controller Source
//!
//! Trait contract for physical input devices.
//!
//! The control loop calls [`ControllerSource::poll`] once per tick and
//! expects it to return without blocking; implementations sample a device
//! reader in the background and hand out the most recent snapshot. How the
//! device is enumerated and read (evdev, hidapi, ...) is an implementation
//! concern behind this trait.

use crate::controller::frame::RawFrame;
use crate::error::Result;

/// A pollable source of raw controller frames.
pub trait ControllerSource: Send {
    /// Returns the latest raw snapshot of the device state.
    ///
    /// Must not block the control loop: implementations return the most
    /// recent sample immediately.
    ///
    /// # Errors
    ///
    /// Returns [`TelloPadError::DeviceLost`](crate::error::TelloPadError::DeviceLost)
    /// once the device has disconnected; the session then forces a landing
    /// and terminates the loop.
    fn poll(&mut self) -> Result<RawFrame>;

    /// Human-readable device name for logging.
    fn name(&self) -> &str;
}
