//! # Command Dispatcher
//!
//! Turns the latest accepted controller frame into a drone velocity command.
//!
//! Two gates sit in front of every send:
//!
//! - **Phase gate** — commands are produced only while `Airborne`. Grounded,
//!   Calibrating, and Landing all suppress output entirely.
//! - **Rate limit** — at least `send_interval` must have elapsed since the
//!   previous command; the link rejects or queues anything faster.
//!
//! Ticks arriving inside the interval are dropped, not queued: when the
//! interval elapses the *current* frame's values are used (latest-value-wins),
//! because dispatching a stale stick position would make the drone feel laggy
//! and unsafe.

use std::time::{Duration, Instant};

use crate::controller::frame::{Axis, ControllerFrame};
use crate::flight::state::FlightPhase;
use crate::link::VelocityCommand;

/// Rate-limited velocity command producer.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, Instant};
/// use tello_pad::controller::frame::ControllerFrame;
/// use tello_pad::flight::dispatch::CommandDispatcher;
/// use tello_pad::flight::state::FlightPhase;
///
/// let mut dispatcher = CommandDispatcher::new(Duration::from_millis(50), 60);
/// let frame = ControllerFrame::default();
///
/// // Grounded: suppressed regardless of input.
/// assert!(dispatcher.tick(&frame, FlightPhase::Grounded, Instant::now()).is_none());
/// ```
#[derive(Debug)]
pub struct CommandDispatcher {
    send_interval: Duration,
    speed_scale: u8,
    last_sent: Option<Instant>,
}

impl CommandDispatcher {
    /// Creates a dispatcher.
    ///
    /// # Arguments
    ///
    /// * `send_interval` - minimum spacing between emitted commands
    /// * `speed_scale` - stick-to-velocity factor (1-100)
    #[must_use]
    pub fn new(send_interval: Duration, speed_scale: u8) -> Self {
        Self {
            send_interval,
            speed_scale: speed_scale.clamp(1, 100),
            last_sent: None,
        }
    }

    /// Produces a velocity command if the phase and rate gates allow it.
    ///
    /// Returns `None` whenever the phase is not `Airborne` or the interval
    /// has not yet elapsed.
    pub fn tick(
        &mut self,
        frame: &ControllerFrame,
        phase: FlightPhase,
        now: Instant,
    ) -> Option<VelocityCommand> {
        if !phase.accepts_velocity() {
            return None;
        }

        if let Some(last) = self.last_sent {
            if now.duration_since(last) < self.send_interval {
                return None;
            }
        }

        self.last_sent = Some(now);
        Some(VelocityCommand {
            forward: self.scale(frame.axis(Axis::RightY)),
            lateral: self.scale(frame.axis(Axis::RightX)),
            vertical: self.scale(frame.axis(Axis::LeftY)),
            yaw: self.scale(frame.axis(Axis::LeftX)),
        })
    }

    /// Scales a normalized axis to a bounded integer velocity component.
    fn scale(&self, value: f32) -> i8 {
        let scaled = (value * f32::from(self.speed_scale)).round();
        scaled.clamp(-100.0, 100.0) as i8
    }
}
