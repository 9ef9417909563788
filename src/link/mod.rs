//! # Drone Link Module
//!
//! Trait contract for the drone-link collaborator plus the Tello UDP adapter.
//!
//! The control loop only ever talks to [`DroneLink`]; the concrete wire
//! protocol lives behind it (see [`tello`]). Telemetry is exposed as a cached
//! snapshot so reading battery or landing state never blocks a tick.

pub mod tello;

use async_trait::async_trait;

use crate::error::Result;

/// One velocity command for the drone, each component in `[-100, 100]`.
///
/// Created by the dispatcher each send cycle and handed to the link;
/// never retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VelocityCommand {
    /// Forward/backward speed (positive = forward).
    pub forward: i8,
    /// Left/right speed (positive = right).
    pub lateral: i8,
    /// Up/down speed (positive = up).
    pub vertical: i8,
    /// Rotation speed (positive = clockwise).
    pub yaw: i8,
}

impl VelocityCommand {
    /// The zero vector: hover in place.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Latest telemetry snapshot cached from the drone's state stream.
///
/// Fields are `None` until the first state datagram arrives; an absent
/// snapshot never blocks or fails the control loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct Telemetry {
    /// Battery charge in percent.
    pub battery_percent: Option<u8>,
    /// Height above the takeoff point in decimeters.
    pub height_dm: Option<i32>,
}

impl Telemetry {
    /// Whether the drone reports being on the ground.
    ///
    /// `None` while no telemetry has been received yet.
    #[must_use]
    pub fn is_landed(&self) -> Option<bool> {
        self.height_dm.map(|h| h <= 0)
    }
}

/// The drone-link collaborator.
///
/// All command methods are bounded to the documented ranges (velocity axes
/// -100..100). `send_velocity` failures surface as `CommandRejected` and are
/// dropped by the caller, not retried.
#[async_trait]
pub trait DroneLink: Send {
    /// Establishes the session with the drone.
    ///
    /// # Errors
    ///
    /// Returns `LinkUnavailable` when the drone does not answer; no flight
    /// is attempted in that case.
    async fn connect(&mut self) -> Result<()>;

    /// Sends the takeoff command and waits for acknowledgement.
    async fn takeoff(&mut self) -> Result<()>;

    /// Sends the land command and waits for acknowledgement.
    async fn land(&mut self) -> Result<()>;

    /// Sends one velocity command. Fire-and-forget on the wire.
    async fn send_velocity(&mut self, command: VelocityCommand) -> Result<()>;

    /// Asks the drone to start pushing video packets.
    async fn stream_on(&mut self) -> Result<()>;

    /// Asks the drone to stop the video stream.
    async fn stream_off(&mut self) -> Result<()>;

    /// Releases the link. Idempotent.
    async fn disconnect(&mut self) -> Result<()>;

    /// Whether a session is currently established.
    fn is_connected(&self) -> bool;

    /// Latest cached telemetry snapshot. Never blocks.
    fn telemetry(&self) -> Telemetry;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::TelloPadError;
    use std::sync::{Arc, Mutex};

    /// Every call a [`MockLink`] has received, in order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum LinkCall {
        Connect,
        Takeoff,
        Land,
        Velocity(VelocityCommand),
        StreamOn,
        StreamOff,
        Disconnect,
    }

    /// Recording drone link for testing.
    ///
    /// Clone handles share the same recorded state, so a test can keep one
    /// handle while the session owns another.
    #[derive(Clone, Default)]
    pub struct MockLink {
        pub calls: Arc<Mutex<Vec<LinkCall>>>,
        pub telemetry: Arc<Mutex<Telemetry>>,
        pub fail_connect: Arc<Mutex<bool>>,
        pub reject_velocity: Arc<Mutex<bool>>,
        connected: Arc<Mutex<bool>>,
    }

    impl MockLink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<LinkCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, wanted: &LinkCall) -> usize {
            self.calls().iter().filter(|call| *call == wanted).count()
        }

        pub fn velocity_commands(&self) -> Vec<VelocityCommand> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    LinkCall::Velocity(cmd) => Some(cmd),
                    _ => None,
                })
                .collect()
        }

        pub fn set_telemetry(&self, telemetry: Telemetry) {
            *self.telemetry.lock().unwrap() = telemetry;
        }

        fn record(&self, call: LinkCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl DroneLink for MockLink {
        async fn connect(&mut self) -> Result<()> {
            if *self.fail_connect.lock().unwrap() {
                return Err(TelloPadError::LinkUnavailable("mock".to_string()));
            }
            self.record(LinkCall::Connect);
            *self.connected.lock().unwrap() = true;
            Ok(())
        }

        async fn takeoff(&mut self) -> Result<()> {
            self.record(LinkCall::Takeoff);
            Ok(())
        }

        async fn land(&mut self) -> Result<()> {
            self.record(LinkCall::Land);
            Ok(())
        }

        async fn send_velocity(&mut self, command: VelocityCommand) -> Result<()> {
            if *self.reject_velocity.lock().unwrap() {
                return Err(TelloPadError::CommandRejected("mock".to_string()));
            }
            self.record(LinkCall::Velocity(command));
            Ok(())
        }

        async fn stream_on(&mut self) -> Result<()> {
            self.record(LinkCall::StreamOn);
            Ok(())
        }

        async fn stream_off(&mut self) -> Result<()> {
            self.record(LinkCall::StreamOff);
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<()> {
            self.record(LinkCall::Disconnect);
            *self.connected.lock().unwrap() = false;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            *self.connected.lock().unwrap()
        }

        fn telemetry(&self) -> Telemetry {
            *self.telemetry.lock().unwrap()
        }
    }
}
