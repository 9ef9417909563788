//! # Flight State Machine
//!
//! Owns the flight phase and decides which inputs are honored when.
//!
//! ## Phases and Transitions
//!
//! | From | Event | To | Link effect |
//! |------|-------|----|-------------|
//! | Grounded | Takeoff edge | Calibrating | takeoff |
//! | Calibrating | calibration window elapsed | Airborne | - |
//! | Airborne | Land edge | Landing | land |
//! | Landing | landed confirmed / timeout | Grounded | - |
//! | Calibrating, Airborne | device lost / shutdown | Landing (then ShuttingDown) | land |
//! | Grounded, Landing | device lost / shutdown | ShuttingDown | - |
//!
//! During `Calibrating` all axis input and Land/Capture edges are ignored;
//! this mirrors the drone's post-takeoff sensor-settling period during which
//! it does not respond to control input. A second Takeoff while airborne or
//! a Land while grounded is a no-op, which prevents double takeoff/land
//! races and command floods before the drone is ready.
//!
//! The machine is a pure reducer: it mutates only its own phase and returns
//! the [`LinkRequest`] the caller must forward to the drone link, so every
//! transition is testable without I/O.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::controller::frame::Action;

/// High-level lifecycle state of the drone as tracked by this system
/// (not the drone's own firmware state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightPhase {
    /// On the ground, ready for takeoff.
    Grounded,
    /// Took off, waiting out the sensor-settling window; all input ignored.
    Calibrating,
    /// In the air and accepting velocity commands.
    Airborne,
    /// Land command sent, waiting for confirmation.
    Landing,
    /// Terminal: the session is tearing down.
    ShuttingDown,
}

impl FlightPhase {
    /// Whether velocity commands are honored in this phase.
    #[must_use]
    pub fn accepts_velocity(self) -> bool {
        matches!(self, FlightPhase::Airborne)
    }

    /// Whether a capture edge is honored in this phase.
    ///
    /// Calibrating explicitly ignores capture; a capture racing the landing
    /// sequence is dropped best-effort rather than synchronized.
    #[must_use]
    pub fn accepts_capture(self) -> bool {
        matches!(self, FlightPhase::Grounded | FlightPhase::Airborne)
    }

    /// Whether the drone is in the air (including the settling window).
    #[must_use]
    pub fn in_flight(self) -> bool {
        matches!(self, FlightPhase::Calibrating | FlightPhase::Airborne)
    }
}

/// Discrete events driving the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightEvent {
    /// A rising-edge controller action (Capture edges are handled by the
    /// capture coordinator and ignored here).
    Edge(Action),
    /// The drone link confirmed touchdown.
    LandedConfirmed,
    /// The controller disconnected.
    DeviceLost,
    /// External shutdown signal (ctrl-c).
    ShutdownRequested,
}

/// Side effect a transition asks the session to perform on the drone link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRequest {
    /// Send the takeoff command.
    Takeoff,
    /// Send the land command.
    Land,
}

/// The flight-phase reducer.
///
/// Singly owned by the control loop; other tasks observe the phase through
/// a watch channel published by the session, never through this struct.
#[derive(Debug)]
pub struct FlightStateMachine {
    phase: FlightPhase,
    calibration_window: Duration,
    landing_timeout: Duration,
    /// When the current Calibrating or Landing phase was entered.
    phase_entered: Instant,
    /// Set once device loss or shutdown was observed; after landing
    /// completes the machine settles in ShuttingDown instead of Grounded.
    shutdown_pending: bool,
    /// Set when Landing ended by timeout rather than confirmation.
    landing_timed_out: bool,
}

impl FlightStateMachine {
    /// Creates a machine in `Grounded`.
    ///
    /// # Arguments
    ///
    /// * `calibration_window` - post-takeoff settling period
    /// * `landing_timeout` - how long to wait for landing confirmation
    #[must_use]
    pub fn new(calibration_window: Duration, landing_timeout: Duration, now: Instant) -> Self {
        Self {
            phase: FlightPhase::Grounded,
            calibration_window,
            landing_timeout,
            phase_entered: now,
            shutdown_pending: false,
            landing_timed_out: false,
        }
    }

    /// Current flight phase.
    #[must_use]
    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    /// Whether shutdown was requested and is waiting on the landing sequence.
    #[must_use]
    pub fn shutdown_pending(&self) -> bool {
        self.shutdown_pending
    }

    /// Whether the last landing ended by timeout instead of confirmation.
    #[must_use]
    pub fn landing_timed_out(&self) -> bool {
        self.landing_timed_out
    }

    /// Processes one discrete event and returns the link effect, if any.
    pub fn handle(&mut self, event: FlightEvent, now: Instant) -> Option<LinkRequest> {
        match event {
            FlightEvent::Edge(Action::Takeoff) => self.on_takeoff_edge(now),
            FlightEvent::Edge(Action::Land) => self.on_land_edge(now),
            // Capture never changes flight phase.
            FlightEvent::Edge(Action::Capture) => None,
            FlightEvent::LandedConfirmed => self.on_landed(),
            FlightEvent::DeviceLost => {
                warn!("Controller lost, forcing landing sequence");
                self.begin_teardown(now)
            }
            FlightEvent::ShutdownRequested => {
                info!("Shutdown requested");
                self.begin_teardown(now)
            }
        }
    }

    /// Advances elapsed-time transitions; call once per control-loop tick.
    pub fn tick(&mut self, now: Instant) {
        match self.phase {
            FlightPhase::Calibrating => {
                if now.duration_since(self.phase_entered) >= self.calibration_window {
                    info!("Calibration window elapsed, accepting input");
                    self.phase = FlightPhase::Airborne;
                }
            }
            FlightPhase::Landing => {
                if now.duration_since(self.phase_entered) >= self.landing_timeout {
                    warn!(
                        "No landing confirmation within {:?}, proceeding",
                        self.landing_timeout
                    );
                    self.landing_timed_out = true;
                    self.settle_after_landing();
                }
            }
            _ => {}
        }
    }

    fn on_takeoff_edge(&mut self, now: Instant) -> Option<LinkRequest> {
        if self.phase != FlightPhase::Grounded {
            debug!("Takeoff edge ignored in {:?}", self.phase);
            return None;
        }

        info!("Takeoff");
        self.phase = FlightPhase::Calibrating;
        self.phase_entered = now;
        Some(LinkRequest::Takeoff)
    }

    fn on_land_edge(&mut self, now: Instant) -> Option<LinkRequest> {
        if self.phase != FlightPhase::Airborne {
            debug!("Land edge ignored in {:?}", self.phase);
            return None;
        }

        info!("Landing");
        self.phase = FlightPhase::Landing;
        self.phase_entered = now;
        Some(LinkRequest::Land)
    }

    fn on_landed(&mut self) -> Option<LinkRequest> {
        if self.phase == FlightPhase::Landing {
            info!("Landing confirmed");
            self.settle_after_landing();
        }
        None
    }

    /// Device loss and shutdown share one path: land first if in the air,
    /// then terminate.
    fn begin_teardown(&mut self, now: Instant) -> Option<LinkRequest> {
        self.shutdown_pending = true;

        match self.phase {
            FlightPhase::Calibrating | FlightPhase::Airborne => {
                self.phase = FlightPhase::Landing;
                self.phase_entered = now;
                Some(LinkRequest::Land)
            }
            FlightPhase::Grounded => {
                self.phase = FlightPhase::ShuttingDown;
                None
            }
            // Already landing: let the sequence finish.
            FlightPhase::Landing | FlightPhase::ShuttingDown => None,
        }
    }

    fn settle_after_landing(&mut self) {
        self.phase = if self.shutdown_pending {
            FlightPhase::ShuttingDown
        } else {
            FlightPhase::Grounded
        };
    }
}
