//! # Flight Module
//!
//! Flight-safety gating between controller input and the drone link.
//!
//! This module handles:
//! - The flight-phase state machine (takeoff, calibration window, landing)
//! - Rate-limited dispatch of velocity commands while airborne

pub mod dispatch;
pub mod state;
