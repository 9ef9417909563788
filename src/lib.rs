//! # Tello Pad Library
//!
//! Pilot a DJI Tello drone with a game controller.
//!
//! This library turns raw gamepad input into rate-limited Tello velocity
//! commands, tracks the flight phase across takeoff, calibration, and landing,
//! and coordinates best-effort photo capture from the drone's video stream.

pub mod config;
pub mod error;
pub mod controller;
pub mod flight;
pub mod link;
pub mod session;
pub mod video;
