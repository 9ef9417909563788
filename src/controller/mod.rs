//! # Controller Module
//!
//! Game controller input handling.
//!
//! This module handles:
//! - Pad detection and connection via evdev, driven by a controller profile
//! - Sampling raw axis/button state once per control-loop tick
//! - Normalizing noisy analog readings into bounded `[-1, 1]` values
//! - Turning button holds into discrete rising-edge action events

pub mod edge;
pub mod frame;
pub mod normalizer;
pub mod pad;
pub mod source;
