//! # Axis Normalizer
//!
//! Maps raw device-native axis readings to bounded `[-1.0, 1.0]` values.
//!
//! Three steps, in order:
//!
//! 1. **Range mapping** — the device's native span (e.g. 0-255) is mapped
//!    linearly onto `[-1.0, 1.0]` around its center.
//! 2. **Deadzone with rescale** — a resting analog stick reports a small
//!    noisy offset; values within the symmetric deadzone `d` become exactly
//!    0.0, and values outside are rescaled with
//!    `sign(x) * (|x| - d) / (1 - d)` so the usable range still spans the
//!    full output. Without the rescale the stick would jump from 0 to `d`
//!    at the deadzone edge and lose fine control near center.
//! 3. **Inversion** — flips the sign for axes whose physical direction is
//!    opposite to the flight convention (most pads report stick-up as a
//!    low raw value).
//!
//! ## Usage
//!
//! ```
//! use tello_pad::controller::frame::Axis;
//! use tello_pad::controller::normalizer::AxisNormalizer;
//!
//! let norm = AxisNormalizer::linear(0, 255);
//!
//! assert!((norm.normalize(Axis::LeftX, 255) - 1.0).abs() < 0.001);
//! assert!((norm.normalize(Axis::LeftX, 0) - (-1.0)).abs() < 0.001);
//! ```

use crate::config::ControllerProfile;
use crate::controller::frame::{Axis, ControllerFrame, RawFrame};

/// Deadzone and inversion for one logical axis.
#[derive(Debug, Clone, Copy)]
struct AxisShape {
    deadzone: f32,
    invert: bool,
}

/// Normalizes raw axis readings into `[-1.0, 1.0]` per logical axis.
///
/// Built once from a [`ControllerProfile`] at startup; normalization is pure
/// data access afterwards.
#[derive(Debug, Clone)]
pub struct AxisNormalizer {
    center: f32,
    half_span: f32,
    shapes: [AxisShape; 4],
}

impl AxisNormalizer {
    /// Builds a normalizer from a controller profile.
    #[must_use]
    pub fn from_profile(profile: &ControllerProfile) -> Self {
        let configs = [
            profile.axes.left_x,
            profile.axes.left_y,
            profile.axes.right_x,
            profile.axes.right_y,
        ];
        let shapes = configs.map(|cfg| AxisShape {
            deadzone: cfg.deadzone.clamp(0.0, 0.25),
            invert: cfg.invert,
        });

        Self::with_shapes(profile.axis_min, profile.axis_max, shapes)
    }

    /// Builds a normalizer with no deadzone and no inversion on any axis.
    ///
    /// Mostly useful in tests.
    #[must_use]
    pub fn linear(axis_min: i32, axis_max: i32) -> Self {
        let shape = AxisShape {
            deadzone: 0.0,
            invert: false,
        };
        Self::with_shapes(axis_min, axis_max, [shape; 4])
    }

    fn with_shapes(axis_min: i32, axis_max: i32, shapes: [AxisShape; 4]) -> Self {
        let center = (axis_min as f32 + axis_max as f32) / 2.0;
        let half_span = (axis_max as f32 - axis_min as f32) / 2.0;
        Self {
            center,
            half_span,
            shapes,
        }
    }

    /// Normalizes one raw axis reading to `[-1.0, 1.0]`.
    ///
    /// Values at or inside the deadzone edge map to exactly 0.0; values
    /// outside are monotonic in the input and reach ±1.0 at the span
    /// extremes.
    #[must_use]
    pub fn normalize(&self, axis: Axis, raw: i32) -> f32 {
        let shape = self.shapes[axis.index()];

        let scaled = ((raw as f32 - self.center) / self.half_span).clamp(-1.0, 1.0);
        let shaped = apply_deadzone(scaled, shape.deadzone);

        if shape.invert {
            -shaped
        } else {
            shaped
        }
    }

    /// Normalizes a whole raw frame; button states are carried over as-is.
    #[must_use]
    pub fn normalize_frame(&self, raw: &RawFrame) -> ControllerFrame {
        let axes = Axis::ALL.map(|axis| self.normalize(axis, raw.axis(axis)));
        let buttons = crate::controller::frame::Action::ALL.map(|action| raw.button(action));
        ControllerFrame::new(axes, buttons)
    }
}

/// Applies a symmetric deadzone with linear rescale to a value in `[-1, 1]`.
#[inline]
fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    let magnitude = value.abs();
    if magnitude <= deadzone {
        0.0
    } else {
        value.signum() * (magnitude - deadzone) / (1.0 - deadzone)
    }
}
