//! # Controller Frames
//!
//! Snapshot types flowing through the control loop.
//!
//! A [`RawFrame`] carries device-native axis readings and button booleans as
//! sampled by the controller source. The normalizer turns it into a
//! [`ControllerFrame`] with every axis bounded to `[-1.0, 1.0]`. Both are
//! created once per poll cycle, consumed within the same cycle, and discarded;
//! only the edge detector keeps the previous cycle's buttons around to compute
//! transitions.

/// Logical flight axes, independent of physical controller layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Left stick X: yaw (rotate).
    LeftX,
    /// Left stick Y: vertical (climb/descend).
    LeftY,
    /// Right stick X: lateral (strafe).
    RightX,
    /// Right stick Y: forward/backward.
    RightY,
}

impl Axis {
    /// All logical axes, in storage order.
    pub const ALL: [Axis; 4] = [Axis::LeftX, Axis::LeftY, Axis::RightX, Axis::RightY];

    /// Storage index of this axis within a frame.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Axis::LeftX => 0,
            Axis::LeftY => 1,
            Axis::RightX => 2,
            Axis::RightY => 3,
        }
    }
}

/// Discrete actions triggered by button presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start the takeoff sequence.
    Takeoff,
    /// Start the landing sequence.
    Land,
    /// Capture a still frame from the video stream.
    Capture,
}

impl Action {
    /// All actions, in storage order.
    pub const ALL: [Action; 3] = [Action::Takeoff, Action::Land, Action::Capture];

    /// Storage index of this action within a frame.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Action::Takeoff => 0,
            Action::Land => 1,
            Action::Capture => 2,
        }
    }
}

/// One poll cycle's raw controller readings.
///
/// Axis values are in the device's native span (e.g. 0-255 with 128 at rest
/// for most HID pads). Overwritten each poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    axes: [i32; 4],
    buttons: [bool; 3],
}

impl RawFrame {
    /// Creates a frame with every axis at the given rest value and all
    /// buttons released.
    #[must_use]
    pub fn centered(center: i32) -> Self {
        Self {
            axes: [center; 4],
            buttons: [false; 3],
        }
    }

    /// Raw reading for one logical axis.
    #[must_use]
    pub fn axis(&self, axis: Axis) -> i32 {
        self.axes[axis.index()]
    }

    /// Whether the button mapped to `action` is currently held.
    #[must_use]
    pub fn button(&self, action: Action) -> bool {
        self.buttons[action.index()]
    }

    /// Records a new raw reading for one logical axis.
    pub fn set_axis(&mut self, axis: Axis, value: i32) {
        self.axes[axis.index()] = value;
    }

    /// Records the held state of the button mapped to `action`.
    pub fn set_button(&mut self, action: Action, held: bool) {
        self.buttons[action.index()] = held;
    }
}

/// One poll cycle's normalized controller snapshot.
///
/// Every axis is in `[-1.0, 1.0]` with deadzone and inversion already
/// applied; immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerFrame {
    axes: [f32; 4],
    buttons: [bool; 3],
}

impl Default for ControllerFrame {
    /// A frame with all sticks at rest and all buttons released.
    fn default() -> Self {
        Self {
            axes: [0.0; 4],
            buttons: [false; 3],
        }
    }
}

impl ControllerFrame {
    /// Builds a frame from normalized axis values and button states.
    #[must_use]
    pub fn new(axes: [f32; 4], buttons: [bool; 3]) -> Self {
        Self { axes, buttons }
    }

    /// Normalized value for one logical axis, in `[-1.0, 1.0]`.
    #[must_use]
    pub fn axis(&self, axis: Axis) -> f32 {
        self.axes[axis.index()]
    }

    /// Whether the button mapped to `action` is currently held.
    #[must_use]
    pub fn button(&self, action: Action) -> bool {
        self.buttons[action.index()]
    }
}
