//! # Edge Detector
//!
//! Converts held button booleans into discrete rising-edge events.
//!
//! Takeoff, land, and capture are single, discrete triggers; a button held
//! across many poll cycles must fire exactly once. The detector keeps the
//! previous cycle's button states and emits a [`ButtonEdgeEvent`] only on a
//! released-to-held transition, independently per action. Releases never
//! produce events.

use std::time::Instant;

use crate::controller::frame::{Action, ControllerFrame};

/// A single rising-edge event for one action.
///
/// Created only on a 0→1 transition; consumed once and never replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEdgeEvent {
    /// The action whose button was just pressed.
    pub action: Action,
    /// When the edge was observed.
    pub at: Instant,
}

/// Detects rising edges across consecutive controller frames.
///
/// # Examples
///
/// ```
/// use std::time::Instant;
/// use tello_pad::controller::edge::EdgeDetector;
/// use tello_pad::controller::frame::{Action, ControllerFrame};
///
/// let mut detector = EdgeDetector::new();
///
/// let frame = ControllerFrame::default();
/// assert!(detector.detect(&frame, Instant::now()).is_empty());
/// ```
#[derive(Debug, Default)]
pub struct EdgeDetector {
    previous: [bool; 3],
}

impl EdgeDetector {
    /// Creates a detector that treats all buttons as initially released.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares `frame` against the previous cycle and returns rising edges.
    ///
    /// Returns between zero and three events, one per action at most. The
    /// frame's button states become the new previous states.
    pub fn detect(&mut self, frame: &ControllerFrame, now: Instant) -> Vec<ButtonEdgeEvent> {
        let mut events = Vec::new();

        for action in Action::ALL {
            let held = frame.button(action);
            if held && !self.previous[action.index()] {
                events.push(ButtonEdgeEvent { action, at: now });
            }
            self.previous[action.index()] = held;
        }

        events
    }
}
