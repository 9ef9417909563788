//! # evdev Game Pad Source
//!
//! Linux evdev implementation of [`ControllerSource`].
//!
//! ## Controller Detection
//!
//! The pad is located by scanning `/dev/input/event*` for a device whose
//! vendor/product IDs match the active controller profile. Which physical
//! axis feeds which logical flight axis, and which key codes trigger the
//! discrete actions, also come from the profile — the same binary flies with
//! a Stadia pad, a DualSense, or anything else evdev exposes, given a
//! profile table.
//!
//! ## Reading Model
//!
//! `fetch_events` blocks, so a dedicated reader thread folds events into a
//! shared [`RawFrame`] snapshot behind a mutex. [`EvdevPad::poll`] just
//! copies the snapshot, which keeps the control loop non-blocking. When the
//! read fails (controller unplugged, battery died) the thread sets a lost
//! flag and exits; the next `poll` surfaces `DeviceLost`. Dropping the pad
//! sets a stop flag the reader observes at its next wakeup.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use evdev::Device;
use tracing::{debug, info, warn};

use crate::config::ControllerProfile;
use crate::controller::frame::{Action, Axis, RawFrame};
use crate::controller::source::ControllerSource;
use crate::error::{Result, TelloPadError};

/// State shared between the reader thread and the control loop.
struct PadShared {
    frame: Mutex<RawFrame>,
    lost: AtomicBool,
    stop: AtomicBool,
}

/// Resolved profile lookups: evdev code to logical axis/action.
#[derive(Clone, Copy)]
struct PadMapping {
    axes: [(u16, Axis); 4],
    buttons: [(u16, Action); 3],
}

impl PadMapping {
    fn from_profile(profile: &ControllerProfile) -> Self {
        Self {
            axes: [
                (profile.axes.left_x.code, Axis::LeftX),
                (profile.axes.left_y.code, Axis::LeftY),
                (profile.axes.right_x.code, Axis::RightX),
                (profile.axes.right_y.code, Axis::RightY),
            ],
            buttons: [
                (profile.buttons.takeoff, Action::Takeoff),
                (profile.buttons.land, Action::Land),
                (profile.buttons.capture, Action::Capture),
            ],
        }
    }

    fn axis(&self, code: u16) -> Option<Axis> {
        self.axes
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, axis)| *axis)
    }

    fn action(&self, code: u16) -> Option<Action> {
        self.buttons
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, action)| *action)
    }
}

/// evdev-backed game pad handle
pub struct EvdevPad {
    shared: Arc<PadShared>,
    device_path: String,
    name: String,
}

impl EvdevPad {
    /// Detect and open the pad described by `profile`.
    ///
    /// Scans all `/dev/input/event*` devices for a matching vendor/product
    /// pair, then starts the background reader thread.
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: no matching device on the system
    /// - `DeviceLost`: `/dev/input` is missing or unreadable
    pub fn open(profile: &ControllerProfile) -> Result<Self> {
        let input_dir = Path::new("/dev/input");

        if !input_dir.exists() {
            return Err(TelloPadError::DeviceLost(
                "/dev/input directory not found".to_string(),
            ));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Sort for deterministic selection when several pads are connected
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            let Some(filename) = path.file_name() else {
                continue;
            };
            if !filename.to_string_lossy().starts_with("event") {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    let id = device.input_id();
                    debug!(
                        "Found input device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                        path.display(),
                        id.vendor(),
                        id.product()
                    );

                    if id.vendor() == profile.vendor && id.product() == profile.product {
                        let device_path = path.to_string_lossy().to_string();
                        let name = device
                            .name()
                            .unwrap_or("unknown controller")
                            .to_string();
                        info!("Found controller '{}' at {}", name, device_path);

                        return Ok(Self::start(device, device_path, name, profile));
                    }
                }
                Err(e) => {
                    // Permission denied or similar - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(TelloPadError::ControllerNotFound)
    }

    /// Spawns the reader thread and wraps the shared snapshot.
    fn start(
        mut device: Device,
        device_path: String,
        name: String,
        profile: &ControllerProfile,
    ) -> Self {
        let center = (profile.axis_min + profile.axis_max) / 2;
        let shared = Arc::new(PadShared {
            frame: Mutex::new(RawFrame::centered(center)),
            lost: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        });
        let mapping = PadMapping::from_profile(profile);

        let reader_shared = Arc::clone(&shared);
        let reader_path = device_path.clone();
        thread::spawn(move || loop {
            // Checked between blocking reads; set when the pad is dropped.
            if reader_shared.stop.load(Ordering::Acquire) {
                debug!("Controller reader for {} stopped", reader_path);
                return;
            }

            let events = match device.fetch_events() {
                Ok(events) => events,
                Err(e) => {
                    warn!("Controller read failed on {}: {}", reader_path, e);
                    reader_shared.lost.store(true, Ordering::Release);
                    return;
                }
            };

            let mut frame = reader_shared
                .frame
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for event in events {
                apply_event(&mut frame, &mapping, &event);
            }
        });

        Self {
            shared,
            device_path,
            name,
        }
    }

    /// The `/dev/input/eventX` path this pad was opened from.
    #[must_use]
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl Drop for EvdevPad {
    fn drop(&mut self) {
        // The reader exits at its next wakeup (event batch or read error).
        self.shared.stop.store(true, Ordering::Release);
    }
}

impl ControllerSource for EvdevPad {
    fn poll(&mut self) -> Result<RawFrame> {
        if self.shared.lost.load(Ordering::Acquire) {
            return Err(TelloPadError::DeviceLost(self.device_path.clone()));
        }

        let frame = self
            .shared
            .frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(*frame)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Folds one evdev event into the shared raw frame.
fn apply_event(frame: &mut RawFrame, mapping: &PadMapping, event: &evdev::InputEvent) {
    match event.kind() {
        evdev::InputEventKind::AbsAxis(axis) => {
            if let Some(logical) = mapping.axis(axis.0) {
                frame.set_axis(logical, event.value());
            }
        }
        evdev::InputEventKind::Key(key) => {
            if let Some(action) = mapping.action(key.code()) {
                frame.set_button(action, event.value() != 0);
            }
        }
        _ => {
            // Ignore sync events and other event types
        }
    }
}
