//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! A configuration file carries three kinds of tables:
//!
//! - `[session]` — speed scale, stream flag, the safety-critical timing values
//!   (send interval, calibration window, shutdown timeout) and the active
//!   controller profile name
//! - `[drone]` — UDP endpoints of the Tello link and battery thresholds
//! - `[profiles.<name>]` — per-controller axis/button mapping: which evdev code
//!   feeds which logical axis, its deadzone and inversion flag, and which
//!   button codes trigger takeoff/land/capture
//!
//! Profiles exist because the same logical "left stick X" is a different
//! physical axis code per controller model and OS. Resolution happens once at
//! load time; runtime lookups are plain data access.

use serde::Deserialize;
use serde::de::Error;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub session: SessionConfig,
    pub drone: DroneConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ControllerProfile>,
}

/// Session configuration
///
/// Immutable for the whole session. The timing fields are safety-critical:
/// the calibration window mirrors the drone's post-takeoff sensor settling
/// period during which it ignores control input, and the send interval keeps
/// the command rate within what the link tolerates.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Name of the `[profiles.<name>]` table to use for the controller.
    pub controller_profile: String,

    /// Stick-to-velocity scale factor (1-100).
    #[serde(default = "default_speed_scale")]
    pub speed_scale: u8,

    /// Whether to enable the video stream (photo capture requires it).
    #[serde(default = "default_stream_enabled")]
    pub stream_enabled: bool,

    /// Minimum interval between velocity commands in milliseconds.
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,

    /// Time after takeoff during which all input is ignored, in milliseconds.
    #[serde(default = "default_calibration_window_ms")]
    pub calibration_window_ms: u64,

    /// Maximum time to wait for landing confirmation on shutdown, in milliseconds.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Control loop tick period in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Directory for captured photos (created lazily on first capture).
    #[serde(default = "default_photo_dir")]
    pub photo_dir: String,
}

/// Drone link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DroneConfig {
    /// UDP address of the Tello command port.
    #[serde(default = "default_command_addr")]
    pub command_addr: String,

    /// Local address to bind the command socket to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Local UDP port the drone pushes state telemetry to.
    #[serde(default = "default_state_port")]
    pub state_port: u16,

    /// Local UDP port the drone pushes video packets to.
    #[serde(default = "default_video_port")]
    pub video_port: u16,

    /// Timeout for a command response in milliseconds.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Battery percentage below which takeoff is refused.
    #[serde(default = "default_min_takeoff_percent")]
    pub min_takeoff_percent: u8,

    /// Battery percentage below which an airborne drone is forced to land.
    #[serde(default = "default_force_land_percent")]
    pub force_land_percent: u8,

    /// Battery percentage below which the session terminates.
    #[serde(default = "default_abort_percent")]
    pub abort_percent: u8,
}

/// Per-controller axis and button mapping
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerProfile {
    /// USB vendor ID used to locate the device.
    pub vendor: u16,

    /// USB product ID used to locate the device.
    pub product: u16,

    /// Lowest raw value the device reports for an axis.
    #[serde(default = "default_axis_min")]
    pub axis_min: i32,

    /// Highest raw value the device reports for an axis.
    #[serde(default = "default_axis_max")]
    pub axis_max: i32,

    pub axes: AxisMap,
    pub buttons: ButtonMap,
}

/// Logical axis to physical axis assignments
#[derive(Debug, Deserialize, Clone)]
pub struct AxisMap {
    pub left_x: AxisConfig,
    pub left_y: AxisConfig,
    pub right_x: AxisConfig,
    pub right_y: AxisConfig,
}

/// One logical axis: physical code, deadzone, inversion
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct AxisConfig {
    /// evdev absolute axis code (e.g. 0 for ABS_X).
    pub code: u16,

    /// Symmetric deadzone as a fraction of half the axis span (0.0 to 0.25).
    #[serde(default = "default_deadzone")]
    pub deadzone: f32,

    /// Flip the sign of the normalized value.
    #[serde(default)]
    pub invert: bool,
}

/// Discrete action button assignments (evdev key codes)
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ButtonMap {
    pub takeoff: u16,
    pub land: u16,
    pub capture: u16,
}

// Default value functions
fn default_speed_scale() -> u8 { 50 }
fn default_stream_enabled() -> bool { true }
fn default_send_interval_ms() -> u64 { 50 }
fn default_calibration_window_ms() -> u64 { 3000 }
fn default_shutdown_timeout_ms() -> u64 { 5000 }
fn default_poll_interval_ms() -> u64 { 8 }
fn default_photo_dir() -> String { "./photos".to_string() }

fn default_command_addr() -> String { "192.168.10.1:8889".to_string() }
fn default_bind_addr() -> String { "0.0.0.0:8889".to_string() }
fn default_state_port() -> u16 { 8890 }
fn default_video_port() -> u16 { 11111 }
fn default_response_timeout_ms() -> u64 { 7000 }
fn default_min_takeoff_percent() -> u8 { 10 }
fn default_force_land_percent() -> u8 { 10 }
fn default_abort_percent() -> u8 { 5 }

fn default_axis_min() -> i32 { 0 }
fn default_axis_max() -> i32 { 255 }
fn default_deadzone() -> f32 { 0.1 }

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the controller profile selected by `session.controller_profile`.
    ///
    /// Validation guarantees the profile exists, so this never fails after
    /// a successful [`Config::load`].
    #[must_use]
    pub fn active_profile(&self) -> &ControllerProfile {
        &self.profiles[&self.session.controller_profile]
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if !self.profiles.contains_key(&self.session.controller_profile) {
            return Err(crate::error::TelloPadError::Config(
                toml::de::Error::custom(format!(
                    "controller_profile '{}' has no matching [profiles.{}] table",
                    self.session.controller_profile, self.session.controller_profile
                ))
            ));
        }

        if self.session.speed_scale == 0 || self.session.speed_scale > 100 {
            return Err(crate::error::TelloPadError::Config(
                toml::de::Error::custom("speed_scale must be between 1 and 100")
            ));
        }

        if self.session.send_interval_ms == 0 || self.session.send_interval_ms > 1000 {
            return Err(crate::error::TelloPadError::Config(
                toml::de::Error::custom("send_interval_ms must be between 1 and 1000")
            ));
        }

        if self.session.calibration_window_ms == 0 || self.session.calibration_window_ms > 30000 {
            return Err(crate::error::TelloPadError::Config(
                toml::de::Error::custom("calibration_window_ms must be between 1 and 30000")
            ));
        }

        if self.session.shutdown_timeout_ms == 0 || self.session.shutdown_timeout_ms > 60000 {
            return Err(crate::error::TelloPadError::Config(
                toml::de::Error::custom("shutdown_timeout_ms must be between 1 and 60000")
            ));
        }

        if self.session.poll_interval_ms == 0 || self.session.poll_interval_ms > 100 {
            return Err(crate::error::TelloPadError::Config(
                toml::de::Error::custom("poll_interval_ms must be between 1 and 100")
            ));
        }

        if self.session.stream_enabled && self.session.photo_dir.is_empty() {
            return Err(crate::error::TelloPadError::Config(
                toml::de::Error::custom("photo_dir cannot be empty when stream_enabled")
            ));
        }

        if self.drone.command_addr.is_empty() {
            return Err(crate::error::TelloPadError::Config(
                toml::de::Error::custom("command_addr cannot be empty")
            ));
        }

        if self.drone.response_timeout_ms == 0 || self.drone.response_timeout_ms > 30000 {
            return Err(crate::error::TelloPadError::Config(
                toml::de::Error::custom("response_timeout_ms must be between 1 and 30000")
            ));
        }

        for (name, value) in [
            ("min_takeoff_percent", self.drone.min_takeoff_percent),
            ("force_land_percent", self.drone.force_land_percent),
            ("abort_percent", self.drone.abort_percent),
        ] {
            if value > 100 {
                return Err(crate::error::TelloPadError::Config(
                    toml::de::Error::custom(format!("{} must be between 0 and 100", name))
                ));
            }
        }

        if self.drone.abort_percent > self.drone.force_land_percent {
            return Err(crate::error::TelloPadError::Config(
                toml::de::Error::custom("abort_percent must not exceed force_land_percent")
            ));
        }

        for (name, profile) in &self.profiles {
            profile.validate(name)?;
        }

        Ok(())
    }
}

impl ControllerProfile {
    fn validate(&self, name: &str) -> Result<()> {
        if self.axis_min >= self.axis_max {
            return Err(crate::error::TelloPadError::Config(
                toml::de::Error::custom(format!(
                    "profiles.{}: axis_min must be less than axis_max", name
                ))
            ));
        }

        for (axis, cfg) in [
            ("left_x", self.axes.left_x),
            ("left_y", self.axes.left_y),
            ("right_x", self.axes.right_x),
            ("right_y", self.axes.right_y),
        ] {
            if !(0.0..=0.25).contains(&cfg.deadzone) {
                return Err(crate::error::TelloPadError::Config(
                    toml::de::Error::custom(format!(
                        "profiles.{}.axes.{}: deadzone must be between 0.0 and 0.25",
                        name, axis
                    ))
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_toml() -> &'static str {
        r#"
[session]
controller_profile = "stadia"

[drone]

[profiles.stadia]
vendor = 0x18d1
product = 0x9400

[profiles.stadia.axes.left_x]
code = 0
[profiles.stadia.axes.left_y]
code = 1
invert = true
[profiles.stadia.axes.right_x]
code = 2
[profiles.stadia.axes.right_y]
code = 5
invert = true

[profiles.stadia.buttons]
takeoff = 304
land = 305
capture = 307
"#
    }

    fn create_valid_config() -> Config {
        toml::from_str(valid_toml()).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = create_valid_config();
        assert_eq!(config.session.speed_scale, 50);
        assert!(config.session.stream_enabled);
        assert_eq!(config.session.send_interval_ms, 50);
        assert_eq!(config.session.calibration_window_ms, 3000);
        assert_eq!(config.session.shutdown_timeout_ms, 5000);
        assert_eq!(config.session.poll_interval_ms, 8);
        assert_eq!(config.drone.command_addr, "192.168.10.1:8889");
        assert_eq!(config.drone.state_port, 8890);
        assert_eq!(config.drone.video_port, 11111);
    }

    #[test]
    fn test_valid_config_passes_validation() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_active_profile() {
        let config = create_valid_config();
        let profile = config.active_profile();
        assert_eq!(profile.vendor, 0x18d1);
        assert_eq!(profile.buttons.takeoff, 304);
        assert_eq!(profile.axes.left_x.code, 0);
        assert!(profile.axes.left_y.invert);
    }

    #[test]
    fn test_missing_profile() {
        let mut config = create_valid_config();
        config.session.controller_profile = "xbox".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_speed_scale_zero() {
        let mut config = create_valid_config();
        config.session.speed_scale = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_speed_scale_too_high() {
        let mut config = create_valid_config();
        config.session.speed_scale = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_send_interval_zero() {
        let mut config = create_valid_config();
        config.session.send_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_calibration_window_too_high() {
        let mut config = create_valid_config();
        config.session.calibration_window_ms = 30001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shutdown_timeout_zero() {
        let mut config = create_valid_config();
        config.session.shutdown_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_too_high() {
        let mut config = create_valid_config();
        config.session.poll_interval_ms = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_photo_dir_when_streaming() {
        let mut config = create_valid_config();
        config.session.stream_enabled = true;
        config.session.photo_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_photo_dir_when_not_streaming() {
        let mut config = create_valid_config();
        config.session.stream_enabled = false;
        config.session.photo_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_abort_above_force_land() {
        let mut config = create_valid_config();
        config.drone.abort_percent = 20;
        config.drone.force_land_percent = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deadzone_out_of_range() {
        let mut config = create_valid_config();
        config.profiles.get_mut("stadia").unwrap().axes.left_x.deadzone = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_axis_span_inverted() {
        let mut config = create_valid_config();
        let profile = config.profiles.get_mut("stadia").unwrap();
        profile.axis_min = 255;
        profile.axis_max = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(valid_toml().as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/tello-pad.toml");
        assert!(result.is_err());
    }
}
