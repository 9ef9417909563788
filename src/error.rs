//! # Error Types
//!
//! Custom error types for Tello Pad using `thiserror`.
//!
//! The taxonomy separates flight-critical faults (device loss, unreachable link)
//! that escalate to session termination from per-tick faults (rejected command,
//! missed capture) that are logged and dropped so the next tick can recover.

use thiserror::Error;

/// Main error type for Tello Pad
#[derive(Debug, Error)]
pub enum TelloPadError {
    /// Game controller disconnected mid-session. Fatal to the control loop;
    /// the session forces a landing before terminating.
    #[error("controller lost: {0}")]
    DeviceLost(String),

    /// No matching game controller found at startup
    #[error("no controller matching the configured profile was found")]
    ControllerNotFound,

    /// Drone link unreachable at startup. Fatal, no flight is attempted.
    #[error("drone link unavailable: {0}")]
    LinkUnavailable(String),

    /// Drone rejected a command (e.g. sent while landing). Logged and dropped,
    /// never retried; the next tick supplies a fresher command.
    #[error("drone rejected command: {0}")]
    CommandRejected(String),

    /// Landing confirmation not received within the shutdown timeout
    #[error("no landing confirmation within {0} ms")]
    LandingTimeout(u64),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Tello Pad
pub type Result<T> = std::result::Result<T, TelloPadError>;
