//! # Tello Pad
//!
//! Pilot a DJI Tello drone with a game controller.
//!
//! The binary wires the concrete collaborators together: an evdev gamepad as
//! the input source, the Tello UDP link, the video stream monitor, and a
//! filesystem photo sink. The session controller owns the control loop.

use anyhow::Result;
use tokio::sync::watch;
use tracing::{info, warn};

use tello_pad::config::Config;
use tello_pad::controller::pad::EvdevPad;
use tello_pad::link::tello::TelloLink;
use tello_pad::session::Session;
use tello_pad::video::stream::{StreamMonitor, VideoHandle};
use tello_pad::video::DiskPhotoSink;

/// Configuration file path (relative to the working directory)
const CONFIG_PATH: &str = "config/default.toml";

/// Main entry point
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load and validate configuration
///    - Locate the configured game controller on evdev
///    - Bind the Tello command socket and, when streaming, the video port
///
/// 2. **Session**
///    - Run the control loop until Ctrl+C, a land-and-exit, or device loss
///
/// 3. **Graceful Shutdown**
///    - The session lands the drone first if it is airborne, then releases
///      the link; the process exits non-zero if the controller was lost
///
/// # Errors
///
/// Returns error if:
/// - Configuration is missing or invalid
/// - No matching controller device is found
/// - The drone cannot be reached
/// - The controller disconnected mid-flight
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Tello Pad v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::load(CONFIG_PATH)?;

    let pad = EvdevPad::open(config.active_profile())?;

    let link = TelloLink::bind(&config.drone).await?;

    // The monitor must outlive the session; dropping it stops the receiver.
    let monitor = if config.session.stream_enabled {
        Some(StreamMonitor::start(config.drone.video_port).await?)
    } else {
        None
    };
    let video: Option<VideoHandle> = monitor.as_ref().map(StreamMonitor::handle);

    // Ctrl+C flips the stop flag; the session observes it once per tick.
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, landing and shutting down...");
            let _ = stop_tx.send(true);
        } else {
            warn!("Could not listen for Ctrl+C");
        }
    });

    let session = Session::new(config, link, Box::new(pad), video, DiskPhotoSink);
    session.run(stop_rx).await?;

    if let Some(monitor) = monitor {
        monitor.stop();
    }

    Ok(())
}
