//! # Tello UDP Link
//!
//! [`DroneLink`] adapter for the DJI Tello text command protocol.
//!
//! ## Protocol
//!
//! The drone listens for ASCII commands on UDP 8889 and answers `ok` or
//! `error ...` on the same socket. Velocity is the `rc a b c d` command
//! (roll, pitch, throttle, yaw), which the drone does not acknowledge.
//! Once a session is opened with `command`, the drone pushes a state
//! datagram (`pitch:0;roll:0;...;bat:87;...;h:0;...`) to local UDP 8890
//! several times a second; a background task caches the fields the session
//! cares about (battery, height) so reads never touch the network.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DroneConfig;
use crate::error::{Result, TelloPadError};
use crate::link::{DroneLink, Telemetry, VelocityCommand};

/// Tello drone link over UDP
pub struct TelloLink {
    socket: UdpSocket,
    response_timeout: Duration,
    state_port: u16,
    connected: bool,
    telemetry: Arc<Mutex<Telemetry>>,
    state_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TelloLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelloLink")
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

impl TelloLink {
    /// Binds the command socket and targets the configured drone address.
    ///
    /// No traffic is exchanged until [`DroneLink::connect`].
    ///
    /// # Errors
    ///
    /// Returns `LinkUnavailable` if the local socket cannot be bound or the
    /// drone address is invalid.
    pub async fn bind(config: &DroneConfig) -> Result<Self> {
        let socket = UdpSocket::bind(&config.bind_addr)
            .await
            .map_err(|e| TelloPadError::LinkUnavailable(format!(
                "failed to bind {}: {}", config.bind_addr, e
            )))?;

        socket
            .connect(&config.command_addr)
            .await
            .map_err(|e| TelloPadError::LinkUnavailable(format!(
                "invalid drone address {}: {}", config.command_addr, e
            )))?;

        Ok(Self {
            socket,
            response_timeout: Duration::from_millis(config.response_timeout_ms),
            state_port: config.state_port,
            connected: false,
            telemetry: Arc::new(Mutex::new(Telemetry::default())),
            state_task: None,
        })
    }

    /// Sends one command and waits for the drone's response.
    async fn request(&mut self, command: &str) -> Result<String> {
        debug!("-> {}", command);
        self.socket
            .send(command.as_bytes())
            .await
            .map_err(|e| TelloPadError::CommandRejected(format!("{}: {}", command, e)))?;

        let mut buf = [0u8; 1024];
        let received = tokio::time::timeout(self.response_timeout, self.socket.recv(&mut buf))
            .await
            .map_err(|_| {
                TelloPadError::CommandRejected(format!("no response to '{}'", command))
            })?
            .map_err(|e| TelloPadError::CommandRejected(format!("{}: {}", command, e)))?;

        let response = String::from_utf8_lossy(&buf[..received]).trim().to_string();
        debug!("<- {}", response);

        if response.to_ascii_lowercase().starts_with("error") {
            return Err(TelloPadError::CommandRejected(format!(
                "'{}' answered '{}'", command, response
            )));
        }

        Ok(response)
    }

    /// Starts the state-datagram listener task.
    async fn spawn_state_listener(&mut self) {
        let addr = format!("0.0.0.0:{}", self.state_port);
        let socket = match UdpSocket::bind(&addr).await {
            Ok(socket) => socket,
            Err(e) => {
                // Telemetry is best-effort; flying without it is allowed.
                warn!("Could not bind state port {}: {}", addr, e);
                return;
            }
        };

        let telemetry = Arc::clone(&self.telemetry);
        self.state_task = Some(tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            loop {
                match socket.recv(&mut buf).await {
                    Ok(received) => {
                        let datagram = String::from_utf8_lossy(&buf[..received]);
                        let parsed = parse_state(&datagram);
                        let mut cached =
                            telemetry.lock().unwrap_or_else(PoisonError::into_inner);
                        if parsed.battery_percent.is_some() {
                            cached.battery_percent = parsed.battery_percent;
                        }
                        if parsed.height_dm.is_some() {
                            cached.height_dm = parsed.height_dm;
                        }
                    }
                    Err(e) => {
                        warn!("State listener stopped: {}", e);
                        return;
                    }
                }
            }
        }));
    }
}

#[async_trait]
impl DroneLink for TelloLink {
    async fn connect(&mut self) -> Result<()> {
        self.spawn_state_listener().await;

        // "command" switches the drone into SDK mode.
        self.request("command")
            .await
            .map_err(|e| TelloPadError::LinkUnavailable(e.to_string()))?;

        self.connected = true;
        info!("Drone link established");
        Ok(())
    }

    async fn takeoff(&mut self) -> Result<()> {
        self.request("takeoff").await.map(|_| ())
    }

    async fn land(&mut self) -> Result<()> {
        self.request("land").await.map(|_| ())
    }

    async fn send_velocity(&mut self, command: VelocityCommand) -> Result<()> {
        // The drone does not acknowledge rc commands.
        let wire = format!(
            "rc {} {} {} {}",
            command.lateral, command.forward, command.vertical, command.yaw
        );
        self.socket
            .send(wire.as_bytes())
            .await
            .map_err(|e| TelloPadError::CommandRejected(format!("{}: {}", wire, e)))?;
        Ok(())
    }

    async fn stream_on(&mut self) -> Result<()> {
        self.request("streamon").await.map(|_| ())
    }

    async fn stream_off(&mut self) -> Result<()> {
        self.request("streamoff").await.map(|_| ())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.connected {
            // Neutral sticks before letting go of the session.
            let _ = self.socket.send(b"rc 0 0 0 0").await;
            self.connected = false;
        }

        if let Some(task) = self.state_task.take() {
            task.abort();
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn telemetry(&self) -> Telemetry {
        *self
            .telemetry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Parses a Tello state datagram into the fields the session uses.
///
/// Unknown or malformed fields are skipped; the datagram format is
/// `key:value;key:value;...`.
fn parse_state(datagram: &str) -> Telemetry {
    let mut telemetry = Telemetry::default();

    for field in datagram.trim().split(';') {
        let Some((key, value)) = field.split_once(':') else {
            continue;
        };
        match key {
            "bat" => telemetry.battery_percent = value.trim().parse().ok(),
            "h" => telemetry.height_dm = value.trim().parse().ok(),
            _ => {}
        }
    }

    telemetry
}
