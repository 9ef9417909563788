//! # Video Stream Monitor
//!
//! Background task consuming the drone's raw video packets.
//!
//! The Tello pushes H.264 data to local UDP 11111 in 1460-byte chunks; a
//! shorter chunk terminates the current access unit. The monitor reassembles
//! units into [`Frame`]s and keeps only the most recent one, plus a
//! last-packet timestamp for liveness. It never decodes anything.
//!
//! The control loop and capture coordinator see the monitor through a
//! cloneable [`VideoHandle`]; every accessor takes a short-lived lock, so a
//! stalled stream can never delay command dispatch.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{Result, TelloPadError};
use crate::video::{Frame, VideoSource};

/// Size of a continuation chunk; anything shorter ends the access unit.
const VIDEO_CHUNK_SIZE: usize = 1460;

/// Stream counts as live while packets arrived within this window.
const LIVENESS_WINDOW: Duration = Duration::from_secs(1);

#[derive(Default)]
struct StreamState {
    latest: Option<Frame>,
    assembling: BytesMut,
    last_packet: Option<Instant>,
}

/// Owns the receive task for the drone's video stream.
pub struct StreamMonitor {
    state: Arc<Mutex<StreamState>>,
    task: JoinHandle<()>,
    local_addr: std::net::SocketAddr,
}

impl StreamMonitor {
    /// Binds the video port and starts receiving.
    ///
    /// # Errors
    ///
    /// Returns `LinkUnavailable` if the local video port cannot be bound.
    pub async fn start(video_port: u16) -> Result<Self> {
        let addr = format!("0.0.0.0:{}", video_port);
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|e| TelloPadError::LinkUnavailable(format!(
                "failed to bind video port {}: {}", addr, e
            )))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| TelloPadError::LinkUnavailable(e.to_string()))?;
        info!("Listening for video packets on {}", local_addr);

        let state: Arc<Mutex<StreamState>> = Arc::default();
        let task_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            loop {
                match socket.recv(&mut buf).await {
                    Ok(received) => {
                        let mut state =
                            task_state.lock().unwrap_or_else(PoisonError::into_inner);
                        ingest_chunk(&mut state, &buf[..received], Instant::now());
                    }
                    Err(e) => {
                        warn!("Video receiver stopped: {}", e);
                        return;
                    }
                }
            }
        });

        Ok(Self {
            state,
            task,
            local_addr,
        })
    }

    /// The address the monitor is actually bound to.
    #[must_use]
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// A cheap handle for liveness checks and frame snapshots.
    #[must_use]
    pub fn handle(&self) -> VideoHandle {
        VideoHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Stops the receive task.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for StreamMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Read-side view of a [`StreamMonitor`].
#[derive(Clone)]
pub struct VideoHandle {
    state: Arc<Mutex<StreamState>>,
}

impl VideoSource for VideoHandle {
    fn is_streaming(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .last_packet
            .is_some_and(|at| at.elapsed() < LIVENESS_WINDOW)
    }

    fn current_frame(&self) -> Option<Frame> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.latest.clone()
    }
}

/// Folds one UDP chunk into the assembly buffer, completing a frame when the
/// chunk is shorter than the continuation size.
fn ingest_chunk(state: &mut StreamState, chunk: &[u8], now: Instant) {
    state.last_packet = Some(now);
    state.assembling.extend_from_slice(chunk);

    if chunk.len() < VIDEO_CHUNK_SIZE {
        let data = state.assembling.split().freeze();
        state.latest = Some(Frame {
            data,
            received_at: now,
        });
    }
}
