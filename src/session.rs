//! # Session Controller
//!
//! Owns the session lifecycle: connect, run the control loop, land, release.
//!
//! ## Control Loop
//!
//! One tokio task ticks every `poll_interval_ms` and, per tick:
//!
//! 1. observes the shared stop flag (cooperative shutdown)
//! 2. polls the controller source; a lost device forces the landing sequence
//! 3. normalizes the raw frame and extracts rising-edge actions
//! 4. routes Capture edges to the capture coordinator and the rest through
//!    the flight state machine, executing whatever link effect it returns
//! 5. advances the state machine's elapsed-time transitions
//! 6. feeds landing confirmation from cached telemetry back into the machine
//! 7. publishes the phase snapshot for the video path
//! 8. lets the dispatcher emit at most one rate-limited velocity command
//!
//! Nothing in the loop waits on the video cadence: capture pulls a buffered
//! frame, telemetry is a cached snapshot, and phase crosses task boundaries
//! through a watch channel. Worst-case shutdown latency is one tick period
//! plus the configured landing timeout.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::controller::edge::EdgeDetector;
use crate::controller::frame::{Action, ControllerFrame};
use crate::controller::normalizer::AxisNormalizer;
use crate::controller::source::ControllerSource;
use crate::error::{Result, TelloPadError};
use crate::flight::dispatch::CommandDispatcher;
use crate::flight::state::{FlightEvent, FlightPhase, FlightStateMachine, LinkRequest};
use crate::link::DroneLink;
use crate::video::capture::CaptureCoordinator;
use crate::video::{PhotoSink, VideoSource};

/// Drives one pilot session from connect to disconnect.
pub struct Session<L, V, S>
where
    L: DroneLink,
    V: VideoSource,
    S: PhotoSink,
{
    config: Config,
    link: L,
    source: Box<dyn ControllerSource>,
    video: Option<V>,
    sink: S,

    normalizer: AxisNormalizer,
    edges: EdgeDetector,
    machine: FlightStateMachine,
    dispatcher: CommandDispatcher,
    capture: CaptureCoordinator,

    phase_tx: watch::Sender<FlightPhase>,
}

impl<L, V, S> Session<L, V, S>
where
    L: DroneLink,
    V: VideoSource,
    S: PhotoSink,
{
    /// Assembles a session from the loaded configuration and collaborators.
    ///
    /// `video` is `None` when streaming is disabled; capture edges are then
    /// no-ops.
    pub fn new(
        config: Config,
        link: L,
        source: Box<dyn ControllerSource>,
        video: Option<V>,
        sink: S,
    ) -> Self {
        let normalizer = AxisNormalizer::from_profile(config.active_profile());
        let machine = FlightStateMachine::new(
            Duration::from_millis(config.session.calibration_window_ms),
            Duration::from_millis(config.session.shutdown_timeout_ms),
            Instant::now(),
        );
        let dispatcher = CommandDispatcher::new(
            Duration::from_millis(config.session.send_interval_ms),
            config.session.speed_scale,
        );
        let capture = CaptureCoordinator::new(
            &config.session.photo_dir,
            config.session.stream_enabled,
        );
        let (phase_tx, _) = watch::channel(FlightPhase::Grounded);

        Self {
            config,
            link,
            source,
            video,
            sink,
            normalizer,
            edges: EdgeDetector::new(),
            machine,
            dispatcher,
            capture,
            phase_tx,
        }
    }

    /// A receiver observing the published flight phase.
    ///
    /// This is the only state shared with the video path; each read is a
    /// consistent snapshot.
    #[must_use]
    pub fn phase_watch(&self) -> watch::Receiver<FlightPhase> {
        self.phase_tx.subscribe()
    }

    /// Runs the session until shutdown.
    ///
    /// `stop` is the external shutdown signal; it is observed once per tick,
    /// never preemptively.
    ///
    /// # Errors
    ///
    /// - `LinkUnavailable` when the drone cannot be reached at startup
    /// - `DeviceLost` when the controller disconnected mid-session (the
    ///   drone is landed first)
    pub async fn run(mut self, stop: watch::Receiver<bool>) -> Result<()> {
        self.link.connect().await?;
        info!("Connected, pilot with '{}'", self.source.name());

        let streaming = self.config.session.stream_enabled && self.video.is_some();
        if streaming {
            if let Err(e) = self.link.stream_on().await {
                warn!("Could not enable video stream: {}", e);
            }
        }

        let device_lost = self.control_loop(stop).await;

        if self.machine.landing_timed_out() {
            let timeout = TelloPadError::LandingTimeout(self.config.session.shutdown_timeout_ms);
            warn!("{}, forcing disconnect", timeout);
        }

        if streaming {
            let _ = self.link.stream_off().await;
        }
        self.link.disconnect().await?;
        info!("Session closed");

        match device_lost {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// The tick loop. Returns the device-loss error to surface after the
    /// drone is safely down, if any.
    async fn control_loop(&mut self, stop: watch::Receiver<bool>) -> Option<TelloPadError> {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.session.poll_interval_ms));
        let mut device_lost: Option<TelloPadError> = None;
        let mut stop_observed = false;
        let mut battery_abort = false;

        loop {
            ticker.tick().await;
            let now = Instant::now();

            // Shutdown flag, observed at tick boundaries only.
            let stop_requested = *stop.borrow();
            if (stop_requested || battery_abort) && !stop_observed {
                stop_observed = true;
                let effect = self.machine.handle(FlightEvent::ShutdownRequested, now);
                self.execute(effect).await;
            }

            // Controller sample; a lost device forces the landing sequence
            // and the loop keeps ticking until the drone is down.
            let frame = if device_lost.is_some() {
                ControllerFrame::default()
            } else {
                match self.source.poll() {
                    Ok(raw) => self.normalizer.normalize_frame(&raw),
                    Err(e) => {
                        device_lost = Some(e);
                        let effect = self.machine.handle(FlightEvent::DeviceLost, now);
                        self.execute(effect).await;
                        ControllerFrame::default()
                    }
                }
            };

            let telemetry = self.link.telemetry();

            for event in self.edges.detect(&frame, now) {
                match event.action {
                    Action::Capture => self.handle_capture(),
                    Action::Takeoff => {
                        if let Some(battery) = telemetry.battery_percent {
                            if battery < self.config.drone.min_takeoff_percent {
                                warn!("Takeoff refused: battery at {}%", battery);
                                continue;
                            }
                        }
                        let effect = self.machine.handle(FlightEvent::Edge(Action::Takeoff), now);
                        self.execute(effect).await;
                    }
                    Action::Land => {
                        let effect = self.machine.handle(FlightEvent::Edge(Action::Land), now);
                        self.execute(effect).await;
                    }
                }
            }

            // Battery guards: force a landing when low, abort when critical.
            if let Some(battery) = telemetry.battery_percent {
                if battery < self.config.drone.abort_percent && !battery_abort {
                    warn!("Battery critical at {}%, shutting down", battery);
                    battery_abort = true;
                } else if battery < self.config.drone.force_land_percent
                    && self.machine.phase() == FlightPhase::Airborne
                {
                    warn!("Battery low at {}%, forcing landing", battery);
                    let effect = self.machine.handle(FlightEvent::Edge(Action::Land), now);
                    self.execute(effect).await;
                }
            }

            self.machine.tick(now);

            if self.machine.phase() == FlightPhase::Landing
                && telemetry.is_landed() == Some(true)
            {
                let effect = self.machine.handle(FlightEvent::LandedConfirmed, now);
                self.execute(effect).await;
            }

            let phase = self.machine.phase();
            self.phase_tx.send_if_modified(|current| {
                if *current == phase {
                    false
                } else {
                    *current = phase;
                    true
                }
            });

            if let Some(command) = self.dispatcher.tick(&frame, phase, now) {
                if let Err(e) = self.link.send_velocity(command).await {
                    // Dropped, not retried: the next tick has fresher input.
                    warn!("Velocity command dropped: {}", e);
                }
            }

            if phase == FlightPhase::ShuttingDown {
                return device_lost;
            }
        }
    }

    /// Executes a link effect requested by the state machine.
    async fn execute(&mut self, effect: Option<LinkRequest>) {
        let result = match effect {
            None => return,
            Some(LinkRequest::Takeoff) => self.link.takeoff().await,
            Some(LinkRequest::Land) => self.link.land().await,
        };

        if let Err(e) = result {
            warn!("Link command failed: {}", e);
        }
    }

    /// Routes a capture edge to the coordinator.
    fn handle_capture(&mut self) {
        let Some(video) = &self.video else {
            debug!("Capture ignored: no video stream attached");
            return;
        };

        match self
            .capture
            .on_capture(self.machine.phase(), video, &self.sink)
        {
            Ok(Some(_)) | Ok(None) => {}
            Err(e) => warn!("Capture failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::frame::RawFrame;
    use crate::controller::source::mocks::ScriptedSource;
    use crate::link::mocks::{LinkCall, MockLink};
    use crate::link::Telemetry;
    use crate::video::mocks::{MockSink, MockVideo};

    /// Fast timings so scenarios complete in well under a second.
    fn test_config(stream_enabled: bool) -> Config {
        let toml = format!(
            r#"
[session]
controller_profile = "test"
speed_scale = 50
stream_enabled = {stream_enabled}
send_interval_ms = 10
calibration_window_ms = 40
shutdown_timeout_ms = 80
poll_interval_ms = 1
photo_dir = "/tmp/tello-pad-test"

[drone]

[profiles.test]
vendor = 1
product = 1

[profiles.test.axes.left_x]
code = 0
[profiles.test.axes.left_y]
code = 1
[profiles.test.axes.right_x]
code = 2
[profiles.test.axes.right_y]
code = 5

[profiles.test.buttons]
takeoff = 304
land = 305
capture = 307
"#
        );
        toml::from_str(&toml).unwrap()
    }

    fn press(action: Action) -> RawFrame {
        let mut frame = RawFrame::centered(128);
        frame.set_button(action, true);
        frame
    }

    fn released() -> RawFrame {
        RawFrame::centered(128)
    }

    fn start_session(
        config: Config,
        link: MockLink,
        source: ScriptedSource,
        video: Option<MockVideo>,
        sink: MockSink,
    ) -> (
        tokio::task::JoinHandle<Result<()>>,
        watch::Sender<bool>,
        watch::Receiver<FlightPhase>,
    ) {
        let session = Session::new(config, link, Box::new(source), video, sink);
        let phases = session.phase_watch();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(session.run(stop_rx));
        (handle, stop_tx, phases)
    }

    #[tokio::test]
    async fn test_connect_failure_aborts_before_flight() {
        let link = MockLink::new();
        *link.fail_connect.lock().unwrap() = true;

        let source = ScriptedSource::new(vec![press(Action::Takeoff)]);
        let session = Session::new(
            test_config(false),
            link.clone(),
            Box::new(source),
            None::<MockVideo>,
            MockSink::new(),
        );
        let (_stop_tx, stop_rx) = watch::channel(false);

        let result = session.run(stop_rx).await;
        assert!(matches!(result, Err(TelloPadError::LinkUnavailable(_))));
        assert_eq!(link.count(&LinkCall::Takeoff), 0);
    }

    #[tokio::test]
    async fn test_takeoff_calibration_then_airborne() {
        let link = MockLink::new();
        let source = ScriptedSource::new(vec![press(Action::Takeoff), released()]);
        let (handle, stop_tx, mut phases) =
            start_session(test_config(false), link.clone(), source, None, MockSink::new());

        // Calibrating immediately after the edge, Airborne once the window
        // elapses, with exactly one takeoff command in between.
        loop {
            phases.changed().await.unwrap();
            if *phases.borrow() == FlightPhase::Airborne {
                break;
            }
            assert_eq!(*phases.borrow(), FlightPhase::Calibrating);
        }
        assert_eq!(link.count(&LinkCall::Takeoff), 1);

        stop_tx.send(true).unwrap();
        let result = handle.await.unwrap();
        assert!(result.is_ok());

        // Shutdown while airborne lands exactly once, then disconnects.
        assert_eq!(link.count(&LinkCall::Land), 1);
        assert_eq!(link.count(&LinkCall::Disconnect), 1);
    }

    #[tokio::test]
    async fn test_velocity_only_after_calibration() {
        let link = MockLink::new();
        let mut airborne_frame = released();
        airborne_frame.set_axis(crate::controller::frame::Axis::RightY, 255);

        let source = ScriptedSource::new(vec![press(Action::Takeoff), airborne_frame]);
        let (handle, stop_tx, mut phases) =
            start_session(test_config(false), link.clone(), source, None, MockSink::new());

        while *phases.borrow() != FlightPhase::Airborne {
            phases.changed().await.unwrap();
        }

        // Let a few send intervals pass while airborne.
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        // Velocity flows only once airborne: every dispatched command carries
        // the full-deflection forward value, and none precedes the takeoff.
        let calls = link.calls();
        let takeoff_at = calls
            .iter()
            .position(|call| *call == LinkCall::Takeoff)
            .unwrap();
        assert!(!calls[..takeoff_at]
            .iter()
            .any(|call| matches!(call, LinkCall::Velocity(_))));

        let commands = link.velocity_commands();
        assert!(!commands.is_empty());
        for command in &commands {
            assert_eq!(command.forward, 50);
            assert_eq!(command.yaw, 0);
        }
    }

    #[tokio::test]
    async fn test_device_lost_airborne_lands_once_then_errors() {
        let link = MockLink::new();
        // Enough polls to get airborne before the device disappears.
        let source =
            ScriptedSource::new(vec![press(Action::Takeoff), released()]).lose_device_after(100);
        let (handle, _stop_tx, mut phases) =
            start_session(test_config(false), link.clone(), source, None, MockSink::new());

        while *phases.borrow() != FlightPhase::Airborne {
            phases.changed().await.unwrap();
        }

        // No landing confirmation arrives, so the machine rides out its
        // timeout and the session surfaces the device loss.
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(TelloPadError::DeviceLost(_))));

        let calls = link.calls();
        assert_eq!(link.count(&LinkCall::Land), 1);

        // No velocity command after the forced land.
        let land_at = calls
            .iter()
            .position(|call| *call == LinkCall::Land)
            .unwrap();
        assert!(!calls[land_at..]
            .iter()
            .any(|call| matches!(call, LinkCall::Velocity(_))));
    }

    #[tokio::test]
    async fn test_landing_confirmation_short_circuits_timeout() {
        let link = MockLink::new();
        link.set_telemetry(Telemetry {
            battery_percent: Some(90),
            height_dm: Some(5),
        });

        let source = ScriptedSource::new(vec![
            press(Action::Takeoff),
            released(),
        ]);
        let (handle, stop_tx, mut phases) =
            start_session(test_config(false), link.clone(), source, None, MockSink::new());

        while *phases.borrow() != FlightPhase::Airborne {
            phases.changed().await.unwrap();
        }

        // Touchdown reported by telemetry: shutdown completes without
        // waiting for the landing timeout.
        link.set_telemetry(Telemetry {
            battery_percent: Some(90),
            height_dm: Some(0),
        });
        stop_tx.send(true).unwrap();

        let started = Instant::now();
        handle.await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_capture_with_stream_disabled_never_saves() {
        let link = MockLink::new();
        let sink = MockSink::new();
        let video = MockVideo::new();
        video.set_streaming(true);
        video.set_frame(b"frame");

        let source = ScriptedSource::new(vec![press(Action::Capture), released()]);
        let (handle, stop_tx, _phases) = start_session(
            test_config(false),
            link.clone(),
            source,
            Some(video),
            sink.clone(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        assert!(sink.saved_paths().is_empty());
        // Stream was never enabled on the link either.
        assert_eq!(link.count(&LinkCall::StreamOn), 0);
    }

    #[tokio::test]
    async fn test_capture_saves_while_streaming() {
        let link = MockLink::new();
        let sink = MockSink::new();
        let video = MockVideo::new();
        video.set_streaming(true);
        video.set_frame(b"frame");

        let source = ScriptedSource::new(vec![press(Action::Capture), released()]);
        let (handle, stop_tx, _phases) = start_session(
            test_config(true),
            link.clone(),
            source,
            Some(video),
            sink.clone(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(sink.saved_paths().len(), 1);
        assert_eq!(link.count(&LinkCall::StreamOn), 1);
        assert_eq!(link.count(&LinkCall::StreamOff), 1);
    }

    #[tokio::test]
    async fn test_takeoff_refused_on_low_battery() {
        let link = MockLink::new();
        link.set_telemetry(Telemetry {
            battery_percent: Some(7),
            height_dm: Some(0),
        });

        let source = ScriptedSource::new(vec![press(Action::Takeoff), released()]);
        let (handle, stop_tx, _phases) =
            start_session(test_config(false), link.clone(), source, None, MockSink::new());

        tokio::time::sleep(Duration::from_millis(30)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(link.count(&LinkCall::Takeoff), 0);
    }
}
