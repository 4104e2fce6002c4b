//! Remote drive controller, the receiver running on each vehicle.
//!
//! The controller is a single loop around a UDP receive with a timeout. The timeout is both the
//! scheduler and the safety watchdog:
//!
//! - a telemetry packet `"<x>,<y>"` is turned into a [`MotorCommand`] and written immediately
//! - a `"WIN"` packet raises the speed ceiling by one ramp step
//! - anything that does not parse is dropped without touching any state
//! - if no valid telemetry arrived within the watchdog timeout (200ms), both motors are stopped
//!
//! Turning a stick into motor values goes through [`drive_command`]:
//!
//! 1. deadzone, per axis
//! 2. sign-preserving cubic curve `v³`, for precision around the center
//! 3. arcade mixing `left = y + x`, `right = y - x`, with the turn damped to 80% when `|y| > 0.5`
//! 4. scaling by the ramp ceiling `min(1, base_floor + wins * step)`
//! 5. per-side flip and trim, then clamping to `[-1, 1]`

use std::io;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, info, instrument, trace, warn};

use crate::configuration::{Calibration, VehicleConfig};
use crate::wire::{Axes, Message};

pub mod outputs;

pub use outputs::MotorOutputs;

/// Throttle magnitude above which steering is damped.
const FAST_THROTTLE: f32 = 0.5;
/// Share of the turn kept at high throttle.
const FAST_TURN_GAIN: f32 = 0.8;

/// Left and right motor values, both in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorCommand {
    /// Left side.
    pub left: f32,
    /// Right side.
    pub right: f32,
}

impl MotorCommand {
    /// Both motors stopped.
    pub const STOP: MotorCommand = MotorCommand {
        left: 0.0,
        right: 0.0,
    };
}

/// Speed ramp earned by winning rounds. Never reset while the controller runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampState {
    base_floor: f32,
    step: f32,
    wins: u32,
}

impl RampState {
    /// No wins yet.
    pub fn new(base_floor: f32, step: f32) -> Self {
        Self {
            base_floor,
            step,
            wins: 0,
        }
    }

    /// Count one more win.
    pub fn record_win(&mut self) {
        self.wins = self.wins.saturating_add(1);
    }

    /// Wins counted so far.
    pub fn wins(&self) -> u32 {
        self.wins
    }

    /// Highest command magnitude currently allowed, never above 1.
    pub fn ceiling(&self) -> f32 {
        (self.base_floor + self.wins as f32 * self.step).min(1.0)
    }
}

/// `v³`, which keeps the sign of `v`.
pub fn response_curve(v: f32) -> f32 {
    v * v * v
}

/// Arcade mixing of a (curved) stick into raw left/right values.
pub fn arcade_mix(axes: Axes) -> (f32, f32) {
    let Axes { x, y } = axes;
    let turn = if y.abs() > FAST_THROTTLE {
        x * FAST_TURN_GAIN
    } else {
        x
    };
    (y + turn, y - turn)
}

/// Full stick-to-motor pipeline.
pub fn drive_command(
    axes: Axes,
    deadzone: f32,
    ceiling: f32,
    calibration: &Calibration,
) -> MotorCommand {
    let axes = axes.with_deadzone(deadzone);
    let curved = Axes {
        x: response_curve(axes.x),
        y: response_curve(axes.y),
    };
    let (left, right) = arcade_mix(curved);

    let left = left * ceiling * calibration.left_flip * calibration.left_trim;
    let right = right * ceiling * calibration.right_flip * calibration.right_trim;
    MotorCommand {
        left: left.clamp(-1.0, 1.0),
        right: right.clamp(-1.0, 1.0),
    }
}

/// Fail-stop timer, fed by every valid telemetry packet.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    timeout: Duration,
    last_feed: Instant,
    tripped: bool,
}

impl Watchdog {
    /// Watchdog armed at `now`.
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_feed: now,
            tripped: false,
        }
    }

    /// Valid telemetry arrived.
    pub fn feed(&mut self, now: Instant) {
        self.last_feed = now;
        self.tripped = false;
    }

    /// Time left before the watchdog trips.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.timeout
            .saturating_sub(now.saturating_duration_since(self.last_feed))
    }

    /// True if the vehicle has been silent for the whole timeout.
    ///
    /// When it trips, the timer restarts so that the stop is repeated once per timeout for as
    /// long as the silence lasts.
    pub fn check(&mut self, now: Instant) -> bool {
        if self.remaining(now).is_zero() {
            self.last_feed = now;
            self.tripped = true;
            true
        } else {
            false
        }
    }

    /// True between a trip and the next feed.
    pub fn is_tripped(&self) -> bool {
        self.tripped
    }
}

/// The per-vehicle receiver.
pub struct DriveController {
    config: VehicleConfig,
    ramp: RampState,
    watchdog: Watchdog,
}

impl DriveController {
    /// Create a controller with no wins.
    pub fn new(config: VehicleConfig) -> Self {
        Self {
            ramp: RampState::new(config.base_floor, config.ramp_step),
            watchdog: Watchdog::new(config.watchdog_timeout, Instant::now()),
            config,
        }
    }

    /// Current speed ramp.
    pub fn ramp(&self) -> &RampState {
        &self.ramp
    }

    /// Handle one datagram received at `now`.
    ///
    /// Returns the command to write for telemetry, `None` otherwise.
    pub fn handle_datagram(&mut self, payload: &[u8], now: Instant) -> Option<MotorCommand> {
        match Message::parse(payload) {
            Ok(Message::Win) => {
                self.ramp.record_win();
                info!(
                    team = %self.config.team,
                    wins = self.ramp.wins(),
                    ceiling = self.ramp.ceiling(),
                    "LEVEL UP"
                );
                None
            }
            Ok(Message::Telemetry(axes)) => {
                if self.watchdog.is_tripped() {
                    info!("link restored");
                }
                self.watchdog.feed(now);
                let command = drive_command(
                    axes,
                    self.config.deadzone,
                    self.ramp.ceiling(),
                    &self.config.calibration,
                );
                trace!(?axes, ?command);
                Some(command)
            }
            Err(e) => {
                debug!("dropped datagram: {e:#}");
                None
            }
        }
    }

    /// Stop command if the watchdog trips at `now`.
    pub fn poll_watchdog(&mut self, now: Instant) -> Option<MotorCommand> {
        let was_tripped = self.watchdog.is_tripped();
        if self.watchdog.check(now) {
            if !was_tripped {
                warn!(
                    timeout = ?self.config.watchdog_timeout,
                    "no telemetry, stopping motors"
                );
            }
            Some(MotorCommand::STOP)
        } else {
            None
        }
    }

    /// Hold the outputs neutral for the arming delay.
    pub fn arm<O: MotorOutputs>(&mut self, outputs: &mut O) -> anyhow::Result<()> {
        info!(team = %self.config.team, "arming");
        outputs.write(MotorCommand::STOP)?;
        thread::sleep(self.config.arm_delay);
        self.watchdog.feed(Instant::now());
        info!(team = %self.config.team, "link online");
        Ok(())
    }

    /// Receive and drive until `running` is cleared, then stop the motors.
    ///
    /// # Errors
    /// Returned when the socket cannot be configured or an output cannot be written.
    #[instrument(skip_all, fields(team = %self.config.team))]
    pub fn run<O: MotorOutputs>(
        &mut self,
        socket: &UdpSocket,
        outputs: &mut O,
        running: &AtomicBool,
    ) -> anyhow::Result<()> {
        let result = self.receive_loop(socket, outputs, running);
        // whatever happened, leave the vehicle stopped
        let stopped = outputs.write(MotorCommand::STOP);
        info!("receiver stopped");
        result.and(stopped)
    }

    fn receive_loop<O: MotorOutputs>(
        &mut self,
        socket: &UdpSocket,
        outputs: &mut O,
        running: &AtomicBool,
    ) -> anyhow::Result<()> {
        let mut buf = [0u8; 1024];
        while running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if let Some(stop) = self.poll_watchdog(now) {
                outputs.write(stop)?;
            }

            // a zero timeout is rejected by set_read_timeout
            let timeout = self
                .watchdog
                .remaining(now)
                .max(Duration::from_millis(1));
            socket
                .set_read_timeout(Some(timeout))
                .context("could not set receive timeout")?;

            match socket.recv_from(&mut buf) {
                Ok((n, _from)) => {
                    if let Some(command) = self.handle_datagram(&buf[..n], Instant::now()) {
                        outputs.write(command)?;
                    }
                }
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
                Err(e) => warn!("receive failed: {e}"),
            }
        }
        Ok(())
    }
}
