//! Config for the hub and the vehicles
//!
//! Both sides are configured through plain values built once at start-up and handed to the
//! constructors that need them: [`Configuration`] for the hub, [`VehicleConfig`] for each
//! vehicle. They can be created programmatically (`new()` plus `with_*` setters) or read from
//! environment variables with `from_env()`.
//!
//! # Environment Variables
//!
//! Flags are case-insensitive; set them to `"true"` to enable.
//!
//! Hub:
//! - `RACE_TEAM_A_ADDR`: vehicle address of Team A (default: `192.168.1.101:5005`)
//! - `RACE_TEAM_B_ADDR`: vehicle address of Team B (default: `192.168.1.102:5005`)
//! - `RACE_VERBOSE`: print the countdown and scoreboard to stdout (default: `true`)
//! - `RACE_LOG`: log to a file (default: `false`)
//!
//! Vehicle:
//! - `RACE_VEHICLE_TEAM`: `a` or `b` (default: `a`)
//! - `RACE_VEHICLE_PORT`: UDP port to listen on (default: `5005`)
//! - `RACE_BASE_FLOOR`, `RACE_RAMP_STEP`: speed ramp (default: `0.22`, `0.08`)
//! - `RACE_LEFT_TRIM`, `RACE_RIGHT_TRIM`: trim multipliers (default: `1.0`, `0.96`)
//! - `RACE_PWM_CHIP`: sysfs PWM chip (default: `/sys/class/pwm/pwmchip0`)
//! - `RACE_DRY_RUN`: log motor commands instead of driving the ESCs (default: `false`)
//! - `RACE_LOG`: log to a file (default: `false`)

use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use anyhow::Context;

use crate::team::Team;
use crate::wire::DEFAULT_DEADZONE;

/// Default UDP port every vehicle listens on.
pub const DEFAULT_VEHICLE_PORT: u16 = 5005;

fn get_env_flag(var: &str, default: bool) -> bool {
    match std::env::var(var) {
        Ok(val) => val.eq_ignore_ascii_case("true"),
        Err(_) => default,
    }
}

fn get_env_value<T>(var: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(var) {
        Ok(val) => val
            .trim()
            .parse()
            .with_context(|| format!("invalid value '{val}' for {var}")),
        Err(_) => Ok(default),
    }
}

/// Configuration of the hub: where the vehicles are and how the session is paced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Configuration {
    pub(crate) destinations: [SocketAddr; 2],
    pub(crate) telemetry_period: Duration,
    pub(crate) deadzone: f32,
    pub(crate) ready_poll_interval: Duration,
    pub(crate) settle_delay: Duration,
    pub(crate) countdown_from: u32,
    pub(crate) countdown_interval: Duration,
    pub(crate) score_display: Duration,
    pub(crate) relaunch_delay: Duration,
    pub(crate) verbose: bool,
    pub(crate) log: bool,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Team A drives `192.168.1.101:5005`, Team B drives `192.168.1.102:5005`.
    /// - Telemetry is sent every 20ms (50Hz) with a 0.12 deadzone.
    /// - Readiness is polled every 50ms, then the session settles for 1s.
    /// - The countdown starts at 3 and ticks every second.
    /// - The winner is displayed for 2.5s.
    /// - A round that fails to launch is skipped after 1s.
    /// - The session display is printed to stdout, logging to file is disabled.
    pub fn new() -> Self {
        Self {
            destinations: [
                SocketAddr::V4(SocketAddrV4::new(
                    Ipv4Addr::new(192, 168, 1, 101),
                    DEFAULT_VEHICLE_PORT,
                )),
                SocketAddr::V4(SocketAddrV4::new(
                    Ipv4Addr::new(192, 168, 1, 102),
                    DEFAULT_VEHICLE_PORT,
                )),
            ],
            telemetry_period: Duration::from_millis(20),
            deadzone: DEFAULT_DEADZONE,
            ready_poll_interval: Duration::from_millis(50),
            settle_delay: Duration::from_secs(1),
            countdown_from: 3,
            countdown_interval: Duration::from_secs(1),
            score_display: Duration::from_millis(2500),
            relaunch_delay: Duration::from_secs(1),
            verbose: true,
            log: false,
        }
    }

    /// Create configuration from environment variables, starting from [`Configuration::new`].
    ///
    /// # Errors
    /// Returned when a vehicle address variable is set but is not a valid `ip:port`.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::new();
        Ok(Self {
            destinations: [
                get_env_value("RACE_TEAM_A_ADDR", defaults.destinations[0])?,
                get_env_value("RACE_TEAM_B_ADDR", defaults.destinations[1])?,
            ],
            verbose: get_env_flag("RACE_VERBOSE", defaults.verbose),
            log: get_env_flag("RACE_LOG", defaults.log),
            ..defaults
        })
    }

    /// Vehicle address of `team`.
    pub fn destination(&self, team: Team) -> SocketAddr {
        self.destinations[team.index()]
    }

    /// Set the vehicle address of `team`.
    pub fn with_destination(mut self, team: Team, addr: SocketAddr) -> Self {
        self.destinations[team.index()] = addr;
        self
    }

    /// Set the telemetry period.
    pub fn with_telemetry_period(mut self, period: Duration) -> Self {
        self.telemetry_period = period;
        self
    }

    /// Set the analog deadzone.
    pub fn with_deadzone(mut self, deadzone: f32) -> Self {
        self.deadzone = deadzone;
        self
    }

    /// Set the readiness poll interval used during calibration.
    pub fn with_ready_poll_interval(mut self, interval: Duration) -> Self {
        self.ready_poll_interval = interval;
        self
    }

    /// Set the delay between both teams being ready and the countdown.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the countdown start value and its tick interval.
    pub fn with_countdown(mut self, from: u32, interval: Duration) -> Self {
        self.countdown_from = from;
        self.countdown_interval = interval;
        self
    }

    /// Set how long the winner is displayed before the next round.
    pub fn with_score_display(mut self, delay: Duration) -> Self {
        self.score_display = delay;
        self
    }

    /// Set the delay before the next round when a round fails to launch.
    pub fn with_relaunch_delay(mut self, delay: Duration) -> Self {
        self.relaunch_delay = delay;
        self
    }

    /// Enable or disable the stdout display.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// True if logging to file is requested.
    pub fn log_enabled(&self) -> bool {
        self.log
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed per-side correction of a vehicle's motors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// `1.0` or `-1.0`; motors are mounted mirrored so one side is usually flipped.
    pub left_flip: f32,
    /// See `left_flip`.
    pub right_flip: f32,
    /// Multiplier compensating mechanical asymmetry.
    pub left_trim: f32,
    /// See `left_trim`.
    pub right_trim: f32,
}

impl Calibration {
    /// No flip, no trim.
    pub const IDENTITY: Calibration = Calibration {
        left_flip: 1.0,
        right_flip: 1.0,
        left_trim: 1.0,
        right_trim: 1.0,
    };
}

impl Default for Calibration {
    /// Right side mirrored and trimmed to 0.96, as on the race cars.
    fn default() -> Self {
        Calibration {
            left_flip: 1.0,
            right_flip: -1.0,
            left_trim: 1.0,
            right_trim: 0.96,
        }
    }
}

/// Configuration of one vehicle's receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleConfig {
    pub(crate) team: Team,
    pub(crate) port: u16,
    pub(crate) base_floor: f32,
    pub(crate) ramp_step: f32,
    pub(crate) deadzone: f32,
    pub(crate) watchdog_timeout: Duration,
    pub(crate) arm_delay: Duration,
    pub(crate) calibration: Calibration,
    pub(crate) pwm_chip: PathBuf,
    pub(crate) dry_run: bool,
    pub(crate) log: bool,
}

impl VehicleConfig {
    /// Default receiver of `team`: port 5005, ceiling `0.22 + 0.08 * wins`, 200ms watchdog,
    /// 2s arming and the default [`Calibration`].
    pub fn new(team: Team) -> Self {
        Self {
            team,
            port: DEFAULT_VEHICLE_PORT,
            base_floor: 0.22,
            ramp_step: 0.08,
            deadzone: DEFAULT_DEADZONE,
            watchdog_timeout: Duration::from_millis(200),
            arm_delay: Duration::from_secs(2),
            calibration: Calibration::default(),
            pwm_chip: PathBuf::from("/sys/class/pwm/pwmchip0"),
            dry_run: false,
            log: false,
        }
    }

    /// Create configuration from environment variables, starting from [`VehicleConfig::new`].
    ///
    /// # Errors
    /// Returned when a variable is set to a value that does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        let team = match std::env::var("RACE_VEHICLE_TEAM") {
            Ok(val) => val.parse()?,
            Err(_) => Team::A,
        };
        let defaults = Self::new(team);
        let calibration = Calibration {
            left_trim: get_env_value("RACE_LEFT_TRIM", defaults.calibration.left_trim)?,
            right_trim: get_env_value("RACE_RIGHT_TRIM", defaults.calibration.right_trim)?,
            ..defaults.calibration
        };
        Ok(Self {
            port: get_env_value("RACE_VEHICLE_PORT", defaults.port)?,
            base_floor: get_env_value("RACE_BASE_FLOOR", defaults.base_floor)?,
            ramp_step: get_env_value("RACE_RAMP_STEP", defaults.ramp_step)?,
            pwm_chip: get_env_value("RACE_PWM_CHIP", defaults.pwm_chip.clone())?,
            dry_run: get_env_flag("RACE_DRY_RUN", defaults.dry_run),
            log: get_env_flag("RACE_LOG", defaults.log),
            calibration,
            ..defaults
        })
    }

    /// Team this vehicle races for.
    pub fn team(&self) -> Team {
        self.team
    }

    /// UDP port the receiver binds.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Sysfs PWM chip driving the ESCs.
    pub fn pwm_chip(&self) -> &std::path::Path {
        &self.pwm_chip
    }

    /// True if motor commands should only be logged.
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// True if logging to file is requested.
    pub fn log_enabled(&self) -> bool {
        self.log
    }

    /// Set the UDP port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the speed ramp: `ceiling = min(1, base_floor + wins * step)`.
    pub fn with_ramp(mut self, base_floor: f32, step: f32) -> Self {
        self.base_floor = base_floor;
        self.ramp_step = step;
        self
    }

    /// Set the analog deadzone re-applied on the vehicle.
    pub fn with_deadzone(mut self, deadzone: f32) -> Self {
        self.deadzone = deadzone;
        self
    }

    /// Set the silence after which the motors are stopped.
    pub fn with_watchdog_timeout(mut self, timeout: Duration) -> Self {
        self.watchdog_timeout = timeout;
        self
    }

    /// Set how long the ESCs are held neutral before commands are accepted.
    pub fn with_arm_delay(mut self, delay: Duration) -> Self {
        self.arm_delay = delay;
        self
    }

    /// Set the motor calibration.
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    /// Set the sysfs PWM chip.
    pub fn with_pwm_chip(mut self, chip: impl Into<PathBuf>) -> Self {
        self.pwm_chip = chip.into();
        self
    }

    /// Log motor commands instead of driving the ESCs.
    pub fn with_dry_run(mut self, value: bool) -> Self {
        self.dry_run = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }
}
