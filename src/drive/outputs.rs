//! Where motor commands end up.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info, warn};

use super::MotorCommand;

/// Actuator outputs of a vehicle.
pub trait MotorOutputs {
    /// Apply `command` to both motors. Always "latest wins", nothing is queued.
    fn write(&mut self, command: MotorCommand) -> anyhow::Result<()>;
}

impl<T: MotorOutputs + ?Sized> MotorOutputs for Box<T> {
    fn write(&mut self, command: MotorCommand) -> anyhow::Result<()> {
        (**self).write(command)
    }
}

/// Hobby ESC frame: 50Hz, 1000-2000µs pulse, 1500µs neutral.
const PERIOD_NS: u64 = 20_000_000;
const NEUTRAL_NS: f32 = 1_500_000.0;
const HALF_RANGE_NS: f32 = 500_000.0;

/// Two ESCs on the Linux sysfs PWM interface (`/sys/class/pwm/pwmchipN`).
///
/// Channel 0 drives the left side, channel 1 the right side; on a Raspberry Pi with the
/// `pwm-2chan` overlay these are GPIO18 and GPIO19.
#[derive(Debug)]
pub struct SysfsEscOutputs {
    left: PathBuf,
    right: PathBuf,
    last: Option<MotorCommand>,
}

impl SysfsEscOutputs {
    /// Export both channels, set the ESC frame and start at neutral.
    pub fn open(chip: &Path) -> anyhow::Result<Self> {
        let left = export_channel(chip, 0)?;
        let right = export_channel(chip, 1)?;
        info!(chip = %chip.display(), "ESC outputs ready");
        Ok(Self {
            left,
            right,
            last: None,
        })
    }
}

fn export_channel(chip: &Path, channel: u32) -> anyhow::Result<PathBuf> {
    let dir = chip.join(format!("pwm{channel}"));
    if !dir.exists() {
        write_attr(&chip.join("export"), channel)?;
        // udev needs a moment to hand the new attributes over
        for _ in 0..20 {
            if dir.join("period").exists() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
    write_attr(&dir.join("period"), PERIOD_NS)?;
    write_attr(&dir.join("duty_cycle"), pulse_ns(0.0))?;
    write_attr(&dir.join("enable"), 1)?;
    debug!(channel = %dir.display(), "pwm channel enabled");
    Ok(dir)
}

fn write_attr(path: &Path, value: impl ToString) -> anyhow::Result<()> {
    fs::write(path, value.to_string()).with_context(|| format!("could not write {}", path.display()))
}

/// Pulse width in nanoseconds for a value in `[-1, 1]`.
fn pulse_ns(value: f32) -> u64 {
    (NEUTRAL_NS + value.clamp(-1.0, 1.0) * HALF_RANGE_NS).round() as u64
}

impl MotorOutputs for SysfsEscOutputs {
    fn write(&mut self, command: MotorCommand) -> anyhow::Result<()> {
        if self.last == Some(command) {
            return Ok(());
        }
        write_attr(&self.left.join("duty_cycle"), pulse_ns(command.left))?;
        write_attr(&self.right.join("duty_cycle"), pulse_ns(command.right))?;
        self.last = Some(command);
        Ok(())
    }
}

impl Drop for SysfsEscOutputs {
    fn drop(&mut self) {
        if let Err(e) = self.write(MotorCommand::STOP) {
            warn!("could not neutralise ESCs on drop: {e:#}");
        }
    }
}

/// Outputs that only log, for running a receiver without hardware.
#[derive(Debug, Default)]
pub struct DryRunOutputs {
    last: Option<MotorCommand>,
}

impl MotorOutputs for DryRunOutputs {
    fn write(&mut self, command: MotorCommand) -> anyhow::Result<()> {
        if self.last != Some(command) {
            info!(left = command.left, right = command.right, "motors");
            self.last = Some(command);
        }
        Ok(())
    }
}
