//! Vehicle receiver: turns hub datagrams into ESC pulses.

use std::net::{Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use hardware_race::logger::{init_logger, init_stderr_logger};
use hardware_race::prelude::*;

fn main() -> anyhow::Result<()> {
    let config = VehicleConfig::from_env()?;
    if config.log_enabled() {
        init_logger("vehicle")?;
    } else {
        init_stderr_logger()?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .context("could not set Ctrl-C handler")?;

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.port()))
        .with_context(|| format!("could not bind port {}", config.port()))?;
    info!(team = %config.team(), port = config.port(), "listening");

    let mut outputs: Box<dyn MotorOutputs> = if config.dry_run() {
        Box::new(DryRunOutputs::default())
    } else {
        Box::new(SysfsEscOutputs::open(config.pwm_chip())?)
    };

    let mut controller = DriveController::new(config);
    controller.arm(&mut outputs)?;
    controller.run(&socket, &mut outputs, &running)
}
