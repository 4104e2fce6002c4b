//! Telemetry publisher: streams each team's stick to its vehicle.
//!
//! The publisher is a free-running background loop, independent of the session phase. Every
//! tick (20ms by default) it reads both teams' [`ControlSource`], applies the deadzone and sends
//! one `"<x>,<y>"` datagram per team. It never waits on the network: the socket is
//! non-blocking, and a failed send (unreachable vehicle, full buffer, ...) is logged and dropped.
//! The loop runs until the shared `running` flag is cleared at shutdown.
//!
//! The stick values are the only data crossing between the input side and this loop, so they
//! live in an [`AxisCell`], a lock-free cell holding both axes in one atomic word.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, info, instrument, trace, warn};

use crate::configuration::Configuration;
use crate::team::Team;
use crate::wire::{Axes, Message};

/// An analog control readable from any thread.
pub trait ControlSource: Send + Sync {
    /// Latest stick position, `None` if no controller is bound.
    fn read_axes(&self) -> Option<Axes>;
}

/// Both axes of a stick packed in a single atomic word.
///
/// Writers (an input driver, the operator console) call [`AxisCell::set`]; the publisher reads
/// with [`ControlSource::read_axes`]. An unbound cell reads as `None`.
#[derive(Debug)]
pub struct AxisCell {
    bits: AtomicU64,
}

// NaN payload never produced by `Axes::new`
const UNBOUND: u64 = u64::MAX;

impl AxisCell {
    /// Cell with no controller bound.
    pub fn unbound() -> Self {
        Self {
            bits: AtomicU64::new(UNBOUND),
        }
    }

    /// Cell holding `axes`.
    pub fn new(axes: Axes) -> Self {
        let cell = Self::unbound();
        cell.set(axes);
        cell
    }

    /// Publish a new stick position.
    pub fn set(&self, axes: Axes) {
        let axes = Axes::new(axes.x, axes.y);
        let bits = (u64::from(axes.x.to_bits()) << 32) | u64::from(axes.y.to_bits());
        self.bits.store(bits, Ordering::Relaxed);
    }

    /// Mark the controller as disconnected.
    pub fn unbind(&self) {
        self.bits.store(UNBOUND, Ordering::Relaxed);
    }
}

impl Default for AxisCell {
    fn default() -> Self {
        Self::unbound()
    }
}

impl ControlSource for AxisCell {
    fn read_axes(&self) -> Option<Axes> {
        let bits = self.bits.load(Ordering::Relaxed);
        if bits == UNBOUND {
            return None;
        }
        Some(Axes {
            x: f32::from_bits((bits >> 32) as u32),
            y: f32::from_bits(bits as u32),
        })
    }
}

impl<T: ControlSource + ?Sized> ControlSource for Arc<T> {
    fn read_axes(&self) -> Option<Axes> {
        (**self).read_axes()
    }
}

/// Paced loop sending both teams' sticks to their vehicles.
pub struct TelemetryPublisher {
    socket: UdpSocket,
    sources: [Box<dyn ControlSource>; 2],
    destinations: [SocketAddr; 2],
    period: Duration,
    deadzone: f32,
    unbound: [bool; 2],
}

impl TelemetryPublisher {
    /// Create a publisher on an ephemeral, non-blocking UDP socket.
    ///
    /// `sources[0]` drives Team A, `sources[1]` drives Team B.
    pub fn new(config: &Configuration, sources: [Box<dyn ControlSource>; 2]) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").context("could not bind telemetry socket")?;
        socket
            .set_nonblocking(true)
            .context("could not make telemetry socket non-blocking")?;

        Ok(Self {
            socket,
            sources,
            destinations: config.destinations,
            period: config.telemetry_period,
            deadzone: config.deadzone,
            unbound: [false; 2],
        })
    }

    /// Stick position that will be sent to `team`, deadzone applied.
    ///
    /// An unbound controller reads as neutral.
    pub fn sample(&mut self, team: Team) -> Axes {
        let i = team.index();
        match self.sources[i].read_axes() {
            Some(axes) => {
                if self.unbound[i] {
                    info!(%team, "controller bound");
                    self.unbound[i] = false;
                }
                axes.with_deadzone(self.deadzone)
            }
            None => {
                if !self.unbound[i] {
                    warn!(%team, "no controller bound, sending neutral");
                    self.unbound[i] = true;
                }
                Axes::NEUTRAL
            }
        }
    }

    /// Send one packet to each vehicle. Returns the number of packets handed to the network.
    pub fn tick(&mut self) -> usize {
        let mut sent = 0;
        for team in Team::ALL {
            let payload = Message::Telemetry(self.sample(team)).encode();
            let destination = self.destinations[team.index()];
            match self.socket.send_to(payload.as_bytes(), destination) {
                Ok(_) => {
                    trace!(%team, %payload, "telemetry sent");
                    sent += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    debug!(%team, "telemetry socket busy, packet dropped");
                }
                Err(e) => {
                    // unreachable vehicle, no route, ...: not fatal
                    debug!(%team, %destination, "telemetry send failed: {e}");
                }
            }
        }
        sent
    }

    /// Run the loop on the current thread until `running` is cleared.
    #[instrument(skip_all)]
    pub fn run(&mut self, running: &AtomicBool) {
        info!(period = ?self.period, destinations = ?self.destinations, "telemetry started");

        let mut next_tick = Instant::now();
        while running.load(Ordering::Relaxed) {
            self.tick();

            next_tick += self.period;
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                // fell behind (suspended, overloaded): resume pacing from now
                next_tick = now;
            }
        }

        info!("telemetry stopped");
    }

    /// Run the loop on a dedicated thread.
    pub fn spawn(mut self, running: Arc<AtomicBool>) -> anyhow::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("telemetry".to_owned())
            .spawn(move || self.run(&running))
            .context("could not spawn telemetry thread")
    }
}
