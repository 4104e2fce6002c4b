//! # Hardware Race
//!
//! Two teams race remote-controlled cars while earning speed by winning mini-games.
//!
//! It provides:
//! - A hub-side session state machine sequencing calibration, countdown, rounds and scores
//!   ([`Session`](crate::session::Session))
//! - A round deck that never deals the same round twice in a row
//!   ([`RoundSelector`](crate::round_selector::RoundSelector))
//! - A 50Hz telemetry stream of each team's stick to its car, and a Win signal to the winner
//!   ([`TelemetryPublisher`](crate::telemetry::TelemetryPublisher),
//!   [`WinNotifier`](crate::win_notifier::WinNotifier))
//! - The vehicle-side receiver: arcade mixing, win-based speed ramp and a fail-stop watchdog
//!   ([`DriveController`](crate::drive::DriveController))
//!
//! The hub and the vehicles talk over UDP with two ASCII messages, see [`wire`].
//!
//! # Documentation Overview
//!
//! - For the race flow and its failure handling, see the [`session`] module.
//! - For hub and vehicle settings, see [`Configuration`](crate::configuration::Configuration)
//!   and [`VehicleConfig`](crate::configuration::VehicleConfig).
//! - For implementing rounds, check out the [`Round`](crate::round_interface::Round) and
//!   [`RoundCatalog`](crate::round_interface::RoundCatalog) traits.
//! - For the stick-to-motor pipeline, see the [`drive`] module.
//!
//! # Usage Example
//!
//! A hub with a single round that Team A always wins:
//!
//! ```no_run
//! use std::sync::{atomic::AtomicBool, Arc};
//! use hardware_race::prelude::*;
//!
//! struct Walkover;
//!
//! impl Round for Walkover {
//!     fn start(&mut self, finish: RoundFinish) -> anyhow::Result<()> {
//!         finish.declare(RoundOutcome::Winner(Team::A));
//!         Ok(())
//!     }
//! }
//!
//! struct Catalog;
//!
//! impl RoundCatalog for Catalog {
//!     fn round_ids(&self) -> Vec<String> {
//!         vec!["walkover".to_owned()]
//!     }
//!
//!     fn create_round(&self, _id: &str) -> anyhow::Result<Box<dyn Round>> {
//!         Ok(Box::new(Walkover))
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::new();
//!     let running = Arc::new(AtomicBool::new(true));
//!
//!     let sticks = [Arc::new(AxisCell::unbound()), Arc::new(AxisCell::unbound())];
//!     let publisher = TelemetryPublisher::new(
//!         &config,
//!         [Box::new(sticks[0].clone()), Box::new(sticks[1].clone())],
//!     )?;
//!     let telemetry = publisher.spawn(running.clone())?;
//!
//!     let mut session = Session::new(config, Catalog, |_team: Team| true)?;
//!     session.run(&running);
//!
//!     let _ = telemetry.join();
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub use anyhow;
pub mod configuration;
pub mod drive;
pub mod logger;
pub mod round_interface;
pub mod round_selector;
pub mod score_ledger;
pub mod session;
pub mod team;
pub mod telemetry;
pub mod win_notifier;
pub mod wire;

/// Commonly used types and traits for quick access.
///
/// ```rust
/// use hardware_race::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::{Calibration, Configuration, VehicleConfig};
    pub use crate::drive::outputs::{DryRunOutputs, SysfsEscOutputs};
    pub use crate::drive::{DriveController, MotorCommand, MotorOutputs};
    pub use crate::round_interface::{Round, RoundCatalog, RoundFinish};
    pub use crate::round_selector::RoundSelector;
    pub use crate::score_ledger::ScoreLedger;
    pub use crate::session::{Phase, ReadyFlags, RoundReport, Session};
    pub use crate::team::{RoundOutcome, Team};
    pub use crate::telemetry::{AxisCell, ControlSource, TelemetryPublisher};
    pub use crate::win_notifier::WinNotifier;
    pub use crate::wire::{Axes, Message};
}
