//! Session state machine: the top-level orchestration of a race.
//!
//! This module defines the [`Session`] type, which sequences the whole event:
//!
//! ```text
//! Calibrating --both teams ready--> Countdown(n) --n reaches 0--> Playing
//!      Playing --round declares--> ScoreDisplay --delay--> Playing --> ...
//! ```
//!
//! - **Calibrating**: each team's readiness is polled at a short fixed interval. Readiness
//!   latches; once both teams are ready the session settles for a moment.
//! - **Countdown**: the counter is displayed and decremented once per interval.
//! - **Playing**: the [`RoundSelector`] picks a round from the [`RoundCatalog`], the round is
//!   built and started, and the session waits for its [`RoundFinish`] to fire.
//! - **ScoreDisplay**: a win is recorded in the [`ScoreLedger`] and sent to the winner's vehicle
//!   through the [`WinNotifier`]; the result stays on screen for a fixed delay.
//!
//! There is no terminal state: the loop runs until the `running` flag is cleared.
//!
//! # Failures
//!
//! Nothing stops the session. A round that cannot be built or started is logged and skipped:
//! the session waits the relaunch delay and deals the next round. A round that drops its finish
//! handle without declaring is abandoned without score, after the same delay. A Win that cannot
//! be sent is logged; the score is kept either way.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use hardware_race::prelude::*;
//! # struct MyRounds;
//! # impl RoundCatalog for MyRounds {
//! #     fn round_ids(&self) -> Vec<String> { vec![] }
//! #     fn create_round(&self, _id: &str) -> anyhow::Result<Box<dyn Round>> { anyhow::bail!("none") }
//! # }
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::from_env()?;
//!     let ready = |_team: Team| true;
//!     let mut session = Session::new(config, MyRounds, ready)?;
//!     session.run(&AtomicBool::new(true));
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, instrument, trace, warn};

use crate::configuration::Configuration;
use crate::logger::init_logger;
use crate::round_interface::{Round, RoundCatalog, RoundFinish, RoundStatus};
use crate::round_selector::RoundSelector;
use crate::score_ledger::ScoreLedger;
use crate::team::{RoundOutcome, Team};
use crate::win_notifier::WinNotifier;

/// Longest uninterrupted sleep, so that shutdown is noticed quickly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Where readiness comes from during calibration (a button, a console command, ...).
pub trait ReadinessSource {
    /// True if `team` signals it is ready. Polled repeatedly; a single `true` is enough.
    fn is_ready(&self, team: Team) -> bool;
}

impl<F: Fn(Team) -> bool> ReadinessSource for F {
    fn is_ready(&self, team: Team) -> bool {
        self(team)
    }
}

/// Readiness flags that any thread can raise.
#[derive(Debug, Default)]
pub struct ReadyFlags {
    flags: [AtomicBool; 2],
}

impl ReadyFlags {
    /// No team ready.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `team` as ready.
    pub fn signal(&self, team: Team) {
        self.flags[team.index()].store(true, Ordering::Relaxed);
    }
}

impl ReadinessSource for ReadyFlags {
    fn is_ready(&self, team: Team) -> bool {
        self.flags[team.index()].load(Ordering::Relaxed)
    }
}

impl<T: ReadinessSource + ?Sized> ReadinessSource for Arc<T> {
    fn is_ready(&self, team: Team) -> bool {
        (**self).is_ready(team)
    }
}

/// Current step of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for both teams to be ready.
    Calibrating,
    /// Counting down, the value is the number on screen.
    Countdown(u32),
    /// A round is being dealt or played.
    Playing,
    /// Showing the result of the last round.
    ScoreDisplay,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Calibrating => write!(f, "calibrating"),
            Phase::Countdown(n) => write!(f, "countdown {n}"),
            Phase::Playing => write!(f, "playing"),
            Phase::ScoreDisplay => write!(f, "score display"),
        }
    }
}

/// What happened to one attempt at playing a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundReport {
    /// The round ran and declared an outcome.
    Played {
        /// Round id.
        round: String,
        /// Declared outcome.
        outcome: RoundOutcome,
    },
    /// The round could not be built or started and was skipped.
    LaunchFailed {
        /// Round id.
        round: String,
    },
    /// The round dropped its finish handle without declaring.
    Abandoned {
        /// Round id.
        round: String,
    },
    /// The catalog had no round to offer.
    NoRounds,
    /// Shutdown was requested before the round ended.
    Interrupted,
}

/// The race orchestrator.
///
/// # Type Parameters
/// - `C`: where rounds come from, see [`RoundCatalog`]
/// - `R`: where team readiness comes from, see [`ReadinessSource`]
pub struct Session<C: RoundCatalog, R: ReadinessSource> {
    config: Configuration,
    catalog: C,
    readiness: R,
    selector: RoundSelector,
    ledger: ScoreLedger,
    notifier: WinNotifier,
    phase: Phase,
    ready: [bool; 2],
    current_round: Option<String>,
}

impl<C: RoundCatalog, R: ReadinessSource> Session<C, R> {
    /// Create a session in the `Calibrating` phase.
    ///
    /// # Errors
    /// Returned when the win socket cannot be created, or when file logging is requested and
    /// cannot be set up.
    #[instrument(skip_all)]
    pub fn new(config: Configuration, catalog: C, readiness: R) -> anyhow::Result<Self> {
        if config.log {
            init_logger("hub")?;
        }
        trace!(?config);

        Ok(Session {
            notifier: WinNotifier::new(&config)?,
            config,
            catalog,
            readiness,
            selector: RoundSelector::new(),
            ledger: ScoreLedger::new(),
            phase: Phase::Calibrating,
            ready: [false; 2],
            current_round: None,
        })
    }

    /// Replace the round selector, e.g. with a seeded one.
    pub fn with_selector(mut self, selector: RoundSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Scores so far.
    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    /// Round currently being played.
    pub fn current_round(&self) -> Option<&str> {
        self.current_round.as_deref()
    }

    /// Run the whole session until `running` is cleared.
    #[instrument(skip_all)]
    pub fn run(&mut self, running: &AtomicBool) {
        if self.calibrate(running) && self.countdown(running) {
            while running.load(Ordering::Relaxed) {
                let report = self.play_round(running);
                debug!(?report);
            }
        }
        info!(
            scores = %self.ledger,
            ties = self.ledger.ties(),
            leader = ?self.ledger.leader(),
            "session stopped"
        );
    }

    /// Wait until both teams are ready, then settle.
    ///
    /// Returns `false` if shutdown was requested meanwhile.
    #[instrument(skip_all)]
    pub fn calibrate(&mut self, running: &AtomicBool) -> bool {
        self.set_phase(Phase::Calibrating);
        self.ready = [false; 2];
        if self.config.verbose {
            println!("\x1b[33mCalibrating: waiting for both teams...\x1b[39m");
        }

        while running.load(Ordering::Relaxed) {
            for team in Team::ALL {
                if !self.ready[team.index()] && self.readiness.is_ready(team) {
                    self.ready[team.index()] = true;
                    info!(%team, "team ready");
                    if self.config.verbose {
                        println!("\x1b[32m{team} ready\x1b[39m");
                    }
                }
            }
            if self.ready.iter().all(|r| *r) {
                return pause(self.config.settle_delay, running);
            }
            thread::sleep(self.config.ready_poll_interval);
        }
        false
    }

    /// Display the countdown, one step per interval.
    ///
    /// Returns `false` if shutdown was requested meanwhile.
    #[instrument(skip_all)]
    pub fn countdown(&mut self, running: &AtomicBool) -> bool {
        for n in (1..=self.config.countdown_from).rev() {
            self.set_phase(Phase::Countdown(n));
            if self.config.verbose {
                print_countdown(n);
            }
            if !pause(self.config.countdown_interval, running) {
                return false;
            }
        }
        self.set_phase(Phase::Countdown(0));
        if self.config.verbose {
            print_countdown(0);
        }
        running.load(Ordering::Relaxed)
    }

    /// Deal, launch and wait for one round, then record and display its outcome.
    #[instrument(skip_all)]
    pub fn play_round(&mut self, running: &AtomicBool) -> RoundReport {
        self.set_phase(Phase::Playing);

        let Some(id) = self.selector.next_round(&self.catalog) else {
            warn!("no round available, retrying after {:?}", self.config.relaunch_delay);
            pause(self.config.relaunch_delay, running);
            return RoundReport::NoRounds;
        };

        info!(round = %id, "starting round");
        if self.config.verbose {
            print_round(&id);
        }
        self.current_round = Some(id.clone());

        let (finish, result) = RoundFinish::channel();
        let launched = self
            .catalog
            .create_round(&id)
            .and_then(|mut round| round.start(finish).map(|()| round));
        // keep the round alive while it runs
        let round: Box<dyn Round> = match launched {
            Ok(round) => round,
            Err(e) => {
                error!(round = %id, "could not launch round, skipping it: {e:#}");
                self.current_round = None;
                pause(self.config.relaunch_delay, running);
                return RoundReport::LaunchFailed { round: id };
            }
        };

        let outcome = loop {
            if !running.load(Ordering::Relaxed) {
                return RoundReport::Interrupted;
            }
            match result.wait(SLEEP_SLICE) {
                RoundStatus::Finished(outcome) => break outcome,
                RoundStatus::Running => {}
                RoundStatus::Abandoned => {
                    warn!(round = %id, "round ended without declaring a result");
                    self.current_round = None;
                    pause(self.config.relaunch_delay, running);
                    return RoundReport::Abandoned { round: id };
                }
            }
        };
        drop(round);
        self.current_round = None;

        info!(round = %id, %outcome, "round finished");
        self.record(outcome);
        self.show_score(outcome, running);
        RoundReport::Played { round: id, outcome }
    }

    /// Record `outcome` and tell the winner's vehicle. Ties change nothing.
    pub fn record(&mut self, outcome: RoundOutcome) {
        if let Some(team) = self.ledger.record(outcome) {
            if let Err(e) = self.notifier.notify(team) {
                warn!(%team, "win not delivered: {e:#}");
            }
        }
    }

    fn show_score(&mut self, outcome: RoundOutcome, running: &AtomicBool) {
        self.set_phase(Phase::ScoreDisplay);
        if self.config.verbose {
            print_outcome(outcome, &self.ledger);
        }
        pause(self.config.score_display, running);
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "phase change");
            self.phase = phase;
        }
    }
}

/// Sleep `duration` in slices, returning `false` early if `running` is cleared.
fn pause(duration: Duration, running: &AtomicBool) -> bool {
    let mut left = duration;
    while !left.is_zero() {
        if !running.load(Ordering::Relaxed) {
            return false;
        }
        let slice = left.min(SLEEP_SLICE);
        thread::sleep(slice);
        left -= slice;
    }
    running.load(Ordering::Relaxed)
}

fn print_countdown(n: u32) {
    // clear line, yellow digit / green GO, start of line
    if n == 0 {
        println!("\x1b[2K\x1b[32mGO!\x1b[39m");
    } else {
        print!("\x1b[2K\x1b[33m{n}...\x1b[39m\x1b[0G");
        let _ = std::io::Write::flush(&mut std::io::stdout());
    }
}

fn print_round(id: &str) {
    println!("\x1b[2K\x1b[36mNext round:\x1b[39m {id}");
}

fn print_outcome(outcome: RoundOutcome, ledger: &ScoreLedger) {
    let colored = match outcome {
        RoundOutcome::Winner(Team::A) => format!("\x1b[34m{outcome}\x1b[39m"),
        RoundOutcome::Winner(Team::B) => format!("\x1b[35m{outcome}\x1b[39m"),
        RoundOutcome::Tie => format!("\x1b[33m{outcome}\x1b[39m"),
    };
    println!("\x1b[2K{colored} \x1b[1m{ledger}\x1b[0m");
}
