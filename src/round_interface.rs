//! Module defining the traits a round collaborator needs to implement to be played by the
//! session.
//!
//! A round is one self-contained contest (pong, a button masher, ...). The session only sees
//! it through two traits:
//! - [`RoundCatalog`] lists the available rounds and builds one by id
//! - [`Round::start`] launches it and hands it a [`RoundFinish`]
//!
//! The finish handle is consumed when the outcome is declared, so a round cannot report twice.
//! Rendering, inputs and win conditions are entirely up to the round.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use tracing::trace;

use crate::team::RoundOutcome;

/// What a round should implement.
pub trait Round: Send {
    /// Start the round.
    ///
    /// The round must eventually call [`RoundFinish::declare`] (or
    /// [`RoundFinish::declare_text`]) exactly once, from any thread, after releasing its own
    /// resources. It may do so before `start` returns.
    ///
    /// # Error
    /// Returned when the round cannot be started. The session then skips it.
    fn start(&mut self, finish: RoundFinish) -> anyhow::Result<()>;
}

/// What will be given to the session to discover and create rounds.
pub trait RoundCatalog {
    /// Identifiers of the rounds currently available. May change between calls.
    fn round_ids(&self) -> Vec<String>;

    /// Builds the round named `id`.
    ///
    /// # Error
    /// Returned when the round is unknown or cannot be built.
    fn create_round(&self, id: &str) -> anyhow::Result<Box<dyn Round>>;
}

/// Single-use handle a round uses to report its outcome.
#[derive(Debug)]
pub struct RoundFinish {
    tx: Sender<RoundOutcome>,
}

impl RoundFinish {
    /// Creates a finish handle and the receiving side the session waits on.
    pub fn channel() -> (RoundFinish, RoundResult) {
        let (tx, rx) = mpsc::channel();
        (RoundFinish { tx }, RoundResult { rx })
    }

    /// Report the outcome of the round.
    pub fn declare(self, outcome: RoundOutcome) {
        trace!(%outcome, "round declared");
        // the session may already be gone during shutdown
        let _ = self.tx.send(outcome);
    }

    /// Report the outcome as free text, e.g. `"Blue Wins!"`, `"Player 2 Wins"` or `"Tie"`.
    ///
    /// See [`RoundOutcome::from_result_text`] for the matching rules.
    pub fn declare_text(self, text: &str) {
        self.declare(RoundOutcome::from_result_text(text));
    }
}

/// What the session observes while a round is running.
#[derive(Debug, PartialEq, Eq)]
pub enum RoundStatus {
    /// The round declared its outcome.
    Finished(RoundOutcome),
    /// Still running.
    Running,
    /// The finish handle was dropped without declaring anything.
    Abandoned,
}

/// Receiving side of a [`RoundFinish`].
#[derive(Debug)]
pub struct RoundResult {
    rx: Receiver<RoundOutcome>,
}

impl RoundResult {
    /// Wait up to `timeout` for the round to end.
    pub fn wait(&self, timeout: Duration) -> RoundStatus {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => RoundStatus::Finished(outcome),
            Err(RecvTimeoutError::Timeout) => RoundStatus::Running,
            Err(RecvTimeoutError::Disconnected) => RoundStatus::Abandoned,
        }
    }
}
