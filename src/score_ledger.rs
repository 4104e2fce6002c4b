//! Per-team win tally.

use std::fmt;

use tracing::info;

use crate::team::{RoundOutcome, Team};

/// Rounds won per team since the hub started. Scores never decrease.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScoreLedger {
    wins: [u32; 2],
    ties: u32,
}

impl ScoreLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one win to `team`.
    pub fn record_win(&mut self, team: Team) {
        self.wins[team.index()] += 1;
        info!(%team, score = self.wins[team.index()], "win recorded");
    }

    /// Record a round outcome. Returns the team that scored, `None` for a tie.
    pub fn record(&mut self, outcome: RoundOutcome) -> Option<Team> {
        match outcome {
            RoundOutcome::Winner(team) => {
                self.record_win(team);
                Some(team)
            }
            RoundOutcome::Tie => {
                self.ties += 1;
                None
            }
        }
    }

    /// Wins of `team`.
    pub fn score(&self, team: Team) -> u32 {
        self.wins[team.index()]
    }

    /// Number of tied rounds.
    pub fn ties(&self) -> u32 {
        self.ties
    }

    /// Team currently ahead, `None` when level.
    pub fn leader(&self) -> Option<Team> {
        let (a, b) = (self.score(Team::A), self.score(Team::B));
        match a.cmp(&b) {
            std::cmp::Ordering::Greater => Some(Team::A),
            std::cmp::Ordering::Less => Some(Team::B),
            std::cmp::Ordering::Equal => None,
        }
    }
}

impl fmt::Display for ScoreLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} | {}: {}",
            Team::A,
            self.score(Team::A),
            Team::B,
            self.score(Team::B)
        )
    }
}
