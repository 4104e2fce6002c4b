//! The two competing sides and the outcome of a round.

use std::fmt;

use tracing::warn;

/// One of the two competing sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Team {
    /// Side A, announced by rounds as "Blue" or "Player 1".
    A,
    /// Side B, announced by rounds as "Pink" or "Player 2".
    B,
}

impl Team {
    /// Both teams, in index order.
    pub const ALL: [Team; 2] = [Team::A, Team::B];

    /// Position of the team in per-team arrays.
    pub fn index(self) -> usize {
        match self {
            Team::A => 0,
            Team::B => 1,
        }
    }

    /// Canonical colour used by the rounds when announcing this side.
    pub fn color(self) -> &'static str {
        match self {
            Team::A => "Blue",
            Team::B => "Pink",
        }
    }

    /// Lower-case markers identifying this side inside a free-text result.
    fn markers(self) -> [String; 3] {
        let ordinal = self.index() + 1;
        [
            self.to_string().to_lowercase(),
            self.color().to_lowercase(),
            format!("player {ordinal}"),
        ]
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::A => write!(f, "Team A"),
            Team::B => write!(f, "Team B"),
        }
    }
}

impl std::str::FromStr for Team {
    type Err = anyhow::Error;

    /// Accepts `a`, `b`, `team a`, `team b` and the side colours, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "a" | "team a" | "blue" => Ok(Team::A),
            "b" | "team b" | "pink" => Ok(Team::B),
            _ => anyhow::bail!("'{s}' is not a team (expected 'a' or 'b')"),
        }
    }
}

/// Result of a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The given team won.
    Winner(Team),
    /// Nobody won; scores and vehicle ramps stay untouched.
    Tie,
}

impl RoundOutcome {
    /// The winning team, if any.
    pub fn winner(self) -> Option<Team> {
        match self {
            RoundOutcome::Winner(team) => Some(team),
            RoundOutcome::Tie => None,
        }
    }

    /// Classify the free text a round announces at its end.
    ///
    /// Matching is case-insensitive and on whole words: `"Player 1 Wins"` and `"Blue Wins!"`
    /// are Team A, `"Pink Wins"` is Team B, `"It's a Tie!"` is a tie. Text naming both sides or
    /// nothing recognisable is treated as a tie so that no score is ever guessed.
    pub fn from_result_text(text: &str) -> RoundOutcome {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let names = |marker: &str| {
            let wanted: Vec<&str> = marker.split_whitespace().collect();
            words.windows(wanted.len()).any(|w| w == wanted.as_slice())
        };
        let mentions = |team: Team| team.markers().iter().any(|m| names(m.as_str()));

        match (mentions(Team::A), mentions(Team::B)) {
            (true, false) => RoundOutcome::Winner(Team::A),
            (false, true) => RoundOutcome::Winner(Team::B),
            (true, true) => {
                warn!(text, "result names both sides, counting it as a tie");
                RoundOutcome::Tie
            }
            (false, false) => {
                if !words.contains(&"tie") {
                    warn!(text, "unrecognised result, counting it as a tie");
                }
                RoundOutcome::Tie
            }
        }
    }
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundOutcome::Winner(team) => write!(f, "{team} ({}) wins", team.color()),
            RoundOutcome::Tie => write!(f, "Tie"),
        }
    }
}
