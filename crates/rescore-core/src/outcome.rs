// Final-score comparison between the recorded and the rescored game.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::{PlayEvent, Side};
use crate::game::GameAnalysis;

/// How the rescored result compares to the recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOutcome {
    SameScore,
    Tied,
    Reversed,
    SameWin,
    SmallerWin,
    BiggerWin,
    /// The rescored game had no decisive half-inning in the available events.
    ExtraInningsUnknown,
}

impl ScoreOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreOutcome::SameScore => "same_score",
            ScoreOutcome::Tied => "tied",
            ScoreOutcome::Reversed => "reversed",
            ScoreOutcome::SameWin => "same_win",
            ScoreOutcome::SmallerWin => "smaller_win",
            ScoreOutcome::BiggerWin => "bigger_win",
            ScoreOutcome::ExtraInningsUnknown => "extra_innings_unknown",
        }
    }

    pub fn from_str_outcome(s: &str) -> Option<Self> {
        match s {
            "same_score" => Some(ScoreOutcome::SameScore),
            "tied" => Some(ScoreOutcome::Tied),
            "reversed" => Some(ScoreOutcome::Reversed),
            "same_win" => Some(ScoreOutcome::SameWin),
            "smaller_win" => Some(ScoreOutcome::SmallerWin),
            "bigger_win" => Some(ScoreOutcome::BiggerWin),
            "extra_innings_unknown" => Some(ScoreOutcome::ExtraInningsUnknown),
            _ => None,
        }
    }
}

impl fmt::Display for ScoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify `(home, away)` final scores before and after rescoring.
pub fn classify(old: (f64, f64), new: (f64, f64), outcome_unknown: bool) -> ScoreOutcome {
    if outcome_unknown {
        return ScoreOutcome::ExtraInningsUnknown;
    }
    if old == new {
        return ScoreOutcome::SameScore;
    }
    let (new_home, new_away) = new;
    if new_home == new_away {
        return ScoreOutcome::Tied;
    }

    let old_margin = old.1 - old.0;
    let new_margin = new_away - new_home;
    if (old_margin >= 0.0) != (new_margin >= 0.0) {
        return ScoreOutcome::Reversed;
    }
    let (old_margin, new_margin) = (old_margin.abs(), new_margin.abs());
    if old_margin == new_margin {
        ScoreOutcome::SameWin
    } else if old_margin > new_margin {
        ScoreOutcome::SmallerWin
    } else {
        ScoreOutcome::BiggerWin
    }
}

/// Change to one team's win/loss record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDelta {
    pub team_id: String,
    pub wins: i32,
    pub losses: i32,
}

impl RecordDelta {
    fn new(team_id: &str) -> Self {
        RecordDelta {
            team_id: team_id.to_string(),
            wins: 0,
            losses: 0,
        }
    }

    fn is_zero(&self) -> bool {
        self.wins == 0 && self.losses == 0
    }
}

// ---------------------------------------------------------------------------
// GameSummary
// ---------------------------------------------------------------------------

/// Per-game result of a rescore, ready for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub game_id: String,
    pub home_team_id: String,
    pub away_team_id: String,
    pub old_home_score: f64,
    pub old_away_score: f64,
    pub new_home_score: f64,
    pub new_away_score: f64,
    /// Strikeouts added for home pitchers (away batting, top halves).
    pub new_home_strikeouts: u32,
    /// Strikeouts added for away pitchers (home batting, bottom halves).
    pub new_away_strikeouts: u32,
    pub dropped_appearances: usize,
    pub outcome_unknown: bool,
    pub outcome: ScoreOutcome,
}

impl GameSummary {
    /// Compare the recorded game (`original`, any order) to its rescore.
    pub fn from_analysis(original: &[PlayEvent], analysis: &GameAnalysis) -> Self {
        let (old_home_score, old_away_score) = original
            .iter()
            .max_by_key(|event| event.event_index)
            .map(PlayEvent::score_after_play)
            .unwrap_or_default();
        let (new_home_score, new_away_score) = analysis
            .events
            .last()
            .map(PlayEvent::score_after_play)
            .unwrap_or_default();

        let new_strikeouts = |top: bool| {
            analysis
                .events
                .iter()
                .filter(|event| event.top_of_inning == top && event.rescore_new_strikeout)
                .count() as u32
        };

        GameSummary {
            game_id: analysis.game_id.clone(),
            home_team_id: analysis.home_team_id.clone(),
            away_team_id: analysis.away_team_id.clone(),
            old_home_score,
            old_away_score,
            new_home_score,
            new_away_score,
            new_home_strikeouts: new_strikeouts(true),
            new_away_strikeouts: new_strikeouts(false),
            dropped_appearances: analysis.dropped_appearances,
            outcome_unknown: analysis.outcome_unknown,
            outcome: classify(
                (old_home_score, old_away_score),
                (new_home_score, new_away_score),
                analysis.outcome_unknown,
            ),
        }
    }

    pub fn was_outcome_reversed(&self) -> bool {
        self.outcome == ScoreOutcome::Reversed
    }

    pub fn old_winner(&self) -> Option<Side> {
        winner(self.old_home_score, self.old_away_score)
    }

    pub fn new_winner(&self) -> Option<Side> {
        winner(self.new_home_score, self.new_away_score)
    }

    /// Win/loss changes implied by the rescore. Empty when the winner did not
    /// change or the rescored outcome is unknown. A tie counts as neither.
    pub fn record_deltas(&self) -> Vec<RecordDelta> {
        if self.outcome_unknown {
            return Vec::new();
        }
        let (old, new) = (self.old_winner(), self.new_winner());
        if old == new {
            return Vec::new();
        }

        let mut home = RecordDelta::new(&self.home_team_id);
        let mut away = RecordDelta::new(&self.away_team_id);
        for (winner, delta) in [(old, -1), (new, 1)] {
            match winner {
                Some(Side::Home) => {
                    home.wins += delta;
                    away.losses += delta;
                }
                Some(Side::Away) => {
                    away.wins += delta;
                    home.losses += delta;
                }
                None => {}
            }
        }
        [home, away].into_iter().filter(|d| !d.is_zero()).collect()
    }
}

fn winner(home: f64, away: f64) -> Option<Side> {
    if home > away {
        Some(Side::Home)
    } else if away > home {
        Some(Side::Away)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
