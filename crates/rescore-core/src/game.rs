// Whole-game rescoring: split by batting team, run both team analyzers,
// merge the two timelines and find where the corrected game really ends.

use std::cmp::Ordering;
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::advancement::AdvancementTables;
use crate::event::{Half, PlayEvent, PlayType, Side};
use crate::stats::Statistics;
use crate::team::{analyze_team, AnalyzerConfig, TeamResult};

/// Zero-based index of the ninth inning, the first one that can end a game.
pub const REGULATION_LAST_INNING: u32 = 8;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("game has no events")]
    NoEvents,

    #[error("{side} team analyzer panicked")]
    AnalyzerPanicked { side: Side },
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Merged, corrected game plus game-level bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct GameAnalysis {
    pub game_id: String,
    pub home_team_id: String,
    pub away_team_id: String,
    /// Corrected events in game order, indexed `0..N`.
    pub events: Vec<PlayEvent>,
    pub new_strikeouts: u32,
    pub converted_from: Vec<PlayType>,
    pub stats: Statistics,
    /// Events cut because the corrected game ended before them.
    pub dropped_appearances: usize,
    /// No half-inning ended the game within the available events.
    pub outcome_unknown: bool,
    /// The half-inning that ended the game, when one did.
    pub end_of_game: Option<(u32, Half)>,
    pub home_diverged_at: Option<u32>,
    pub away_diverged_at: Option<u32>,
}

// ---------------------------------------------------------------------------
// GameAnalyzer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GameAnalyzer {
    config: AnalyzerConfig,
    tables: Arc<AdvancementTables>,
}

impl GameAnalyzer {
    pub fn new(config: AnalyzerConfig, tables: Arc<AdvancementTables>) -> Self {
        GameAnalyzer { config, tables }
    }

    /// Rescore one game. `events` may arrive in any order.
    pub fn analyze(&self, events: &[PlayEvent]) -> Result<GameAnalysis, GameError> {
        let mut ordered: Vec<&PlayEvent> = events.iter().collect();
        ordered.sort_by_key(|event| event.event_index);
        let first = ordered.first().ok_or(GameError::NoEvents)?;

        let game_id = first.game_id.clone();
        let home_team_id = first.pitcher_team_id.clone();
        let away_team_id = first.batter_team_id.clone();

        let mut home_events = Vec::new();
        let mut away_events = Vec::new();
        for event in ordered {
            if event.batter_team_id == home_team_id {
                home_events.push(event);
            } else if event.batter_team_id == away_team_id {
                away_events.push(event);
            } else {
                warn!(
                    game_id = %game_id,
                    "skipping event {} batted by unknown team '{}'",
                    event.event_index, event.batter_team_id
                );
            }
        }

        let (home, away) = self.run_teams(&home_events, &away_events)?;
        Ok(merge(game_id, home_team_id, away_team_id, home, away))
    }

    fn run_teams(
        &self,
        home_events: &[&PlayEvent],
        away_events: &[&PlayEvent],
    ) -> Result<(TeamResult, TeamResult), GameError> {
        let config = self.config;
        let home_tables = Arc::clone(&self.tables);
        let away_tables = Arc::clone(&self.tables);

        let (home, away) = thread::scope(|scope| {
            let home = scope.spawn(move || {
                analyze_team(home_events.iter().copied(), Side::Home, config, home_tables)
            });
            let away = scope.spawn(move || {
                analyze_team(away_events.iter().copied(), Side::Away, config, away_tables)
            });
            (home.join(), away.join())
        });

        let home = home.map_err(|_| GameError::AnalyzerPanicked { side: Side::Home })?;
        let away = away.map_err(|_| GameError::AnalyzerPanicked { side: Side::Away })?;
        Ok((home, away))
    }
}

/// Rescore one game with a throwaway [`GameAnalyzer`].
pub fn analyze_game(
    events: &[PlayEvent],
    config: AnalyzerConfig,
    tables: Arc<AdvancementTables>,
) -> Result<GameAnalysis, GameError> {
    GameAnalyzer::new(config, tables).analyze(events)
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

fn merge(
    game_id: String,
    home_team_id: String,
    away_team_id: String,
    home: TeamResult,
    away: TeamResult,
) -> GameAnalysis {
    let mut events: Vec<PlayEvent> = home.events.into_iter().chain(away.events).collect();
    events.sort_by(game_order);
    reconcile_scores(&mut events);
    reindex(&mut events);

    let end_of_game = find_end_of_game(&events);
    let dropped_appearances = match end_of_game {
        Some(end) => drop_after(&mut events, end),
        None => {
            debug!(game_id = %game_id, "no terminal half-inning found, outcome unknown");
            0
        }
    };

    let mut stats = home.stats;
    stats.merge(&away.stats);
    let mut converted_from = home.converted_from;
    converted_from.extend(away.converted_from);

    GameAnalysis {
        game_id,
        home_team_id,
        away_team_id,
        events,
        new_strikeouts: home.new_strikeouts + away.new_strikeouts,
        converted_from,
        stats,
        dropped_appearances,
        outcome_unknown: end_of_game.is_none(),
        end_of_game,
        home_diverged_at: home.diverged_at,
        away_diverged_at: away.diverged_at,
    }
}

/// Inning, then top before bottom, then outs, then the recorded index.
fn game_order(a: &PlayEvent, b: &PlayEvent) -> Ordering {
    a.inning
        .cmp(&b.inning)
        .then(a.half().cmp(&b.half()))
        .then(a.outs_before_play.cmp(&b.outs_before_play))
        .then(a.event_index.cmp(&b.event_index))
}

/// Each team analyzer only maintains the batting side's score. Fill in the
/// fielding side from the latest score that side reached at bat.
pub fn reconcile_scores(events: &mut [PlayEvent]) {
    let mut home = 0.0;
    let mut away = 0.0;
    for event in events.iter_mut() {
        match event.half() {
            Half::Top => {
                event.home_score = home;
                away = event.score_after_play().1;
            }
            Half::Bottom => {
                event.away_score = away;
                home = event.score_after_play().0;
            }
        }
    }
}

pub fn reindex(events: &mut [PlayEvent]) {
    for (index, event) in events.iter_mut().enumerate() {
        event.event_index = index as u32;
    }
}

/// Scan half-innings from the top of the ninth. A top half ends the game when
/// the home team leads after it; a bottom half ends it when the score is not
/// tied. A half-inning without events means the outcome cannot be known.
pub fn find_end_of_game(events: &[PlayEvent]) -> Option<(u32, Half)> {
    let mut inning = REGULATION_LAST_INNING;
    let mut half = Half::Top;
    loop {
        let last = events
            .iter()
            .rev()
            .find(|event| event.inning == inning && event.half() == half)?;
        let (home, away) = last.score_after_play();
        let ended = match half {
            Half::Top => home > away,
            Half::Bottom => home != away,
        };
        if ended {
            return Some((inning, half));
        }
        match half {
            Half::Top => half = Half::Bottom,
            Half::Bottom => {
                inning += 1;
                half = Half::Top;
            }
        }
    }
}

/// Remove everything after the half-inning `end`. `events` must be in game
/// order, so the survivors keep their contiguous indices.
fn drop_after(events: &mut Vec<PlayEvent>, end: (u32, Half)) -> usize {
    let keep = events
        .iter()
        .position(|event| (event.inning, event.half()) > end)
        .unwrap_or(events.len());
    let dropped = events.len() - keep;
    if dropped > 0 {
        debug!(
            "game ends after {}{}, dropping {} events",
            end.1, end.0, dropped
        );
    }
    events.truncate(keep);
    dropped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
