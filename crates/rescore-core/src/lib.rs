// Fourth-strike rescoring engine.
//
// Corrects play-by-play logs in which a batter reached three strikes without
// being struck out, re-simulates the rest of the affected team's game from
// that point and merges both teams back into one game record.

pub mod advancement;
pub mod bases;
pub mod event;
pub mod game;
pub mod outcome;
pub mod stats;
pub mod team;

pub use advancement::{
    AdvancementError, AdvancementModel, AdvancementOdds, AdvancementTable, AdvancementTables,
    Situation, TableFormat,
};
pub use event::{BaseRunner, Half, PlayEvent, PlayType, Side};
pub use game::{analyze_game, GameAnalysis, GameAnalyzer, GameError};
pub use outcome::{GameSummary, RecordDelta, ScoreOutcome};
pub use stats::Statistics;
pub use team::{analyze_team, AnalyzerConfig, TeamAnalyzer, TeamResult};
