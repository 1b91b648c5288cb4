// Report files: one JSON document per rescored game plus a run-level CSV.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rescore_core::{GameAnalysis, GameSummary, Half, PlayEvent, PlayType, Statistics};
use serde::Serialize;

pub const SUMMARY_FILE: &str = "summary.csv";

#[derive(Serialize)]
struct GameReport<'a> {
    generated_at: DateTime<Utc>,
    summary: &'a GameSummary,
    end_of_game: Option<EndOfGame>,
    home_diverged_at: Option<u32>,
    away_diverged_at: Option<u32>,
    converted_from: &'a [PlayType],
    stats: &'a Statistics,
    events: &'a [PlayEvent],
}

#[derive(Serialize)]
struct EndOfGame {
    inning: u32,
    half: Half,
}

/// One line of `summary.csv`.
#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    game_id: &'a str,
    home_team_id: &'a str,
    away_team_id: &'a str,
    old_home_score: f64,
    old_away_score: f64,
    new_home_score: f64,
    new_away_score: f64,
    new_home_strikeouts: u32,
    new_away_strikeouts: u32,
    dropped_appearances: usize,
    outcome: &'static str,
    reversed: bool,
}

impl<'a> From<&'a GameSummary> for SummaryRow<'a> {
    fn from(s: &'a GameSummary) -> Self {
        SummaryRow {
            game_id: &s.game_id,
            home_team_id: &s.home_team_id,
            away_team_id: &s.away_team_id,
            old_home_score: s.old_home_score,
            old_away_score: s.old_away_score,
            new_home_score: s.new_home_score,
            new_away_score: s.new_away_score,
            new_home_strikeouts: s.new_home_strikeouts,
            new_away_strikeouts: s.new_away_strikeouts,
            dropped_appearances: s.dropped_appearances,
            outcome: s.outcome.as_str(),
            reversed: s.was_outcome_reversed(),
        }
    }
}

/// Writes reports under one output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    /// Create the output directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(ReportWriter { dir })
    }

    /// Write `<dir>/<game_id>.json` with the summary and corrected events.
    /// Ids that would name a path outside `dir` are rejected.
    pub fn write_game(&self, analysis: &GameAnalysis, summary: &GameSummary) -> Result<PathBuf> {
        let path = self.dir.join(report_file_name(&summary.game_id)?);
        let report = GameReport {
            generated_at: Utc::now(),
            summary,
            end_of_game: analysis
                .end_of_game
                .map(|(inning, half)| EndOfGame { inning, half }),
            home_diverged_at: analysis.home_diverged_at,
            away_diverged_at: analysis.away_diverged_at,
            converted_from: &analysis.converted_from,
            stats: &analysis.stats,
            events: &analysis.events,
        };
        let json = serde_json::to_string_pretty(&report)
            .with_context(|| format!("failed to serialize report for {}", summary.game_id))?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Write `<dir>/summary.csv` with one row per game, replacing any
    /// earlier file.
    pub fn write_summary(&self, summaries: &[GameSummary]) -> Result<PathBuf> {
        let path = self.dir.join(SUMMARY_FILE);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        for summary in summaries {
            writer
                .serialize(SummaryRow::from(summary))
                .with_context(|| format!("failed to write summary row for {}", summary.game_id))?;
        }
        writer
            .flush()
            .with_context(|| format!("failed to flush {}", path.display()))?;
        Ok(path)
    }
}

/// File name for one game's report. The id must be a single plain path
/// component.
fn report_file_name(game_id: &str) -> Result<String> {
    if game_id.is_empty()
        || game_id.contains(['/', '\\', '\0'])
        || game_id.contains("..")
    {
        bail!("game id {game_id:?} is not usable as a report file name");
    }
    Ok(format!("{game_id}.json"))
}
