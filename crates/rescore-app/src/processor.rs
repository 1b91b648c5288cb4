// Batch driver: fetch, rescore, persist and report every listed game.

use std::sync::Arc;

use anyhow::{Context, Result};
use rescore_core::{GameAnalyzer, GameSummary};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::db::Database;
use crate::report::ReportWriter;
use crate::source::EventSource;

/// What happened to one game.
#[derive(Debug, Clone, PartialEq)]
pub enum GameStatus {
    Rescored(GameSummary),
    /// The game could not be rescored, e.g. no events were found.
    Invalid { reason: String },
}

/// Totals for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub rescored: usize,
    pub invalid: usize,
    pub failed: usize,
    pub reversed: usize,
    pub new_strikeouts: u32,
    /// Summaries of rescored games, in game-list order.
    pub summaries: Vec<GameSummary>,
}

#[derive(Clone)]
pub struct Processor {
    source: Arc<dyn EventSource>,
    analyzer: GameAnalyzer,
    db: Arc<Database>,
    reports: ReportWriter,
    max_concurrent: usize,
}

impl Processor {
    pub fn new(
        source: Arc<dyn EventSource>,
        analyzer: GameAnalyzer,
        db: Arc<Database>,
        reports: ReportWriter,
        max_concurrent: usize,
    ) -> Self {
        Processor {
            source,
            analyzer,
            db,
            reports,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Process every game. A game that fails is logged and marked invalid;
    /// the others still run. Writes `summary.csv` at the end.
    pub async fn run(&self, game_ids: &[String]) -> Result<RunSummary> {
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for (position, game_id) in game_ids.iter().cloned().enumerate() {
            let this = self.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let status = this.process_game(&game_id).await;
                (position, game_id, status)
            });
        }

        let mut outcomes = Vec::with_capacity(game_ids.len());
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined.context("game task panicked")?);
        }
        outcomes.sort_by_key(|(position, _, _)| *position);

        let mut run = RunSummary::default();
        for (_, game_id, status) in outcomes {
            match status {
                Ok(GameStatus::Rescored(summary)) => {
                    run.rescored += 1;
                    run.new_strikeouts += summary.new_home_strikeouts + summary.new_away_strikeouts;
                    if summary.was_outcome_reversed() {
                        run.reversed += 1;
                    }
                    run.summaries.push(summary);
                }
                Ok(GameStatus::Invalid { .. }) => run.invalid += 1,
                Err(e) => {
                    warn!(game_id = %game_id, "failed to rescore game: {e:#}");
                    run.failed += 1;
                    if let Err(db_err) = self.db.record_invalid(&game_id, &format!("{e:#}")) {
                        warn!(game_id = %game_id, "failed to record failure: {db_err:#}");
                    }
                }
            }
        }

        let path = self.reports.write_summary(&run.summaries)?;
        info!(
            rescored = run.rescored,
            invalid = run.invalid,
            failed = run.failed,
            reversed = run.reversed,
            "run complete, summary written to {}",
            path.display()
        );
        Ok(run)
    }

    /// Rescore a single game end to end.
    pub async fn process_game(&self, game_id: &str) -> Result<GameStatus> {
        let events = self
            .source
            .fetch_game(game_id)
            .await
            .with_context(|| format!("failed to fetch events for {game_id}"))?;

        if events.is_empty() {
            let reason = "no events found".to_string();
            warn!(game_id, "skipping game: {reason}");
            self.db.record_invalid(game_id, &reason)?;
            return Ok(GameStatus::Invalid { reason });
        }

        let analyzer = self.analyzer.clone();
        let (events, analysis) = tokio::task::spawn_blocking(move || {
            let analysis = analyzer.analyze(&events);
            (events, analysis)
        })
        .await
        .context("analysis task panicked")?;
        let analysis = analysis.with_context(|| format!("failed to analyze {game_id}"))?;

        let summary = GameSummary::from_analysis(&events, &analysis);
        self.db.save_game(&summary, &analysis.stats)?;
        self.reports.write_game(&analysis, &summary)?;

        info!(
            game_id,
            new_strikeouts = analysis.new_strikeouts,
            dropped = analysis.dropped_appearances,
            outcome = %summary.outcome,
            "rescored {} -> {} (was {}-{}, now {}-{})",
            summary.away_team_id,
            summary.home_team_id,
            summary.old_away_score,
            summary.old_home_score,
            summary.new_away_score,
            summary.new_home_score,
        );
        Ok(GameStatus::Rescored(summary))
    }
}
