// SQLite persistence for rescored game results.

use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use rescore_core::{GameSummary, RecordDelta, ScoreOutcome, Statistics};
use rusqlite::{params, Connection, OptionalExtension};

/// Results of every processed game: summaries, per-player stat changes,
/// per-team record changes and the games that could not be rescored.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS game_results (
                game_id             TEXT PRIMARY KEY,
                home_team_id        TEXT NOT NULL,
                away_team_id        TEXT NOT NULL,
                old_home_score      REAL NOT NULL,
                old_away_score      REAL NOT NULL,
                new_home_score      REAL NOT NULL,
                new_away_score      REAL NOT NULL,
                new_home_strikeouts INTEGER NOT NULL,
                new_away_strikeouts INTEGER NOT NULL,
                dropped_appearances INTEGER NOT NULL,
                outcome_unknown     INTEGER NOT NULL,
                outcome             TEXT NOT NULL,
                processed_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS stat_deltas (
                game_id   TEXT NOT NULL REFERENCES game_results(game_id) ON DELETE CASCADE,
                player_id TEXT NOT NULL,
                stat      TEXT NOT NULL,
                value     INTEGER NOT NULL,
                PRIMARY KEY (game_id, player_id, stat)
            );

            CREATE TABLE IF NOT EXISTS record_deltas (
                game_id TEXT NOT NULL REFERENCES game_results(game_id) ON DELETE CASCADE,
                team_id TEXT NOT NULL,
                wins    INTEGER NOT NULL,
                losses  INTEGER NOT NULL,
                PRIMARY KEY (game_id, team_id)
            );

            CREATE TABLE IF NOT EXISTS invalid_games (
                game_id     TEXT PRIMARY KEY,
                reason      TEXT NOT NULL,
                recorded_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A panic while holding the lock leaves the connection itself usable.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store one game's result, replacing anything recorded for the same game
    /// by an earlier run. Clears any earlier "invalid" mark for the game.
    pub fn save_game(&self, summary: &GameSummary, stats: &Statistics) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin save_game transaction")?;

        tx.execute(
            "DELETE FROM game_results WHERE game_id = ?1",
            params![summary.game_id],
        )
        .context("failed to clear previous game result")?;
        tx.execute(
            "DELETE FROM invalid_games WHERE game_id = ?1",
            params![summary.game_id],
        )
        .context("failed to clear invalid mark")?;

        tx.execute(
            "INSERT INTO game_results
                (game_id, home_team_id, away_team_id, old_home_score, old_away_score,
                 new_home_score, new_away_score, new_home_strikeouts, new_away_strikeouts,
                 dropped_appearances, outcome_unknown, outcome)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                summary.game_id,
                summary.home_team_id,
                summary.away_team_id,
                summary.old_home_score,
                summary.old_away_score,
                summary.new_home_score,
                summary.new_away_score,
                summary.new_home_strikeouts,
                summary.new_away_strikeouts,
                summary.dropped_appearances as i64,
                summary.outcome_unknown,
                summary.outcome.as_str(),
            ],
        )
        .context("failed to insert game result")?;

        for (player_id, stat, value) in stats.rows() {
            tx.execute(
                "INSERT INTO stat_deltas (game_id, player_id, stat, value)
                 VALUES (?1, ?2, ?3, ?4)",
                params![summary.game_id, player_id, stat, value],
            )
            .context("failed to insert stat delta")?;
        }

        for delta in summary.record_deltas() {
            tx.execute(
                "INSERT INTO record_deltas (game_id, team_id, wins, losses)
                 VALUES (?1, ?2, ?3, ?4)",
                params![summary.game_id, delta.team_id, delta.wins, delta.losses],
            )
            .context("failed to insert record delta")?;
        }

        tx.commit().context("failed to commit game result")?;
        Ok(())
    }

    /// Mark a game as impossible to rescore. Re-recording updates the reason.
    pub fn record_invalid(&self, game_id: &str, reason: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO invalid_games (game_id, reason) VALUES (?1, ?2)
             ON CONFLICT(game_id) DO UPDATE SET reason = excluded.reason",
            params![game_id, reason],
        )
        .context("failed to record invalid game")?;
        Ok(())
    }

    /// Load a stored summary. Returns `None` for games never saved.
    pub fn load_summary(&self, game_id: &str) -> Result<Option<GameSummary>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT game_id, home_team_id, away_team_id, old_home_score, old_away_score,
                        new_home_score, new_away_score, new_home_strikeouts, new_away_strikeouts,
                        dropped_appearances, outcome_unknown, outcome
                 FROM game_results WHERE game_id = ?1",
                params![game_id],
                |row| {
                    let dropped: i64 = row.get(9)?;
                    let outcome: String = row.get(11)?;
                    Ok((
                        GameSummary {
                            game_id: row.get(0)?,
                            home_team_id: row.get(1)?,
                            away_team_id: row.get(2)?,
                            old_home_score: row.get(3)?,
                            old_away_score: row.get(4)?,
                            new_home_score: row.get(5)?,
                            new_away_score: row.get(6)?,
                            new_home_strikeouts: row.get(7)?,
                            new_away_strikeouts: row.get(8)?,
                            dropped_appearances: dropped.max(0) as usize,
                            outcome_unknown: row.get(10)?,
                            outcome: ScoreOutcome::SameScore,
                        },
                        outcome,
                    ))
                },
            )
            .optional()
            .context("failed to query game result")?;

        let Some((mut summary, outcome)) = row else {
            return Ok(None);
        };
        summary.outcome = ScoreOutcome::from_str_outcome(&outcome)
            .with_context(|| format!("unknown outcome '{outcome}' stored for {game_id}"))?;
        Ok(Some(summary))
    }

    /// Ids and reasons of every game marked invalid, ordered by id.
    pub fn invalid_games(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT game_id, reason FROM invalid_games ORDER BY game_id")
            .context("failed to prepare invalid_games query")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("failed to query invalid games")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map invalid game rows")?;
        Ok(rows)
    }

    /// Number of games with a stored result.
    pub fn game_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM game_results", [], |row| row.get(0))
            .context("failed to count game results")?;
        Ok(count as usize)
    }

    /// Win/loss changes summed per team across all stored games. Teams whose
    /// changes cancel out are omitted.
    pub fn record_deltas(&self) -> Result<Vec<RecordDelta>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id, SUM(wins), SUM(losses) FROM record_deltas
                 GROUP BY team_id
                 HAVING SUM(wins) != 0 OR SUM(losses) != 0
                 ORDER BY team_id",
            )
            .context("failed to prepare record_deltas query")?;
        let deltas = stmt
            .query_map([], |row| {
                Ok(RecordDelta {
                    team_id: row.get(0)?,
                    wins: row.get(1)?,
                    losses: row.get(2)?,
                })
            })
            .context("failed to query record deltas")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map record delta rows")?;
        Ok(deltas)
    }

    /// Per-player stat changes summed across all stored games.
    pub fn stat_totals(&self) -> Result<Statistics> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT player_id, stat, SUM(value) FROM stat_deltas
                 GROUP BY player_id, stat",
            )
            .context("failed to prepare stat_totals query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .context("failed to query stat totals")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map stat total rows")?;

        let mut totals = Statistics::new();
        for (player_id, stat, value) in rows {
            totals.add(&player_id, &stat, value);
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rescore_core::PlayType;

    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn reversed_summary(game_id: &str) -> GameSummary {
        GameSummary {
            game_id: game_id.to_string(),
            home_team_id: "home".to_string(),
            away_team_id: "away".to_string(),
            old_home_score: 1.0,
            old_away_score: 2.0,
            new_home_score: 1.0,
            new_away_score: 0.0,
            new_home_strikeouts: 1,
            new_away_strikeouts: 0,
            dropped_appearances: 4,
            outcome_unknown: false,
            outcome: ScoreOutcome::Reversed,
        }
    }

    fn conversion_stats() -> Statistics {
        let mut stats = Statistics::new();
        stats.record_conversion("ace", "slugger", PlayType::HomeRun);
        stats
    }

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for name in ["game_results", "stat_deltas", "record_deltas", "invalid_games"] {
            assert!(tables.contains(&name.to_string()), "missing table {name}");
        }
    }

    #[test]
    fn save_and_load_summary_round_trip() {
        let db = test_db();
        let summary = reversed_summary("g1");
        db.save_game(&summary, &conversion_stats()).unwrap();

        let loaded = db.load_summary("g1").unwrap().unwrap();
        assert_eq!(loaded, summary);
        assert!(db.load_summary("missing").unwrap().is_none());
    }

    #[test]
    fn saving_twice_replaces_instead_of_doubling() {
        let db = test_db();
        let summary = reversed_summary("g1");
        db.save_game(&summary, &conversion_stats()).unwrap();
        db.save_game(&summary, &conversion_stats()).unwrap();

        assert_eq!(db.game_count().unwrap(), 1);
        let totals = db.stat_totals().unwrap();
        assert_eq!(totals.get("slugger", "STRIKEOUT-batted"), 1);
        assert_eq!(totals.get("ace", "HOME_RUN-pitched"), -1);

        let deltas = db.record_deltas().unwrap();
        assert_eq!(deltas.len(), 2);
        let away = deltas.iter().find(|d| d.team_id == "away").unwrap();
        assert_eq!((away.wins, away.losses), (-1, 1));
    }

    #[test]
    fn record_deltas_sum_across_games_and_drop_zeroes() {
        let db = test_db();
        db.save_game(&reversed_summary("g1"), &Statistics::new()).unwrap();

        // Second game swings the other way for the same teams.
        let mut back = reversed_summary("g2");
        back.old_home_score = 3.0;
        back.old_away_score = 1.0;
        back.new_home_score = 1.0;
        back.new_away_score = 2.0;
        db.save_game(&back, &Statistics::new()).unwrap();

        assert!(db.record_deltas().unwrap().is_empty());
    }

    #[test]
    fn invalid_games_are_upserted_and_cleared_by_a_later_save() {
        let db = test_db();
        db.record_invalid("g1", "no events").unwrap();
        db.record_invalid("g1", "game has no events").unwrap();
        db.record_invalid("g0", "fetch failed").unwrap();

        let invalid = db.invalid_games().unwrap();
        assert_eq!(
            invalid,
            vec![
                ("g0".to_string(), "fetch failed".to_string()),
                ("g1".to_string(), "game has no events".to_string()),
            ]
        );

        db.save_game(&reversed_summary("g1"), &Statistics::new()).unwrap();
        let invalid = db.invalid_games().unwrap();
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].0, "g0");
    }
}
