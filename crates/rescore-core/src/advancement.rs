// Runner advancement odds and the seeded draw that resolves them.
//
// Three tables map a runner id to historical tendencies: taking an extra base
// from first on a single, tagging up on a ground out, and tagging up on a fly
// out or sacrifice. Every table carries a default row under the empty-string
// key, used when a runner is missing or has too few recorded attempts.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Deserialize;
use tracing::{debug, warn};

/// Key of the default (league aggregate) row in every table.
pub const DEFAULT_KEY: &str = "";

// ---------------------------------------------------------------------------
// Situations
// ---------------------------------------------------------------------------

/// The play situation an advancement decision is made in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Situation {
    /// Runner on first when the batter singles.
    SingleAdvance,
    /// Runner tagging up on a ground-ball out.
    GroundOutTagUp,
    /// Runner tagging up on a fly-ball out or sacrifice.
    FlyOutTagUp,
}

impl Situation {
    /// Minimum recorded attempts before a runner's own odds are trusted.
    pub const fn min_attempts(self) -> u32 {
        match self {
            Situation::SingleAdvance => 0,
            Situation::GroundOutTagUp => 10,
            Situation::FlyOutTagUp => 12,
        }
    }
}

impl fmt::Display for Situation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Situation::SingleAdvance => f.write_str("single-advance"),
            Situation::GroundOutTagUp => f.write_str("ground-out tag-up"),
            Situation::FlyOutTagUp => f.write_str("fly-out tag-up"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AdvancementError {
    #[error("{situation} table has no default row (empty runner id)")]
    MissingDefault { situation: Situation },

    #[error("failed to parse {situation} table: {source}")]
    Csv {
        situation: Situation,
        source: csv::Error,
    },
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// On-disk layout of an advancement table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// Comma-separated with a `runner_id,rate,attempts` header.
    #[default]
    Csv,
    /// Headerless tab-separated `id<TAB>rate<TAB>attempts`.
    Tsv,
}

/// Historical odds for one runner in one situation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvancementOdds {
    /// Probability in `[0, 1]`. For single-advance this is the chance the
    /// runner stops at second; for tag-ups it is the chance the runner advances.
    pub rate: f64,
    /// Number of recorded attempts backing `rate`.
    pub attempts: u32,
}

/// One situation's odds, keyed by runner id, with its default row split out.
#[derive(Debug, Clone)]
pub struct AdvancementTable {
    situation: Situation,
    default: AdvancementOdds,
    entries: HashMap<String, AdvancementOdds>,
}

impl AdvancementTable {
    /// Build a table. Fails if `entries` has no row under [`DEFAULT_KEY`].
    pub fn new(
        situation: Situation,
        mut entries: HashMap<String, AdvancementOdds>,
    ) -> Result<Self, AdvancementError> {
        let default = entries
            .remove(DEFAULT_KEY)
            .ok_or(AdvancementError::MissingDefault { situation })?;
        Ok(AdvancementTable {
            situation,
            default,
            entries,
        })
    }

    pub fn default_odds(&self) -> AdvancementOdds {
        self.default
    }

    /// Number of runner-specific rows (the default row is not counted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Odds for `runner_id`, falling back to the default row when the runner
    /// is unknown or below the situation's sample-size minimum.
    pub fn lookup(&self, runner_id: &str) -> AdvancementOdds {
        match self.entries.get(runner_id) {
            Some(odds) if odds.attempts >= self.situation.min_attempts() => *odds,
            Some(odds) => {
                debug!(
                    runner_id,
                    attempts = odds.attempts,
                    "too few {} attempts, using default odds",
                    self.situation
                );
                self.default
            }
            None => {
                debug!(runner_id, "no {} odds for runner, using default odds", self.situation);
                self.default
            }
        }
    }

    pub fn parse<R: Read>(
        situation: Situation,
        format: TableFormat,
        rdr: R,
    ) -> Result<Self, AdvancementError> {
        match format {
            TableFormat::Csv => Self::from_csv_reader(situation, rdr),
            TableFormat::Tsv => Self::from_tsv_reader(situation, rdr),
        }
    }

    /// Parse a table from CSV with a `runner_id,rate,attempts` header. An
    /// empty `runner_id` is the default row. Malformed rows are skipped.
    pub fn from_csv_reader<R: Read>(situation: Situation, rdr: R) -> Result<Self, AdvancementError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);
        Self::from_reader(situation, reader)
    }

    /// Parse a headerless tab-separated table (`id<TAB>rate<TAB>attempts`),
    /// the layout of the original advancement exports.
    pub fn from_tsv_reader<R: Read>(situation: Situation, rdr: R) -> Result<Self, AdvancementError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);
        Self::from_reader(situation, reader)
    }

    fn from_reader<R: Read>(
        situation: Situation,
        mut reader: csv::Reader<R>,
    ) -> Result<Self, AdvancementError> {
        let mut entries = HashMap::new();
        for result in reader.deserialize::<RawOddsRow>() {
            match result {
                Ok(raw) => {
                    if !raw.rate.is_finite() || !(0.0..=1.0).contains(&raw.rate) {
                        warn!(
                            "skipping {situation} row for '{}': rate {} outside [0, 1]",
                            raw.runner_id, raw.rate
                        );
                        continue;
                    }
                    let attempts = raw
                        .attempts
                        .filter(|a| a.is_finite() && *a >= 0.0)
                        .map(|a| a.round() as u32)
                        .unwrap_or(0);
                    if entries.contains_key(&raw.runner_id) {
                        warn!(
                            "duplicate {situation} row for '{}', using latest value",
                            raw.runner_id
                        );
                    }
                    entries.insert(
                        raw.runner_id,
                        AdvancementOdds {
                            rate: raw.rate,
                            attempts,
                        },
                    );
                }
                Err(e) if e.is_io_error() => {
                    return Err(AdvancementError::Csv {
                        situation,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!("skipping malformed {situation} row: {}", e);
                }
            }
        }
        Self::new(situation, entries)
    }
}

#[derive(Debug, Deserialize)]
struct RawOddsRow {
    #[serde(default)]
    runner_id: String,
    rate: f64,
    #[serde(default)]
    attempts: Option<f64>,
}

/// The three tables the simulator consults.
#[derive(Debug, Clone)]
pub struct AdvancementTables {
    pub single: AdvancementTable,
    pub ground_out: AdvancementTable,
    pub fly_out: AdvancementTable,
}

impl AdvancementTables {
    pub fn table(&self, situation: Situation) -> &AdvancementTable {
        match situation {
            Situation::SingleAdvance => &self.single,
            Situation::GroundOutTagUp => &self.ground_out,
            Situation::FlyOutTagUp => &self.fly_out,
        }
    }

    /// Tables holding only a default row for each situation.
    pub fn uniform(single_rate: f64, ground_out_rate: f64, fly_out_rate: f64) -> Self {
        let only_default = |situation, rate| AdvancementTable {
            situation,
            default: AdvancementOdds { rate, attempts: 0 },
            entries: HashMap::new(),
        };
        AdvancementTables {
            single: only_default(Situation::SingleAdvance, single_rate),
            ground_out: only_default(Situation::GroundOutTagUp, ground_out_rate),
            fly_out: only_default(Situation::FlyOutTagUp, fly_out_rate),
        }
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Seeded advancement decisions. Identical seed and tables always produce the
/// identical sequence of outcomes.
#[derive(Debug, Clone)]
pub struct AdvancementModel {
    tables: Arc<AdvancementTables>,
    rng: ChaCha20Rng,
}

impl AdvancementModel {
    pub fn new(tables: Arc<AdvancementTables>, seed: u64) -> Self {
        AdvancementModel {
            tables,
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Draw a percentage in `[0, 100)` and compare it to `rate`.
    fn draw(&mut self, rate: f64) -> bool {
        let roll: u32 = self.rng.gen_range(0..100);
        f64::from(roll) < rate * 100.0
    }

    /// Destination base for the runner on first when the batter singles:
    /// second base with the table's probability, otherwise third.
    pub fn single_advance(&mut self, runner_id: &str) -> u8 {
        let odds = self.tables.single.lookup(runner_id);
        if self.draw(odds.rate) {
            2
        } else {
            3
        }
    }

    /// Whether a runner advances one base on a tag-up play.
    pub fn tag_up(&mut self, runner_id: &str, situation: Situation) -> bool {
        let odds = self.tables.table(situation).lookup(runner_id);
        self.draw(odds.rate)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
