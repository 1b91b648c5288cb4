// Single-team rescoring state machine.
//
// Replays one team's plate appearances in order. Until the first fourth-strike
// correction that changes a play's outcome the recorded game is trusted
// (Faithful). From that play on the analyzer owns inning, outs, score and
// baserunners and rewrites every later event from its own simulation
// (Diverged). There is no way back to Faithful.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::advancement::{AdvancementModel, AdvancementTables, Situation};
use crate::bases::{Bases, Runner, BATTER_BOX, HOME};
use crate::event::{BaseRunner, PlayEvent, PlayType, Side};
use crate::stats::Statistics;

// ---------------------------------------------------------------------------
// Configuration and results
// ---------------------------------------------------------------------------

/// Knobs shared by both team analyzers of a game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Seed for advancement draws. The away analyzer uses `seed + 1`.
    #[serde(default)]
    pub seed: u64,
    /// Start every analyzer already diverged, re-simulating the whole game.
    /// Debugging aid; leave off for real rescoring.
    #[serde(default)]
    pub simulate_before_divergence: bool,
}

impl AnalyzerConfig {
    pub fn seed_for(&self, side: Side) -> u64 {
        match side {
            Side::Home => self.seed,
            Side::Away => self.seed.wrapping_add(1),
        }
    }
}

/// Everything one team analyzer produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamResult {
    /// Corrected events in input order.
    pub events: Vec<PlayEvent>,
    pub new_strikeouts: u32,
    /// Recorded play type of every event rewritten into a strikeout.
    pub converted_from: Vec<PlayType>,
    pub stats: Statistics,
    /// Original index of the event where the timeline diverged, if it did.
    pub diverged_at: Option<u32>,
}

// ---------------------------------------------------------------------------
// Strike counting
// ---------------------------------------------------------------------------

/// Strikes implied by a pitch sequence. Called and swinging strikes always
/// count; a foul counts only while the batter has fewer than two strikes.
pub fn count_strikes(pitches: &[char]) -> u32 {
    pitches.iter().fold(0, |strikes, pitch| match pitch {
        'C' | 'S' => strikes + 1,
        'F' if strikes < 2 => strikes + 1,
        _ => strikes,
    })
}

// ---------------------------------------------------------------------------
// TeamAnalyzer
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct TeamAnalyzer {
    side: Side,
    inning: u32,
    outs: u32,
    score: f64,
    diverged: bool,
    bases: Bases,
    advancement: AdvancementModel,
    new_strikeouts: u32,
    converted_from: Vec<PlayType>,
    stats: Statistics,
    diverged_at: Option<u32>,
}

impl TeamAnalyzer {
    pub fn new(side: Side, config: AnalyzerConfig, tables: Arc<AdvancementTables>) -> Self {
        TeamAnalyzer {
            side,
            inning: 0,
            outs: 0,
            score: 0.0,
            diverged: config.simulate_before_divergence,
            bases: Bases::new(),
            advancement: AdvancementModel::new(tables, config.seed_for(side)),
            new_strikeouts: 0,
            converted_from: Vec::new(),
            stats: Statistics::new(),
            diverged_at: None,
        }
    }

    pub fn is_diverged(&self) -> bool {
        self.diverged
    }

    pub fn inning(&self) -> u32 {
        self.inning
    }

    pub fn outs(&self) -> u32 {
        self.outs
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn bases(&self) -> &Bases {
        &self.bases
    }

    /// Process the next event of this team and return its corrected copy.
    pub fn process(&mut self, original: &PlayEvent) -> PlayEvent {
        let mut event = original.clone();

        self.sync(&mut event);
        self.detect_strikeout(&mut event);

        if self.diverged {
            self.resimulate(&mut event);
        } else {
            // Recorded movements stand; carry the post-play occupancy forward.
            self.bases = Bases::from_movements(&event.base_runners);
        }

        self.add_outs(event.outs_on_play);
        event
    }

    /// Consume the analyzer, pairing its bookkeeping with the corrected events.
    pub fn finish(self, events: Vec<PlayEvent>) -> TeamResult {
        TeamResult {
            events,
            new_strikeouts: self.new_strikeouts,
            converted_from: self.converted_from,
            stats: self.stats,
            diverged_at: self.diverged_at,
        }
    }

    fn sync(&mut self, event: &mut PlayEvent) {
        if self.diverged {
            event.inning = self.inning;
            event.outs_before_play = self.outs;
            event.set_score_for(self.side, self.score);
        } else {
            if event.inning != self.inning {
                self.bases.clear();
            }
            self.inning = event.inning;
            self.outs = event.outs_before_play;
            self.score = event.score_for(self.side);
        }
    }

    /// Rewrite a plate appearance that reached three strikes without being
    /// scored a strikeout. Returns true when the event was rewritten.
    fn detect_strikeout(&mut self, event: &mut PlayEvent) -> bool {
        if event.total_strikes < 3 || event.event_type == PlayType::Strikeout {
            return false;
        }
        // No recorded sequence: trust the strike total.
        if let Some(pitches) = event.pitch_sequence() {
            if count_strikes(pitches) < 3 {
                return false;
            }
        }

        let old = event.event_type;
        event.event_type = PlayType::Strikeout;
        event.total_strikes = 3;
        event.bases_hit = 0;
        event.runs_batted_in = 0;
        event.is_sacrifice_hit = false;
        event.is_walk = false;
        event.outs_on_play = 1;
        event.rescore_new_strikeout = true;

        self.new_strikeouts += 1;
        self.converted_from.push(old);
        self.stats
            .record_conversion(&event.pitcher_id, &event.batter_id, old);

        // An out that becomes a strikeout leaves the game state unchanged.
        if old != PlayType::Out && !self.diverged {
            debug!(
                side = %self.side,
                "diverging at {} (was {})",
                event, old
            );
            self.diverged = true;
            self.diverged_at = Some(event.event_index);
        }
        true
    }

    fn add_outs(&mut self, outs: u32) {
        self.outs += outs;
        if self.outs >= 3 {
            self.inning += 1;
            self.outs = 0;
            self.bases.clear();
        }
    }

    fn score_run(&mut self) {
        self.score += 1.0;
    }

    // -----------------------------------------------------------------------
    // Play handlers (Diverged only)
    // -----------------------------------------------------------------------

    fn resimulate(&mut self, event: &mut PlayEvent) {
        match event.event_type {
            PlayType::HomeRun => self.handle_extra_base_hit(event, HOME),
            PlayType::Triple => self.handle_extra_base_hit(event, 3),
            PlayType::Double => self.handle_extra_base_hit(event, 2),
            PlayType::Single => self.handle_single(event),
            PlayType::Walk | PlayType::IntentionalWalk | PlayType::HitByPitch => {
                self.handle_walk(event)
            }
            PlayType::FieldersChoice => self.handle_fielders_choice(event),
            PlayType::Out => self.handle_out(event),
            _ => self.persist_runners(event),
        }
    }

    /// Every runner scores, then the batter takes `batter_base`.
    fn handle_extra_base_hit(&mut self, event: &mut PlayEvent, batter_base: u8) {
        let mut movements = Vec::new();
        for base in 1..=3 {
            if let Some(runner) = self.bases.take(base) {
                movements.push(BaseRunner::synthesized(&runner, base, HOME));
                self.score_run();
            }
        }
        event.base_runners = movements;
        self.place_batter(event, batter_base);
    }

    fn handle_single(&mut self, event: &mut PlayEvent) {
        let mut movements = Vec::new();
        for base in 2..=3 {
            if let Some(runner) = self.bases.take(base) {
                movements.push(BaseRunner::synthesized(&runner, base, HOME));
                self.score_run();
            }
        }

        if let Some(runner) = self.bases.take(1) {
            let destination = self.advancement.single_advance(&runner.runner_id);
            movements.push(BaseRunner::synthesized(&runner, 1, destination));
            if destination >= HOME {
                self.score_run();
            } else {
                self.bases.place(destination, runner);
            }
        }

        event.base_runners = movements;
        self.place_batter(event, 1);
    }

    /// Only forced runners move; everyone else stays put.
    fn handle_walk(&mut self, event: &mut PlayEvent) {
        let mut origin: [u8; 4] = [0, 1, 2, 3];

        let scored = if self.bases.is_loaded() {
            self.bases.take(3)
        } else {
            None
        };
        if self.bases.occupied(1) && self.bases.occupied(2) {
            if let Some(runner) = self.bases.take(2) {
                self.bases.place(3, runner);
                origin[3] = 2;
            }
        }
        if let Some(runner) = self.bases.take(1) {
            self.bases.place(2, runner);
            origin[2] = 1;
        }

        let mut movements: Vec<BaseRunner> = self
            .bases
            .occupied_bases()
            .map(|(base, runner)| BaseRunner::synthesized(runner, origin[usize::from(base)], base))
            .collect();
        if let Some(runner) = scored {
            movements.push(BaseRunner::synthesized(&runner, 3, HOME));
            self.score_run();
        }

        event.base_runners = movements;
        self.place_batter(event, 1);
    }

    /// One runner is forced out (lead runner of the force chain) and the rest
    /// shift up a base. With first base empty the batter is out instead and
    /// first stays empty.
    fn handle_fielders_choice(&mut self, event: &mut PlayEvent) {
        event.outs_on_play = 1;

        let forced_out = if self.bases.is_loaded() {
            self.bases.take(3)
        } else if self.bases.occupied(1) && self.bases.occupied(2) {
            self.bases.take(2)
        } else {
            self.bases.take(1)
        };
        match &forced_out {
            Some(out) => {
                debug!(runner_id = %out.runner_id, "forced out on fielder's choice at {}", event)
            }
            None => event.event_type = PlayType::Out,
        }

        let mut movements = Vec::new();
        let scored = match self.bases.take(3) {
            Some(runner) if event.outs_before_play < 2 => Some(runner),
            Some(runner) => {
                debug!(runner_id = %runner.runner_id, "runner on third stranded by third out");
                None
            }
            None => None,
        };
        if let Some(runner) = self.bases.take(2) {
            movements.push(BaseRunner::synthesized(&runner, 2, 3));
            self.bases.place(3, runner);
        }
        if let Some(runner) = self.bases.take(1) {
            movements.push(BaseRunner::synthesized(&runner, 1, 2));
            self.bases.place(2, runner);
        }
        if let Some(runner) = scored {
            movements.push(BaseRunner::synthesized(&runner, 3, HOME));
            self.score_run();
        }

        event.base_runners = movements;
        if forced_out.is_some() {
            self.place_batter(event, 1);
        }
    }

    fn handle_out(&mut self, event: &mut PlayEvent) {
        if event.text_contains("ground out") {
            self.handle_tag_up(event, Situation::GroundOutTagUp);
        } else if event.is_sacrifice_hit
            || event.is_sacrifice_fly
            || event.text_contains("sacrifice")
            || event.text_contains("flyout")
        {
            self.handle_tag_up(event, Situation::FlyOutTagUp);
        } else {
            self.persist_runners(event);
        }
    }

    /// Runners try to advance one base, lead runner first. Every runner
    /// draws; only a runner with the base ahead open moves.
    fn handle_tag_up(&mut self, event: &mut PlayEvent, situation: Situation) {
        if event.outs_before_play >= 2 {
            event.base_runners = Vec::new();
            return;
        }

        let mut movements = Vec::new();
        for base in (1..=3u8).rev() {
            let Some(runner_id) = self.bases.get(base).map(|r| r.runner_id.clone()) else {
                continue;
            };
            let target = base + 1;
            let advances =
                self.advancement.tag_up(&runner_id, situation) && !self.bases.occupied(target);

            let Some(runner) = self.bases.take(base) else {
                continue;
            };
            if advances {
                movements.push(BaseRunner::synthesized(&runner, base, target));
                if target >= HOME {
                    self.score_run();
                } else {
                    self.bases.place(target, runner);
                }
            } else {
                movements.push(BaseRunner::synthesized(&runner, base, base));
                self.bases.place(base, runner);
            }
        }

        event.base_runners = movements;
    }

    /// Every tracked runner holds its base.
    fn persist_runners(&mut self, event: &mut PlayEvent) {
        event.base_runners = self
            .bases
            .occupied_bases()
            .map(|(base, runner)| BaseRunner::synthesized(runner, base, base))
            .collect();
    }

    /// Append the batter's movement and occupy `base` (or score from the box).
    fn place_batter(&mut self, event: &mut PlayEvent, base: u8) {
        let batter = Runner::new(event.batter_id.clone(), event.pitcher_id.clone());
        event
            .base_runners
            .push(BaseRunner::synthesized(&batter, BATTER_BOX, base));
        if base >= HOME {
            self.score_run();
        } else {
            self.bases.place(base, batter);
        }
    }
}

/// Run one team's events through a fresh analyzer.
pub fn analyze_team<'a, I>(
    events: I,
    side: Side,
    config: AnalyzerConfig,
    tables: Arc<AdvancementTables>,
) -> TeamResult
where
    I: IntoIterator<Item = &'a PlayEvent>,
{
    let mut analyzer = TeamAnalyzer::new(side, config, tables);
    let corrected = events
        .into_iter()
        .map(|event| analyzer.process(event))
        .collect();
    analyzer.finish(corrected)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
