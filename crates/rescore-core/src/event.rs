// Play-by-play event records as served by the statistics service.
//
// Field names follow the service's snake_case schema. Any field the rescorer
// does not model is captured in `extra` and written back out unchanged.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::bases::{Runner, HOME};

// ---------------------------------------------------------------------------
// Play classification
// ---------------------------------------------------------------------------

/// Classification of a single play event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum PlayType {
    #[default]
    Unknown,
    None,
    Out,
    Strikeout,
    StolenBase,
    CaughtStealing,
    Pickoff,
    WildPitch,
    Balk,
    OtherAdvance,
    Walk,
    IntentionalWalk,
    HitByPitch,
    FieldersChoice,
    Single,
    Double,
    Triple,
    HomeRun,
}

impl PlayType {
    /// Parse the service's event type string. Unrecognized strings map to
    /// `Unknown` rather than failing the whole game.
    pub fn from_str_type(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "NONE" => PlayType::None,
            "OUT" => PlayType::Out,
            "STRIKEOUT" => PlayType::Strikeout,
            "STOLEN_BASE" => PlayType::StolenBase,
            "CAUGHT_STEALING" => PlayType::CaughtStealing,
            "PICKOFF" => PlayType::Pickoff,
            "WILD_PITCH" => PlayType::WildPitch,
            "BALK" => PlayType::Balk,
            "OTHER_ADVANCE" => PlayType::OtherAdvance,
            "WALK" => PlayType::Walk,
            "INTENTIONAL_WALK" => PlayType::IntentionalWalk,
            "HIT_BY_PITCH" => PlayType::HitByPitch,
            "FIELDERS_CHOICE" => PlayType::FieldersChoice,
            "SINGLE" => PlayType::Single,
            "DOUBLE" => PlayType::Double,
            "TRIPLE" => PlayType::Triple,
            "HOME_RUN" => PlayType::HomeRun,
            _ => PlayType::Unknown,
        }
    }

    /// The wire representation of this play type.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayType::Unknown => "UNKNOWN",
            PlayType::None => "NONE",
            PlayType::Out => "OUT",
            PlayType::Strikeout => "STRIKEOUT",
            PlayType::StolenBase => "STOLEN_BASE",
            PlayType::CaughtStealing => "CAUGHT_STEALING",
            PlayType::Pickoff => "PICKOFF",
            PlayType::WildPitch => "WILD_PITCH",
            PlayType::Balk => "BALK",
            PlayType::OtherAdvance => "OTHER_ADVANCE",
            PlayType::Walk => "WALK",
            PlayType::IntentionalWalk => "INTENTIONAL_WALK",
            PlayType::HitByPitch => "HIT_BY_PITCH",
            PlayType::FieldersChoice => "FIELDERS_CHOICE",
            PlayType::Single => "SINGLE",
            PlayType::Double => "DOUBLE",
            PlayType::Triple => "TRIPLE",
            PlayType::HomeRun => "HOME_RUN",
        }
    }
}

impl fmt::Display for PlayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PlayType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PlayType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(PlayType::from_str_type)
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Half-innings and sides
// ---------------------------------------------------------------------------

/// Which half of an inning an event belongs to. Orders top before bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Half {
    Top,
    Bottom,
}

impl Half {
    /// The side at bat during this half.
    pub fn batting_side(self) -> Side {
        match self {
            Half::Top => Side::Away,
            Half::Bottom => Side::Home,
        }
    }
}

impl fmt::Display for Half {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Half::Top => f.write_str("Top"),
            Half::Bottom => f.write_str("Bot"),
        }
    }
}

/// Home or away team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Home => f.write_str("home"),
            Side::Away => f.write_str("away"),
        }
    }
}

// ---------------------------------------------------------------------------
// Baserunner movement
// ---------------------------------------------------------------------------

/// One runner's movement on a play. Bases: 0 = batter's box, 1-3 = bases,
/// 4 = scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseRunner {
    #[serde(default, deserialize_with = "null_as_default")]
    pub runner_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub responsible_pitcher_id: String,
    #[serde(default)]
    pub base_before_play: u8,
    #[serde(default)]
    pub base_after_play: u8,
    #[serde(default)]
    pub was_base_stolen: bool,
    #[serde(default)]
    pub was_caught_stealing: bool,
    #[serde(default)]
    pub was_picked_off: bool,
}

impl BaseRunner {
    /// A movement produced by the simulator. Steals and pickoffs are never
    /// modeled, so those flags are always false.
    pub fn synthesized(runner: &Runner, base_before: u8, base_after: u8) -> Self {
        BaseRunner {
            runner_id: runner.runner_id.clone(),
            responsible_pitcher_id: runner.pitcher_id.clone(),
            base_before_play: base_before,
            base_after_play: base_after,
            was_base_stolen: false,
            was_caught_stealing: false,
            was_picked_off: false,
        }
    }

    pub fn scored(&self) -> bool {
        self.base_after_play >= HOME
    }
}

// ---------------------------------------------------------------------------
// PlayEvent
// ---------------------------------------------------------------------------

/// A single play event for one game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub game_id: String,
    #[serde(default)]
    pub event_type: PlayType,
    #[serde(default)]
    pub event_index: u32,
    /// Zero-based inning index (the 9th inning is 8).
    #[serde(default)]
    pub inning: u32,
    #[serde(default)]
    pub top_of_inning: bool,
    #[serde(default)]
    pub outs_before_play: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub batter_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub batter_team_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pitcher_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pitcher_team_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub home_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub away_score: f64,
    /// Pitch result codes (C = called strike, S = swinging strike, F = foul, ...).
    #[serde(default, deserialize_with = "deserialize_pitches")]
    pub pitches: Option<Vec<char>>,
    /// Newer exports carry the sequence under this name; preferred when present.
    #[serde(
        default,
        deserialize_with = "deserialize_pitches",
        skip_serializing_if = "Option::is_none"
    )]
    pub pitches_list: Option<Vec<char>>,
    #[serde(default)]
    pub total_strikes: u32,
    #[serde(default)]
    pub total_balls: u32,
    #[serde(default)]
    pub total_fouls: u32,
    #[serde(default)]
    pub bases_hit: u32,
    #[serde(default)]
    pub runs_batted_in: u32,
    #[serde(default)]
    pub is_sacrifice_hit: bool,
    #[serde(default)]
    pub is_sacrifice_fly: bool,
    #[serde(default)]
    pub is_walk: bool,
    #[serde(default)]
    pub outs_on_play: u32,
    #[serde(default)]
    pub is_double_play: bool,
    #[serde(default)]
    pub is_triple_play: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_text: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub base_runners: Vec<BaseRunner>,
    /// Set when the rescorer rewrote this event into a strikeout.
    #[serde(default)]
    pub rescore_new_strikeout: bool,
    /// Passthrough for fields the rescorer does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PlayEvent {
    pub fn half(&self) -> Half {
        if self.top_of_inning {
            Half::Top
        } else {
            Half::Bottom
        }
    }

    pub fn batting_side(&self) -> Side {
        self.half().batting_side()
    }

    /// The recorded pitch sequence, if the source provided one.
    pub fn pitch_sequence(&self) -> Option<&[char]> {
        self.pitches_list.as_deref().or(self.pitches.as_deref())
    }

    pub fn score_for(&self, side: Side) -> f64 {
        match side {
            Side::Home => self.home_score,
            Side::Away => self.away_score,
        }
    }

    pub fn set_score_for(&mut self, side: Side, score: f64) {
        match side {
            Side::Home => self.home_score = score,
            Side::Away => self.away_score = score,
        }
    }

    /// Runs that crossed the plate on this play.
    pub fn runs_on_play(&self) -> u32 {
        self.base_runners.iter().filter(|r| r.scored()).count() as u32
    }

    /// `(home, away)` score once this play has finished. The score fields on
    /// an event hold the score before the play.
    pub fn score_after_play(&self) -> (f64, f64) {
        let runs = f64::from(self.runs_on_play());
        match self.batting_side() {
            Side::Home => (self.home_score + runs, self.away_score),
            Side::Away => (self.home_score, self.away_score + runs),
        }
    }

    /// True when any description line contains `needle`.
    pub fn text_contains(&self, needle: &str) -> bool {
        self.event_text.iter().any(|line| line.contains(needle))
    }
}

impl fmt::Display for PlayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}{}, {} out: {}",
            self.event_index,
            self.half(),
            self.inning,
            self.outs_before_play,
            self.event_type
        )
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Pitch sequences arrive either as a string (`"CSF"`) or as a list of
/// single-code strings (`["C", "S", "F"]`).
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPitches {
    Text(String),
    List(Vec<String>),
}

fn deserialize_pitches<'de, D>(deserializer: D) -> Result<Option<Vec<char>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawPitches>::deserialize(deserializer)?;
    Ok(raw.map(|pitches| match pitches {
        RawPitches::Text(text) => text.chars().filter(|c| !c.is_whitespace()).collect(),
        RawPitches::List(codes) => codes
            .iter()
            .filter_map(|code| code.trim().chars().next())
            .collect(),
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
