// End-to-end replays of whole games through the public API.

use std::sync::Arc;

use rescore_core::{
    analyze_game, AdvancementTables, AnalyzerConfig, GameSummary, Half, PlayEvent, PlayType,
    ScoreOutcome,
};
use serde_json::{json, Value};

const HOME: &str = "home-team";
const AWAY: &str = "away-team";

#[derive(Default)]
struct GameLog {
    events: Vec<Value>,
}

impl GameLog {
    /// Append one recorded play and return it for further tweaks.
    fn play(
        &mut self,
        inning: u32,
        top: bool,
        outs: u32,
        event_type: &str,
        batter: &str,
        score: (u32, u32),
        runners: &[(&str, u8, u8)],
    ) -> &mut Value {
        let (batting, fielding) = if top { (AWAY, HOME) } else { (HOME, AWAY) };
        let base_runners: Vec<Value> = runners
            .iter()
            .map(|(id, before, after)| {
                json!({
                    "runner_id": id,
                    "responsible_pitcher_id": format!("{fielding}-ace"),
                    "base_before_play": before,
                    "base_after_play": after,
                    "was_base_stolen": false,
                    "was_caught_stealing": false,
                    "was_picked_off": false
                })
            })
            .collect();
        let index = self.events.len();
        self.events.push(json!({
            "game_id": "game-1",
            "event_type": event_type,
            "event_index": index,
            "inning": inning,
            "top_of_inning": top,
            "outs_before_play": outs,
            "batter_id": batter,
            "batter_team_id": batting,
            "pitcher_id": format!("{fielding}-ace"),
            "pitcher_team_id": fielding,
            "home_score": score.0,
            "away_score": score.1,
            "total_strikes": 1,
            "outs_on_play": if event_type == "OUT" { 1 } else { 0 },
            "event_text": [],
            "base_runners": base_runners,
            "weather": 11
        }));
        let last = self.events.len() - 1;
        &mut self.events[last]
    }

    fn three_outs(&mut self, inning: u32, top: bool, score: (u32, u32)) {
        for outs in 0..3 {
            self.play(inning, top, outs, "OUT", "filler", score, &[]);
        }
    }

    fn parse(&self) -> Vec<PlayEvent> {
        serde_json::from_value(Value::Array(self.events.clone())).unwrap()
    }
}

/// Home leads 1-0 on a first-inning homer until a two-out, two-run homer in
/// the top of the ninth. The homer came on a three-strike count.
fn ninth_inning_comeback(homer_strikes: u32) -> GameLog {
    let mut log = GameLog::default();
    log.three_outs(0, true, (0, 0));
    log.play(0, false, 0, "HOME_RUN", "home-slugger", (0, 0), &[("home-slugger", 0, 4)]);
    log.three_outs(0, false, (1, 0));
    for inning in 1..8 {
        log.three_outs(inning, true, (1, 0));
        log.three_outs(inning, false, (1, 0));
    }

    log.play(8, true, 0, "OUT", "filler", (1, 0), &[]);
    log.play(8, true, 1, "OUT", "filler", (1, 0), &[]);
    log.play(8, true, 2, "SINGLE", "away-speedster", (1, 0), &[("away-speedster", 0, 1)]);
    let homer = log.play(
        8,
        true,
        2,
        "HOME_RUN",
        "away-slugger",
        (1, 0),
        &[("away-speedster", 1, 4), ("away-slugger", 0, 4)],
    );
    homer["total_strikes"] = json!(homer_strikes);
    homer["pitches"] = json!("CSC");
    log.play(8, true, 2, "OUT", "filler", (1, 2), &[]);
    log.three_outs(8, false, (1, 2));
    log
}

fn tables() -> Arc<AdvancementTables> {
    Arc::new(AdvancementTables::uniform(0.5, 0.5, 0.5))
}

#[test]
fn unaffected_game_passes_through() {
    let recorded = ninth_inning_comeback(2).parse();
    let analysis = analyze_game(&recorded, AnalyzerConfig::default(), tables()).unwrap();

    assert_eq!(analysis.events, recorded);
    assert_eq!(analysis.new_strikeouts, 0);
    assert_eq!(analysis.dropped_appearances, 0);
    assert_eq!(analysis.end_of_game, Some((8, Half::Bottom)));

    let summary = GameSummary::from_analysis(&recorded, &analysis);
    assert_eq!(summary.outcome, ScoreOutcome::SameScore);
    assert!(summary.record_deltas().is_empty());
}

#[test]
fn fourth_strike_homer_reverses_the_result() {
    let recorded = ninth_inning_comeback(3).parse();
    let analysis = analyze_game(&recorded, AnalyzerConfig::default(), tables()).unwrap();

    assert_eq!(analysis.new_strikeouts, 1);
    assert_eq!(analysis.converted_from, vec![PlayType::HomeRun]);
    assert_eq!(analysis.away_diverged_at, Some(52));
    assert_eq!(analysis.home_diverged_at, None);

    // Home leads after the top of the ninth: the trailing away out that
    // spilled into the tenth and the whole bottom of the ninth go.
    assert_eq!(analysis.end_of_game, Some((8, Half::Top)));
    assert_eq!(analysis.dropped_appearances, 4);
    assert!(!analysis.outcome_unknown);

    let strikeout = analysis.events.last().unwrap();
    assert_eq!(strikeout.event_type, PlayType::Strikeout);
    assert!(strikeout.rescore_new_strikeout);
    assert_eq!(strikeout.outs_on_play, 1);
    assert_eq!(strikeout.base_runners.len(), 1);
    assert_eq!(strikeout.base_runners[0].base_after_play, 1);
    assert_eq!(strikeout.score_after_play(), (1.0, 0.0));

    let n = analysis.events.len() as u32;
    let indices: Vec<u32> = analysis.events.iter().map(|e| e.event_index).collect();
    assert_eq!(indices, (0..n).collect::<Vec<_>>());

    assert_eq!(analysis.stats.get("away-slugger", "STRIKEOUT-batted"), 1);
    assert_eq!(analysis.stats.get("away-slugger", "HOME_RUN-batted"), -1);
    assert_eq!(analysis.stats.get("home-team-ace", "STRIKEOUT-pitched"), 1);

    let summary = GameSummary::from_analysis(&recorded, &analysis);
    assert_eq!((summary.old_home_score, summary.old_away_score), (1.0, 2.0));
    assert_eq!((summary.new_home_score, summary.new_away_score), (1.0, 0.0));
    assert_eq!(summary.outcome, ScoreOutcome::Reversed);
    assert_eq!(summary.new_home_strikeouts, 1);
    assert_eq!(summary.new_away_strikeouts, 0);

    let deltas = summary.record_deltas();
    let home = deltas.iter().find(|d| d.team_id == HOME).unwrap();
    let away = deltas.iter().find(|d| d.team_id == AWAY).unwrap();
    assert_eq!((home.wins, home.losses), (1, -1));
    assert_eq!((away.wins, away.losses), (-1, 1));
}

#[test]
fn rescore_is_reproducible_and_keeps_unknown_fields() {
    let recorded = ninth_inning_comeback(3).parse();
    let config = AnalyzerConfig {
        seed: 17,
        simulate_before_divergence: false,
    };
    let first = analyze_game(&recorded, config, tables()).unwrap();
    let second = analyze_game(&recorded, config, tables()).unwrap();

    let first_json = serde_json::to_string(&first.events).unwrap();
    let second_json = serde_json::to_string(&second.events).unwrap();
    assert_eq!(first_json, second_json);

    let value: Value = serde_json::from_str(&first_json).unwrap();
    assert!(value
        .as_array()
        .unwrap()
        .iter()
        .all(|event| event["weather"] == 11));
}
