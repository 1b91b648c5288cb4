// Per-player statistic deltas produced by a rescore.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::PlayType;

/// Counter deltas keyed by player id, then by stat name.
///
/// Stat names follow `<PLAY_TYPE>-pitched` and `<PLAY_TYPE>-batted`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statistics {
    players: BTreeMap<String, BTreeMap<String, i64>>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, player_id: &str, stat: &str, value: i64) {
        *self
            .players
            .entry(player_id.to_string())
            .or_default()
            .entry(stat.to_string())
            .or_insert(0) += value;
    }

    pub fn subtract(&mut self, player_id: &str, stat: &str, value: i64) {
        self.add(player_id, stat, -value);
    }

    /// Fold every counter of `other` into `self`.
    pub fn merge(&mut self, other: &Statistics) {
        for (player_id, stats) in &other.players {
            for (stat, value) in stats {
                self.add(player_id, stat, *value);
            }
        }
    }

    /// Current delta, zero if never touched.
    pub fn get(&self, player_id: &str, stat: &str) -> i64 {
        self.players
            .get(player_id)
            .and_then(|stats| stats.get(stat))
            .copied()
            .unwrap_or(0)
    }

    /// Flattened `(player, stat, value)` rows in deterministic order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str, i64)> {
        self.players.iter().flat_map(|(player_id, stats)| {
            stats
                .iter()
                .map(move |(stat, value)| (player_id.as_str(), stat.as_str(), *value))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Book a plate appearance rewritten from `old` to a strikeout.
    pub fn record_conversion(&mut self, pitcher_id: &str, batter_id: &str, old: PlayType) {
        self.add(pitcher_id, &pitched_key(PlayType::Strikeout), 1);
        self.subtract(pitcher_id, &pitched_key(old), 1);
        self.add(batter_id, &batted_key(PlayType::Strikeout), 1);
        self.subtract(batter_id, &batted_key(old), 1);
    }
}

pub fn pitched_key(play: PlayType) -> String {
    format!("{play}-pitched")
}

pub fn batted_key(play: PlayType) -> String {
    format!("{play}-batted")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_subtract_accumulate() {
        let mut stats = Statistics::new();
        stats.add("p", "STRIKEOUT-pitched", 1);
        stats.add("p", "STRIKEOUT-pitched", 2);
        stats.subtract("p", "WALK-pitched", 1);
        assert_eq!(stats.get("p", "STRIKEOUT-pitched"), 3);
        assert_eq!(stats.get("p", "WALK-pitched"), -1);
        assert_eq!(stats.get("p", "SINGLE-pitched"), 0);
        assert_eq!(stats.get("nobody", "STRIKEOUT-pitched"), 0);
    }

    #[test]
    fn merge_sums_per_player() {
        let mut home = Statistics::new();
        home.add("a", "STRIKEOUT-batted", 1);
        let mut away = Statistics::new();
        away.add("a", "STRIKEOUT-batted", 1);
        away.add("b", "DOUBLE-batted", -1);

        home.merge(&away);
        assert_eq!(home.get("a", "STRIKEOUT-batted"), 2);
        assert_eq!(home.get("b", "DOUBLE-batted"), -1);
        let players: Vec<&str> = home.rows().map(|(player, _, _)| player).collect();
        assert_eq!(players, vec!["a", "b"]);
    }

    #[test]
    fn conversion_books_both_players() {
        let mut stats = Statistics::new();
        stats.record_conversion("pitcher", "batter", PlayType::Double);
        assert_eq!(stats.get("pitcher", "STRIKEOUT-pitched"), 1);
        assert_eq!(stats.get("pitcher", "DOUBLE-pitched"), -1);
        assert_eq!(stats.get("batter", "STRIKEOUT-batted"), 1);
        assert_eq!(stats.get("batter", "DOUBLE-batted"), -1);

        let rows: Vec<_> = stats.rows().collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], ("batter", "DOUBLE-batted", -1));
    }

    #[test]
    fn serializes_as_nested_map() {
        let mut stats = Statistics::new();
        stats.add("p", "STRIKEOUT-pitched", 1);
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["p"]["STRIKEOUT-pitched"], 1);
    }
}
