// Baserunner occupancy for one team's half-innings.

use crate::event::BaseRunner;

/// Base index for the batter's box (movement origin for the batter).
pub const BATTER_BOX: u8 = 0;
/// Base index for a runner who scored.
pub const HOME: u8 = 4;

/// A runner on base together with the pitcher charged with putting them there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runner {
    pub runner_id: String,
    pub pitcher_id: String,
}

impl Runner {
    pub fn new(runner_id: impl Into<String>, pitcher_id: impl Into<String>) -> Self {
        Runner {
            runner_id: runner_id.into(),
            pitcher_id: pitcher_id.into(),
        }
    }
}

/// Occupancy of first, second and third base.
///
/// Only bases 1-3 are stored. Any other index is an invariant violation:
/// debug builds assert, release builds ignore the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bases {
    slots: [Option<Runner>; 3],
}

fn slot_index(base: u8) -> Option<usize> {
    match base {
        1..=3 => Some(usize::from(base) - 1),
        _ => None,
    }
}

impl Bases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild occupancy from a recorded movement list: every runner whose
    /// after-play base is 1-3 is on that base. Later entries win.
    pub fn from_movements(movements: &[BaseRunner]) -> Self {
        let mut bases = Bases::new();
        for movement in movements {
            if let Some(idx) = slot_index(movement.base_after_play) {
                bases.slots[idx] = Some(Runner::new(
                    movement.runner_id.clone(),
                    movement.responsible_pitcher_id.clone(),
                ));
            }
        }
        bases
    }

    pub fn get(&self, base: u8) -> Option<&Runner> {
        slot_index(base).and_then(|idx| self.slots[idx].as_ref())
    }

    pub fn occupied(&self, base: u8) -> bool {
        self.get(base).is_some()
    }

    /// Remove and return the runner on `base`.
    pub fn take(&mut self, base: u8) -> Option<Runner> {
        debug_assert!(slot_index(base).is_some(), "take from invalid base {base}");
        slot_index(base).and_then(|idx| self.slots[idx].take())
    }

    /// Put `runner` on `base`. The base must be empty.
    pub fn place(&mut self, base: u8, runner: Runner) {
        debug_assert!(slot_index(base).is_some(), "place on invalid base {base}");
        let Some(idx) = slot_index(base) else {
            return;
        };
        debug_assert!(
            self.slots[idx].is_none(),
            "base {base} already occupied by {:?}",
            self.slots[idx]
        );
        self.slots[idx] = Some(runner);
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn is_loaded(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Occupied bases in ascending order.
    pub fn occupied_bases(&self) -> impl Iterator<Item = (u8, &Runner)> {
        self.slots
            .iter()
            .zip(1u8..)
            .filter_map(|(slot, base)| slot.as_ref().map(|runner| (base, runner)))
    }

    pub fn count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
