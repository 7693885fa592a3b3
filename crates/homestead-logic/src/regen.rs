//! Regeneration of resting players.
//!
//! Runs on a fixed tick. Only players in `recovery` (resting at their own
//! base) regain health and energy.

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenRule {
    pub step: u8,
    pub cap: u8,
}

impl RegenRule {
    fn bump(&self, stat: u8) -> u8 {
        if stat >= self.cap {
            return stat;
        }
        stat.saturating_add(self.step).min(self.cap)
    }

    /// New `(health, energy)` after one tick, `None` when both are capped.
    pub fn apply(&self, health: u8, energy: u8) -> Option<(u8, u8)> {
        let next = (self.bump(health), self.bump(energy));
        (next != (health, energy)).then_some(next)
    }
}

/// One regeneration tick over the whole store.
pub fn regenerate_players<S: Store>(store: &mut S, rule: RegenRule) -> EngineResult<usize> {
    let changed = store.unit_of_work(|s| s.regenerate_recovering(rule))?;
    log::debug!("regeneration tick: {} player(s) recovered", changed);
    Ok(changed)
}
