//! XP curve, level derivation, and cost scaling.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::catalog::Cost;
use crate::ledger::ResourceLedger;

pub const MAX_LEVEL: u32 = 99;

static LEVEL_THRESHOLDS: OnceLock<Vec<f64>> = OnceLock::new();

/// Total XP required to reach `level`.
#[must_use]
pub fn xp_for_level(level: u32) -> f64 {
    let level = f64::from(level);
    (40.0 * level).mul_add(level, 60.0 * level).floor()
}

fn thresholds() -> &'static [f64] {
    LEVEL_THRESHOLDS.get_or_init(|| (0..=MAX_LEVEL).map(xp_for_level).collect())
}

/// Level reached with `xp` total experience, in `1..=MAX_LEVEL`.
#[must_use]
pub fn level_from_xp(xp: f64) -> u32 {
    let table = thresholds();
    let mut level = 1;
    for next in 2..=MAX_LEVEL {
        let needed = usize::try_from(next)
            .ok()
            .and_then(|idx| table.get(idx).copied())
            .unwrap_or(f64::INFINITY);
        if xp < needed {
            break;
        }
        level = next;
    }
    level
}

/// Progress through the current level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub level: u32,
    pub xp_into_level: f64,
    pub xp_for_next: f64,
    pub pct: f64,
}

#[must_use]
pub fn level_progress(xp: f64) -> LevelProgress {
    let level = level_from_xp(xp);
    if level >= MAX_LEVEL {
        return LevelProgress {
            level,
            xp_into_level: 0.0,
            xp_for_next: 0.0,
            pct: 1.0,
        };
    }
    let this_level = xp_for_level(level);
    let xp_for_next = xp_for_level(level + 1) - this_level;
    let xp_into_level = (xp - this_level).max(0.0);
    let pct = if xp_for_next > 0.0 {
        xp_into_level / xp_for_next
    } else {
        0.0
    };
    LevelProgress {
        level,
        xp_into_level,
        xp_for_next,
        pct,
    }
}

/// Cost of reaching `target_level`: every entry scaled by `scale^(target_level - 1)` and rounded up.
#[must_use]
pub fn scale_cost(base: &Cost, scale: f64, target_level: u32) -> Cost {
    let exponent = i32::try_from(target_level.saturating_sub(1)).unwrap_or(i32::MAX);
    let factor = scale.powi(exponent);
    base.iter()
        .map(|(id, amount)| (id.clone(), (amount * factor).ceil()))
        .collect()
}

#[must_use]
pub fn can_afford(ledger: &ResourceLedger, cost: &Cost) -> bool {
    cost.iter().all(|(id, amount)| ledger.has(id.as_str(), *amount))
}

/// Debit `cost` only if every entry is covered. Returns whether payment happened.
pub fn pay_cost(ledger: &mut ResourceLedger, cost: &Cost) -> bool {
    if !can_afford(ledger, cost) {
        return false;
    }
    for (id, amount) in cost {
        ledger.remove(id.as_str(), *amount);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ResourceId;

    #[test]
    fn xp_curve_matches_known_points() {
        assert!((xp_for_level(1) - 100.0).abs() < f64::EPSILON);
        assert!((xp_for_level(2) - 280.0).abs() < f64::EPSILON);
        assert!((xp_for_level(10) - 4_600.0).abs() < f64::EPSILON);
    }

    #[test]
    fn level_threshold_round_trips() {
        assert_eq!(level_from_xp(0.0), 1);
        for level in 1..MAX_LEVEL {
            assert_eq!(level_from_xp(xp_for_level(level)), level, "level {level}");
        }
        assert_eq!(level_from_xp(xp_for_level(2) - 0.001), 1);
        assert_eq!(level_from_xp(f64::MAX), MAX_LEVEL);
    }

    #[test]
    fn level_is_monotone_in_xp() {
        let mut previous = 1;
        let mut xp = 0.0;
        while xp < 500_000.0 {
            let level = level_from_xp(xp);
            assert!(level >= previous);
            previous = level;
            xp += 137.5;
        }
    }

    #[test]
    fn progress_reports_fraction_of_level() {
        let progress = level_progress(190.0);
        assert_eq!(progress.level, 1);
        assert!((progress.xp_into_level - 90.0).abs() < f64::EPSILON);
        assert!((progress.xp_for_next - 180.0).abs() < f64::EPSILON);
        assert!((progress.pct - 0.5).abs() < f64::EPSILON);
        let capped = level_progress(f64::MAX);
        assert!((capped.pct - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn scale_cost_rounds_up_each_entry() {
        let base = Cost::from([
            (ResourceId::new("wood"), 15.0),
            (ResourceId::new("dullstoneOre"), 5.0),
        ]);
        let first = scale_cost(&base, 1.6, 1);
        assert!((first["wood"] - 15.0).abs() < f64::EPSILON);
        let third = scale_cost(&base, 1.6, 3);
        assert!((third["wood"] - 39.0).abs() < f64::EPSILON);
        assert!((third["dullstoneOre"] - 13.0).abs() < f64::EPSILON);
        let zero = scale_cost(&base, 1.6, 0);
        assert_eq!(zero, first);
    }

    #[test]
    fn pay_cost_is_all_or_nothing() {
        let mut ledger = ResourceLedger::new();
        ledger.set("wood", 10.0, 200.0);
        ledger.set("herbs", 1.0, 200.0);
        let cost = Cost::from([(ResourceId::new("wood"), 5.0), (ResourceId::new("herbs"), 2.0)]);
        assert!(!pay_cost(&mut ledger, &cost));
        assert!((ledger.get("wood") - 10.0).abs() < f64::EPSILON);
        ledger.set("herbs", 2.0, 200.0);
        assert!(pay_cost(&mut ledger, &cost));
        assert!((ledger.get("wood") - 5.0).abs() < f64::EPSILON);
        assert!(ledger.get("herbs").abs() < f64::EPSILON);
    }
}
