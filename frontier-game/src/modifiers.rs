//! Closed-form bonuses derived from building levels and legacy upgrades.

use serde::{Deserialize, Serialize};

use crate::catalog::{BuildingId, SkillId};
use crate::constants::{
    ALCHEMY_LOOT_PER_LEVEL, ALCHEMY_SPEED_PER_LEVEL, BARRACKS_POWER_PER_LEVEL, BASE_STORAGE_CAP,
    CAMPFIRE_SPEED_PER_LEVEL, FORGE_SPEED_PER_LEVEL, SCOUT_INJURY_PER_LEVEL,
    SCOUT_INJURY_REDUCTION_CAP, SCOUT_LOOT_PER_LEVEL, STORAGE_CAP_PER_STOREHOUSE,
    TOWN_HALL_XP_PER_LEVEL, WORKSHOP_YIELD_PER_LEVEL,
};
use crate::state::PlayerState;

/// Every multiplier the simulation reads. Recomputed on each use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifiers {
    pub global_xp_mult: f64,
    pub gather_yield_mult: f64,
    pub gather_xp_mult: f64,
    pub smithing_speed_mult: f64,
    pub cooking_speed_mult: f64,
    pub alchemy_speed_mult: f64,
    pub combat_power_mult: f64,
    pub loot_mult: f64,
    pub injury_chance_mult: f64,
    pub storage_cap: f64,
}

impl Modifiers {
    /// Crafting speed multiplier for the skill a recipe trains.
    #[must_use]
    pub const fn craft_speed(&self, skill: SkillId) -> f64 {
        match skill {
            SkillId::Smithing => self.smithing_speed_mult,
            SkillId::Cooking => self.cooking_speed_mult,
            SkillId::Alchemy => self.alchemy_speed_mult,
            _ => 1.0,
        }
    }
}

#[must_use]
pub fn compute_modifiers(state: &PlayerState) -> Modifiers {
    let level = |id: BuildingId| f64::from(state.building_level(id));

    let global_xp_mult =
        state.legacy.global_xp_mult * TOWN_HALL_XP_PER_LEVEL.mul_add(level(BuildingId::TownHall), 1.0);
    let gather_yield_mult = state.legacy.global_yield_mult
        * WORKSHOP_YIELD_PER_LEVEL.mul_add(level(BuildingId::Workshop), 1.0);
    let loot_mult = ALCHEMY_LOOT_PER_LEVEL.mul_add(
        level(BuildingId::AlchemistHut),
        SCOUT_LOOT_PER_LEVEL.mul_add(level(BuildingId::ScoutLodge), 1.0),
    );
    let injury_reduction =
        (SCOUT_INJURY_PER_LEVEL * level(BuildingId::ScoutLodge)).min(SCOUT_INJURY_REDUCTION_CAP);

    Modifiers {
        global_xp_mult,
        gather_yield_mult,
        gather_xp_mult: global_xp_mult,
        smithing_speed_mult: FORGE_SPEED_PER_LEVEL.mul_add(level(BuildingId::Forge), 1.0),
        cooking_speed_mult: CAMPFIRE_SPEED_PER_LEVEL.mul_add(level(BuildingId::Campfire), 1.0),
        alchemy_speed_mult: ALCHEMY_SPEED_PER_LEVEL.mul_add(level(BuildingId::AlchemistHut), 1.0),
        combat_power_mult: BARRACKS_POWER_PER_LEVEL.mul_add(level(BuildingId::Barracks), 1.0),
        loot_mult,
        injury_chance_mult: 1.0 - injury_reduction,
        storage_cap: STORAGE_CAP_PER_STOREHOUSE.mul_add(level(BuildingId::Storehouse), BASE_STORAGE_CAP),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn fresh() -> PlayerState {
        let catalog = Catalog::builtin().unwrap();
        PlayerState::new(&catalog, 7, 0.0)
    }

    #[test]
    fn fresh_state_has_neutral_modifiers() {
        let mods = compute_modifiers(&fresh());
        assert!((mods.global_xp_mult - 1.0).abs() < f64::EPSILON);
        assert!((mods.gather_yield_mult - 1.0).abs() < f64::EPSILON);
        assert!((mods.injury_chance_mult - 1.0).abs() < f64::EPSILON);
        assert!((mods.storage_cap - 200.0).abs() < f64::EPSILON);
        assert!((mods.craft_speed(SkillId::Mining) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn building_levels_feed_their_multipliers() {
        let mut state = fresh();
        state.buildings.insert(BuildingId::Workshop, 2);
        state.buildings.insert(BuildingId::Storehouse, 3);
        state.buildings.insert(BuildingId::ScoutLodge, 12);
        state.buildings.insert(BuildingId::AlchemistHut, 1);
        state.legacy.global_yield_mult = 1.05;
        let mods = compute_modifiers(&state);
        assert!((mods.gather_yield_mult - 1.05 * 1.14).abs() < 1e-12);
        assert!((mods.storage_cap - 950.0).abs() < f64::EPSILON);
        assert!((mods.injury_chance_mult - 0.65).abs() < 1e-12);
        assert!((mods.loot_mult - 1.63).abs() < 1e-12);
        assert!((mods.craft_speed(SkillId::Alchemy) - 1.08).abs() < 1e-12);
    }
}
