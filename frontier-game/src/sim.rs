//! Fixed-step simulation: the activity state machine and offline catch-up.

use crate::catalog::{
    BuildingId, Catalog, EquipmentSlot, RecipeDef, RecipeSpecial, SkillId, ToolPerks,
};
use crate::constants::{
    BURN_BASE_PCT, BURN_PCT_PER_LEVEL, BURNT_XP_FRACTION, CRAFT_SAFETY_ITERATIONS, LOG_IDLE,
    LOG_STORAGE_FULL, MAX_TICK_SEC, MIN_GATHER_INTERVAL_SEC, OFFLINE_CAP_SEC, OFFLINE_MIN_SEC,
    OFFLINE_STEP_SEC,
};
use crate::numbers::round_f64_to_u32;
use crate::progression::pay_cost;
use crate::rng::RngDomain;
use crate::state::{Activity, PlayerState};
use crate::{dungeon, expedition};

/// Advance the whole game by `dt_sec` simulated seconds, clamped to `[0, 1]`.
pub fn tick(state: &mut PlayerState, catalog: &Catalog, dt_sec: f64) {
    let dt = if dt_sec.is_nan() {
        0.0
    } else {
        dt_sec.clamp(0.0, MAX_TICK_SEC)
    };
    if dt <= 0.0 {
        return;
    }

    state.meta.sim_time_ms += dt * 1000.0;
    let now = state.meta.sim_time_ms;
    if state
        .potion
        .active
        .as_ref()
        .is_some_and(|active| now >= active.ends_at_ms)
    {
        state.potion.active = None;
    }
    if state.injured_until_ms.is_some_and(|until| until <= now) {
        state.injured_until_ms = None;
    }

    match state.activity {
        Activity::Idle => {}
        Activity::Gather(_) => tick_gather(state, catalog, dt),
        Activity::Craft(_) => tick_craft(state, catalog, dt),
        Activity::Expedition => expedition::tick(state, catalog, dt),
        Activity::Dungeon => dungeon::tick(state, catalog, dt),
    }

    if state.activity == Activity::Idle {
        apply_trickle(state, catalog, dt);
    }
}

/// Replay `elapsed_sec` of absence as one-second ticks. Returns the seconds simulated.
pub fn run_offline_progress(state: &mut PlayerState, catalog: &Catalog, elapsed_sec: f64) -> f64 {
    run_offline_progress_with(state, catalog, elapsed_sec, OFFLINE_CAP_SEC, OFFLINE_STEP_SEC)
}

/// Offline catch-up with an explicit cap and step size.
pub fn run_offline_progress_with(
    state: &mut PlayerState,
    catalog: &Catalog,
    elapsed_sec: f64,
    cap_sec: f64,
    step_sec: f64,
) -> f64 {
    let total = if elapsed_sec.is_nan() {
        0.0
    } else {
        elapsed_sec.clamp(0.0, cap_sec)
    };
    if total <= OFFLINE_MIN_SEC || step_sec <= 0.0 {
        return 0.0;
    }
    let mut simulated = 0.0;
    while simulated + step_sec <= total {
        if state
            .expedition
            .as_ref()
            .is_some_and(|run| run.pending_choice)
        {
            log::debug!("offline catch-up paused for a route choice after {simulated}s");
            break;
        }
        tick(state, catalog, step_sec);
        simulated += step_sec;
    }
    log::debug!("offline catch-up simulated {simulated}s of {total}s");
    simulated
}

/// Drop back to idle, refunding the inputs of a craft cycle that never completed.
pub(crate) fn interrupt_activity(state: &mut PlayerState, catalog: &Catalog) {
    if let Activity::Craft(craft) = &state.activity
        && craft.in_progress
        && let Some(recipe) = catalog.recipe(craft.recipe.as_str())
    {
        for (id, amount) in &recipe.inputs {
            state.add_resource(id.as_str(), *amount);
        }
    }
    if !matches!(state.activity, Activity::Idle) {
        log::debug!("activity {} interrupted", state.activity.as_str());
    }
    state.activity = Activity::Idle;
}

/// Switch to idle from a user request.
pub(crate) fn go_idle(state: &mut PlayerState, catalog: &Catalog) -> bool {
    if state.activity.is_run() || state.activity == Activity::Idle {
        return false;
    }
    interrupt_activity(state, catalog);
    state.push_log(LOG_IDLE, "Now idle.");
    true
}

fn stop_for_storage(state: &mut PlayerState, name: &str) {
    state.activity = Activity::Idle;
    log::debug!("gather stopped: storage full for {name}");
    state.push_log(
        LOG_STORAGE_FULL,
        format!("Storage full for {name}. Activity stopped."),
    );
}

fn tool_perks(state: &PlayerState, catalog: &Catalog, slot: EquipmentSlot) -> ToolPerks {
    let Some(equipped) = state.equipped(slot) else {
        return ToolPerks::default();
    };
    let tier = catalog
        .item(equipped.item_id.as_str())
        .map_or(0, |item| item.tier);
    let perks = ToolPerks::for_tier(tier);
    if equipped.is_broken() {
        perks.halved()
    } else {
        perks
    }
}

fn tick_gather(state: &mut PlayerState, catalog: &Catalog, dt: f64) {
    let eff = state.efficiency();
    let Activity::Gather(gather) = &mut state.activity else {
        return;
    };
    let interval = gather.interval_sec.max(MIN_GATHER_INTERVAL_SEC);
    let elapsed = dt.mul_add(eff, gather.progress_sec);
    let actions = (elapsed / interval).floor();
    gather.progress_sec = elapsed % interval;
    let skill = gather.skill;
    let target = gather.target.clone();

    let Some(rates) = catalog.gather_rates(skill) else {
        return;
    };
    match skill {
        SkillId::Woodcutting => {
            let perks = tool_perks(state, catalog, EquipmentSlot::Axe);
            let mods = state.modifiers();
            let yps = rates.base_yield_per_second
                * mods.gather_yield_mult
                * eff
                * (1.0 + perks.speed_bonus);
            let xp_per_sec =
                rates.base_xp_per_second * mods.gather_xp_mult * eff * (1.0 + perks.speed_bonus);
            tool_gather(
                state,
                catalog,
                ToolGather {
                    skill,
                    resource: "wood",
                    slot: EquipmentSlot::Axe,
                    perks,
                    yps,
                    xp_per_sec,
                },
                dt,
            );
        }
        SkillId::Mining => {
            let node_id = target.or_else(|| state.mining_target.as_ref().map(|id| id.to_string()));
            let Some(node) = node_id.and_then(|id| catalog.mining_node(&id)) else {
                return;
            };
            let perks = tool_perks(state, catalog, EquipmentSlot::Pickaxe);
            let mods = state.modifiers();
            let yps = rates.base_yield_per_second
                * mods.gather_yield_mult
                * eff
                * (1.0 + perks.speed_bonus);
            tool_gather(
                state,
                catalog,
                ToolGather {
                    skill,
                    resource: node.id.as_str(),
                    slot: EquipmentSlot::Pickaxe,
                    perks,
                    yps,
                    xp_per_sec: node.xp * yps * mods.gather_xp_mult,
                },
                dt,
            );
        }
        SkillId::Fishing => {
            let fish_id = target.or_else(|| state.fishing_target.as_ref().map(|id| id.to_string()));
            let Some(fish) = fish_id.and_then(|id| catalog.fish_node(&id)) else {
                return;
            };
            let name = catalog.resource_name(fish.id.as_str());
            if state.resource_room(fish.id.as_str()) <= 0.0 {
                stop_for_storage(state, name);
                return;
            }
            let mods = state.modifiers();
            let yps = rates.base_yield_per_second * mods.gather_yield_mult * eff;
            let final_yield = yps * dt;
            let added = state.add_resource(fish.id.as_str(), final_yield);
            if added <= 0.0 {
                stop_for_storage(state, name);
                return;
            }
            let ratio = if final_yield > 0.0 { added / final_yield } else { 0.0 };
            state.add_xp(skill, fish.fishing_xp * yps * mods.gather_xp_mult * dt * ratio);
            if added < final_yield {
                stop_for_storage(state, name);
            }
        }
        SkillId::Scavenging => {
            let zone_id = target.or_else(|| state.scavenging_zone.clone());
            let Some(zone) = zone_id.and_then(|id| catalog.scavenging_zone(&id)) else {
                return;
            };
            if !zone
                .reagents
                .iter()
                .any(|reagent| state.resource_room(reagent.as_str()) > 0.0)
            {
                stop_for_storage(state, &zone.name);
                return;
            }
            let mods = state.modifiers();
            let rolls = round_f64_to_u32(actions * zone.rolls * mods.gather_yield_mult);
            let mut gained = 0_u32;
            for _ in 0..rolls {
                let pick = state
                    .rng
                    .stream(RngDomain::Gather)
                    .pick(&zone.reagents)
                    .cloned();
                if let Some(reagent) = pick
                    && state.add_resource(reagent.as_str(), 1.0) > 0.0
                {
                    gained += 1;
                }
            }
            if gained > 0 {
                state.add_xp(skill, zone.xp * f64::from(gained) * mods.gather_xp_mult);
            }
        }
        _ => {}
    }
}

struct ToolGather<'a> {
    skill: SkillId,
    resource: &'a str,
    slot: EquipmentSlot,
    perks: ToolPerks,
    yps: f64,
    xp_per_sec: f64,
}

fn tool_gather(state: &mut PlayerState, catalog: &Catalog, job: ToolGather<'_>, dt: f64) {
    let name = catalog.resource_name(job.resource);
    if state.resource_room(job.resource) <= 0.0 {
        stop_for_storage(state, name);
        return;
    }
    let final_yield = job.yps * (1.0 + job.perks.double_yield_chance) * dt;
    let added = state.add_resource(job.resource, final_yield);
    if added <= 0.0 {
        stop_for_storage(state, name);
        return;
    }
    let ratio = if final_yield > 0.0 { added / final_yield } else { 0.0 };
    state.add_xp(job.skill, job.xp_per_sec * dt * ratio);
    state.wear(
        catalog,
        job.slot,
        job.yps * dt * (1.0 - job.perks.no_durability_chance),
    );
    if added < final_yield {
        stop_for_storage(state, name);
    }
}

/// Percent chance that cooking a fish of `fish_level` burns it.
#[must_use]
pub fn burn_chance(cooking_level: u32, fish_level: u32) -> f64 {
    let gap = f64::from(cooking_level) - f64::from(fish_level);
    BURN_PCT_PER_LEVEL.mul_add(-gap, BURN_BASE_PCT).max(0.0)
}

fn tick_craft(state: &mut PlayerState, catalog: &Catalog, dt: f64) {
    let Activity::Craft(craft) = &state.activity else {
        return;
    };
    let Some(recipe) = catalog.recipe(craft.recipe.as_str()) else {
        return;
    };
    if state.building_level(recipe.building) == 0 {
        return;
    }
    let mut in_progress = craft.in_progress;
    let mut remaining = craft.remaining_sec;

    let mods = state.modifiers();
    let speed = mods.craft_speed(recipe.skill);
    let mut budget = dt * speed * state.efficiency();
    let mut iterations = 0;
    while budget > 0.0 && iterations < CRAFT_SAFETY_ITERATIONS {
        iterations += 1;
        if !in_progress {
            if !pay_cost(&mut state.resources, &recipe.inputs) {
                break;
            }
            in_progress = true;
            remaining = recipe.duration_sec;
        }
        let step = budget.min(remaining);
        remaining -= step;
        budget -= step;
        if remaining > 0.0 {
            continue;
        }
        in_progress = false;
        complete_craft(state, recipe, speed * mods.global_xp_mult);
    }

    if let Activity::Craft(craft) = &mut state.activity {
        craft.in_progress = in_progress;
        craft.remaining_sec = remaining;
    }
}

fn complete_craft(state: &mut PlayerState, recipe: &RecipeDef, xp_mult: f64) {
    match &recipe.special {
        Some(RecipeSpecial::CookFish { fish_level, burnt }) => {
            let chance = burn_chance(state.skill_level(SkillId::Cooking), *fish_level);
            let roll = state.rng.stream(RngDomain::Craft).next_f64() * 100.0;
            if roll < chance {
                state.add_resource(burnt.as_str(), 1.0);
                state.add_xp(recipe.skill, recipe.xp * BURNT_XP_FRACTION * xp_mult);
                return;
            }
            credit_outputs(state, recipe);
            state.add_xp(recipe.skill, recipe.xp * xp_mult);
        }
        None => {
            credit_outputs(state, recipe);
            state.add_xp(recipe.skill, recipe.xp * xp_mult);
        }
    }
}

fn credit_outputs(state: &mut PlayerState, recipe: &RecipeDef) {
    for (id, amount) in &recipe.outputs {
        state.add_resource(id.as_str(), *amount);
    }
}

fn apply_trickle(state: &mut PlayerState, catalog: &Catalog, dt: f64) {
    for id in BuildingId::ALL {
        let level = state.building_level(id);
        if level == 0 {
            continue;
        }
        let Some(building) = catalog.building(id) else {
            continue;
        };
        for (resource, rate) in &building.idle_trickle {
            state.add_resource(resource.as_str(), dt * rate * f64::from(level));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RecipeId;
    use crate::state::{CraftActivity, EquippedItem, GatherActivity};

    fn setup() -> (Catalog, PlayerState) {
        let catalog = Catalog::builtin().unwrap();
        let state = PlayerState::new(&catalog, 42, 0.0);
        (catalog, state)
    }

    fn gather(skill: SkillId, target: Option<&str>) -> Activity {
        Activity::Gather(GatherActivity {
            skill,
            target: target.map(str::to_string),
            progress_sec: 0.0,
            interval_sec: 1.0,
        })
    }

    #[test]
    fn tick_clamps_dt_and_advances_time() {
        let (catalog, mut state) = setup();
        tick(&mut state, &catalog, 5.0);
        assert!((state.meta.sim_time_ms - 1000.0).abs() < f64::EPSILON);
        tick(&mut state, &catalog, -3.0);
        tick(&mut state, &catalog, f64::NAN);
        assert!((state.meta.sim_time_ms - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn woodcutting_without_axe_credits_base_rate() {
        let (catalog, mut state) = setup();
        state.activity = gather(SkillId::Woodcutting, None);
        for _ in 0..10 {
            tick(&mut state, &catalog, 1.0);
        }
        assert!((state.resources.get("wood") - 30.0).abs() < 1e-9);
        assert!((state.skill_xp(SkillId::Woodcutting) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn gather_stops_when_storage_fills() {
        let (catalog, mut state) = setup();
        state.resources.set("wood", 199.5, 200.0);
        state.activity = gather(SkillId::Woodcutting, None);
        tick(&mut state, &catalog, 1.0);
        assert!((state.resources.get("wood") - 200.0).abs() < f64::EPSILON);
        assert_eq!(state.activity, Activity::Idle);
        assert!(state.log.contains_key(LOG_STORAGE_FULL));
        assert!((state.skill_xp(SkillId::Woodcutting) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn mining_wears_pickaxe() {
        let (catalog, mut state) = setup();
        state.equipment.insert(
            EquipmentSlot::Pickaxe,
            EquippedItem {
                item_id: "dullflickPickaxe".into(),
                durability: 10.0,
            },
        );
        state.activity = gather(SkillId::Mining, Some("dullstoneOre"));
        tick(&mut state, &catalog, 1.0);
        assert!((state.resources.get("dullstoneOre") - 8.8).abs() < 1e-9);
        let pickaxe = state.equipped(EquipmentSlot::Pickaxe).unwrap();
        assert!((pickaxe.durability - 9.2).abs() < 1e-9);
        assert!(state.skill_xp(SkillId::Mining) > 0.0);
    }

    #[test]
    fn scavenging_rolls_per_completed_interval() {
        let (catalog, mut state) = setup();
        state.activity = Activity::Gather(GatherActivity {
            skill: SkillId::Scavenging,
            target: Some("mossyHollow".into()),
            progress_sec: 0.0,
            interval_sec: 2.0,
        });
        let before: f64 = ["herbs", "glowcap"].iter().map(|id| state.resources.get(id)).sum();
        tick(&mut state, &catalog, 1.0);
        let mid: f64 = ["herbs", "glowcap"].iter().map(|id| state.resources.get(id)).sum();
        assert!((mid - before).abs() < f64::EPSILON);
        tick(&mut state, &catalog, 1.0);
        let after: f64 = ["herbs", "glowcap"].iter().map(|id| state.resources.get(id)).sum();
        assert!((after - before - 1.0).abs() < f64::EPSILON);
        assert!((state.skill_xp(SkillId::Scavenging) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn craft_stalls_without_building_and_pays_once_per_cycle() {
        let (catalog, mut state) = setup();
        state.activity = Activity::Craft(CraftActivity {
            recipe: RecipeId::new("cookRations"),
            in_progress: false,
            remaining_sec: 0.0,
        });
        tick(&mut state, &catalog, 1.0);
        assert!((state.resources.get("meat") - 5.0).abs() < f64::EPSILON);

        state.buildings.insert(BuildingId::Campfire, 1);
        tick(&mut state, &catalog, 0.1);
        assert!((state.resources.get("meat") - 3.0).abs() < f64::EPSILON);
        let Activity::Craft(craft) = &state.activity else {
            panic!("still crafting");
        };
        assert!(craft.in_progress);
    }

    #[test]
    fn unaffordable_craft_leaves_resources_untouched() {
        let (catalog, mut state) = setup();
        state.buildings.insert(BuildingId::Campfire, 1);
        state.resources.set("meat", 1.0, 200.0);
        let before = state.resources.clone();
        state.activity = Activity::Craft(CraftActivity {
            recipe: RecipeId::new("cookRations"),
            in_progress: false,
            remaining_sec: 0.0,
        });
        tick(&mut state, &catalog, 1.0);
        assert_eq!(state.resources, before);
    }

    #[test]
    fn burn_chance_shrinks_with_level_gap() {
        assert!((burn_chance(1, 1) - 35.0).abs() < f64::EPSILON);
        assert!((burn_chance(11, 1) - 15.0).abs() < f64::EPSILON);
        assert!(burn_chance(40, 1).abs() < f64::EPSILON);
        assert!((burn_chance(1, 5) - 43.0).abs() < f64::EPSILON);
    }

    #[test]
    fn interrupting_craft_refunds_unfinished_cycle() {
        let (catalog, mut state) = setup();
        state.buildings.insert(BuildingId::Campfire, 1);
        state.activity = Activity::Craft(CraftActivity {
            recipe: RecipeId::new("cookRations"),
            in_progress: false,
            remaining_sec: 0.0,
        });
        tick(&mut state, &catalog, 0.1);
        assert!((state.resources.get("meat") - 3.0).abs() < f64::EPSILON);
        assert!(go_idle(&mut state, &catalog));
        assert!((state.resources.get("meat") - 5.0).abs() < f64::EPSILON);
        assert!(!go_idle(&mut state, &catalog));
    }

    #[test]
    fn workshop_trickles_while_idle() {
        let (catalog, mut state) = setup();
        state.buildings.insert(BuildingId::Workshop, 2);
        tick(&mut state, &catalog, 1.0);
        assert!((state.resources.get("wood") - 20.16).abs() < 1e-9);
        assert!((state.resources.get("dullstoneOre") - 8.12).abs() < 1e-9);
    }

    #[test]
    fn offline_ignores_short_absences_and_caps_long_ones() {
        let (catalog, mut state) = setup();
        assert!(run_offline_progress(&mut state, &catalog, 1.0).abs() < f64::EPSILON);
        assert!((run_offline_progress(&mut state, &catalog, 3.5) - 3.0).abs() < f64::EPSILON);
        let simulated = run_offline_progress_with(&mut state, &catalog, 1e9, 20.0, 1.0);
        assert!((simulated - 20.0).abs() < f64::EPSILON);
    }
}
