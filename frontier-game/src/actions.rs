//! User intents. Every action validates its preconditions and returns
//! `false` without touching state when any of them fail.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::catalog::{BuildingId, Catalog, Cost, CropDef, EquipmentSlot, PotionKind, SkillId};
use crate::combat::{CombatEncounter, drink_heal_potion};
use crate::constants::{
    CROP_LEVELS_PER_BONUS, CROP_PURE_CHANCE_CAP, CROP_PURE_CHANCE_DIVISOR, CROP_XP_PER_TIER,
    GATHER_INTERVAL_SEC, LEGACY_UPGRADE_MULT, LOG_BUILDING_UPGRADED, LOG_CRAFT_START,
    LOG_FARM_HARVEST, LOG_FARM_PLANT, LOG_GATHER_START, LOG_GATHER_TARGET, LOG_ITEM_EQUIPPED,
    LOG_ITEM_REPAIRED, LOG_ITEM_UNEQUIPPED, LOG_LEGACY_UPGRADE, LOG_POTION, LOG_PRESTIGE, LOG_SOLD,
    MIN_RESALE_DURABILITY, REPAIR_XP_FRACTION, SCAVENGE_INTERVAL_SEC,
};
use crate::dungeon::{self, Direction};
use crate::expedition::{self, RouteChoice};
use crate::numbers::{floor_f64_to_u32, i64_to_f64};
use crate::progression::{pay_cost, scale_cost};
use crate::rng::{RngDomain, random_int};
use crate::sim::{go_idle, interrupt_activity};
use crate::state::{
    ActivePotion, Activity, CraftActivity, CropPatch, EquippedItem, GatherActivity, PlayerState,
};

/// Permanent bonus bought with legacy points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LegacyUpgrade {
    Xp,
    Yield,
}

impl LegacyUpgrade {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xp => "xp",
            Self::Yield => "yield",
        }
    }
}

impl fmt::Display for LegacyUpgrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LegacyUpgrade {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xp" => Ok(Self::Xp),
            "yield" => Ok(Self::Yield),
            _ => Err(()),
        }
    }
}

/// Serializable form of every intent, for scripted drivers and replays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    SetIdle,
    StartGather { skill: SkillId },
    SelectMiningTarget { node: String },
    SelectFishingTarget { fish: String },
    SelectScavengingZone { zone: String },
    StartCraft { recipe: String },
    UpgradeBuilding { building: BuildingId },
    EquipItem { item: String },
    UnequipItem { slot: EquipmentSlot },
    RepairItem { slot: EquipmentSlot },
    SellResource { resource: String, quantity: f64 },
    SellEquippedItem { slot: EquipmentSlot },
    DrinkPotion { potion: String },
    PlantCrop { patch: usize, crop: String },
    HarvestCrop { patch: usize },
    StartExpedition { risk: u32 },
    ChooseExpeditionOption { choice: RouteChoice },
    StopExpedition,
    StartDungeon,
    MoveDungeon { dx: i32, dy: i32 },
    ExitDungeon,
    QueueAttack,
    ToggleAutoFight,
    UseCombatFood { food: String },
    UseCombatPotion { potion: String },
    FoundNewSettlement,
    BuyLegacyUpgrade { kind: LegacyUpgrade },
}

/// Dispatch one [`Action`]. Returns whether it was applied.
pub fn apply(state: &mut PlayerState, catalog: &Catalog, action: &Action) -> bool {
    match action {
        Action::SetIdle => set_activity_idle(state, catalog),
        Action::StartGather { skill } => start_gather(state, catalog, *skill),
        Action::SelectMiningTarget { node } => select_mining_target(state, catalog, node),
        Action::SelectFishingTarget { fish } => select_fishing_target(state, catalog, fish),
        Action::SelectScavengingZone { zone } => select_scavenging_zone(state, catalog, zone),
        Action::StartCraft { recipe } => start_craft(state, catalog, recipe),
        Action::UpgradeBuilding { building } => upgrade_building(state, catalog, *building),
        Action::EquipItem { item } => equip_item(state, catalog, item),
        Action::UnequipItem { slot } => unequip_item(state, catalog, *slot),
        Action::RepairItem { slot } => repair_item(state, catalog, *slot),
        Action::SellResource { resource, quantity } => {
            sell_resource(state, catalog, resource, *quantity)
        }
        Action::SellEquippedItem { slot } => sell_equipped_item(state, catalog, *slot),
        Action::DrinkPotion { potion } | Action::UseCombatPotion { potion } => {
            drink_potion(state, catalog, potion)
        }
        Action::PlantCrop { patch, crop } => plant_crop(state, catalog, *patch, crop),
        Action::HarvestCrop { patch } => harvest_crop(state, catalog, *patch),
        Action::StartExpedition { risk } => start_expedition(state, catalog, *risk),
        Action::ChooseExpeditionOption { choice } => choose_expedition_option(state, *choice),
        Action::StopExpedition => stop_expedition(state),
        Action::StartDungeon => start_dungeon(state, catalog),
        Action::MoveDungeon { dx, dy } => move_dungeon(state, catalog, *dx, *dy),
        Action::ExitDungeon => exit_dungeon(state),
        Action::QueueAttack => queue_attack(state),
        Action::ToggleAutoFight => toggle_auto_fight(state),
        Action::UseCombatFood { food } => use_combat_food(state, catalog, food),
        Action::FoundNewSettlement => found_new_settlement(state, catalog),
        Action::BuyLegacyUpgrade { kind } => buy_legacy_upgrade(state, *kind),
    }
}

// Activities ---------------------------------------------------------------

pub fn set_activity_idle(state: &mut PlayerState, catalog: &Catalog) -> bool {
    go_idle(state, catalog)
}

/// Start gathering with the skill's currently selected target.
pub fn start_gather(state: &mut PlayerState, catalog: &Catalog, skill: SkillId) -> bool {
    if !skill.is_gathering() || state.activity.is_run() || catalog.gather_rates(skill).is_none() {
        return false;
    }
    let level = state.skill_level(skill);
    let (target, label) = match skill {
        SkillId::Mining => {
            let Some(node) = state
                .mining_target
                .as_ref()
                .and_then(|id| catalog.mining_node(id.as_str()))
            else {
                return false;
            };
            if level < node.level {
                return false;
            }
            (Some(node.id.to_string()), Some(node.name.clone()))
        }
        SkillId::Fishing => {
            let Some(fish) = state
                .fishing_target
                .as_ref()
                .and_then(|id| catalog.fish_node(id.as_str()))
            else {
                return false;
            };
            if level < fish.level {
                return false;
            }
            (Some(fish.id.to_string()), Some(fish.name.clone()))
        }
        SkillId::Scavenging => {
            let Some(zone) = state
                .scavenging_zone
                .as_deref()
                .and_then(|id| catalog.scavenging_zone(id))
            else {
                return false;
            };
            if level < zone.level {
                return false;
            }
            (Some(zone.id.clone()), Some(zone.name.clone()))
        }
        _ => (None, None),
    };
    if let Activity::Gather(current) = &state.activity
        && current.skill == skill
        && current.target == target
    {
        return false;
    }

    interrupt_activity(state, catalog);
    state.activity = Activity::Gather(GatherActivity {
        skill,
        target,
        progress_sec: 0.0,
        interval_sec: if skill == SkillId::Scavenging {
            SCAVENGE_INTERVAL_SEC
        } else {
            GATHER_INTERVAL_SEC
        },
    });
    let suffix = label.map(|name| format!(" ({name})")).unwrap_or_default();
    log::debug!("gather started: {skill}{suffix}");
    state.push_log(
        LOG_GATHER_START,
        format!("Gathering: {}{suffix}.", skill_name(catalog, skill)),
    );
    true
}

fn skill_name(catalog: &Catalog, skill: SkillId) -> String {
    catalog
        .skills
        .get(&skill)
        .map_or_else(|| skill.to_string(), |def| def.name.clone())
}

/// Point the running gather at a new target when it belongs to `skill`.
fn retarget(state: &mut PlayerState, skill: SkillId, target: &str, name: &str) {
    if let Activity::Gather(gather) = &mut state.activity
        && gather.skill == skill
    {
        gather.target = Some(target.to_string());
        state.push_log(
            LOG_GATHER_TARGET,
            format!("{}: {name}.", crate::catalog::upper_first(skill.as_str())),
        );
    }
}

pub fn select_mining_target(state: &mut PlayerState, catalog: &Catalog, node_id: &str) -> bool {
    let Some(node) = catalog.mining_node(node_id) else {
        return false;
    };
    if state.skill_level(SkillId::Mining) < node.level {
        return false;
    }
    state.mining_target = Some(node.id.clone());
    retarget(state, SkillId::Mining, node_id, &node.name);
    true
}

pub fn select_fishing_target(state: &mut PlayerState, catalog: &Catalog, fish_id: &str) -> bool {
    let Some(fish) = catalog.fish_node(fish_id) else {
        return false;
    };
    if state.skill_level(SkillId::Fishing) < fish.level {
        return false;
    }
    state.fishing_target = Some(fish.id.clone());
    retarget(state, SkillId::Fishing, fish_id, &fish.name);
    true
}

pub fn select_scavenging_zone(state: &mut PlayerState, catalog: &Catalog, zone_id: &str) -> bool {
    let Some(zone) = catalog.scavenging_zone(zone_id) else {
        return false;
    };
    if state.skill_level(SkillId::Scavenging) < zone.level {
        return false;
    }
    state.scavenging_zone = Some(zone.id.clone());
    retarget(state, SkillId::Scavenging, zone_id, &zone.name);
    true
}

pub fn start_craft(state: &mut PlayerState, catalog: &Catalog, recipe_id: &str) -> bool {
    let Some(recipe) = catalog.recipe(recipe_id) else {
        return false;
    };
    if state.activity.is_run()
        || state.building_level(recipe.building) == 0
        || state.skill_level(recipe.skill) < recipe.level
    {
        return false;
    }
    if let Activity::Craft(current) = &state.activity
        && current.recipe == recipe.id
    {
        return false;
    }
    interrupt_activity(state, catalog);
    state.activity = Activity::Craft(CraftActivity {
        recipe: recipe.id.clone(),
        in_progress: false,
        remaining_sec: 0.0,
    });
    log::debug!("craft started: {}", recipe.id);
    state.push_log(LOG_CRAFT_START, format!("Crafting: {}.", recipe.name));
    true
}

// Buildings ----------------------------------------------------------------

/// Cost of the next level of `building`, `None` when the catalog lacks it.
#[must_use]
pub fn building_next_cost(state: &PlayerState, catalog: &Catalog, building: BuildingId) -> Option<Cost> {
    let def = catalog.building(building)?;
    Some(scale_cost(
        &def.base_cost,
        def.cost_scale,
        state.building_level(building) + 1,
    ))
}

pub fn upgrade_building(state: &mut PlayerState, catalog: &Catalog, building: BuildingId) -> bool {
    let Some(cost) = building_next_cost(state, catalog, building) else {
        return false;
    };
    if !pay_cost(&mut state.resources, &cost) {
        return false;
    }
    let level = state.building_level(building) + 1;
    state.buildings.insert(building, level);
    let name = catalog
        .building(building)
        .map_or_else(|| building.to_string(), |def| def.name.clone());
    state.push_log(
        LOG_BUILDING_UPGRADED,
        format!("Upgraded {name} to level {level}."),
    );
    true
}

// Equipment ----------------------------------------------------------------

pub fn equip_item(state: &mut PlayerState, catalog: &Catalog, item_id: &str) -> bool {
    let Some(item) = catalog.item(item_id) else {
        return false;
    };
    if !state.resources.has(item_id, 1.0)
        || state.skill_level(item.slot.governing_skill()) < item.level
    {
        return false;
    }
    let previous = state.equipped(item.slot).map(|eq| eq.item_id.clone());
    if previous.as_ref().is_some_and(|id| id.as_str() == item_id) {
        return false;
    }
    if let Some(prev) = &previous
        && state.resource_room(prev.as_str()) < 1.0
    {
        return false;
    }

    state.resources.remove(item_id, 1.0);
    if let Some(prev) = previous {
        state.add_resource(prev.as_str(), 1.0);
    }
    state.equipment.insert(
        item.slot,
        EquippedItem {
            item_id: item.id.clone(),
            durability: item.max_durability,
        },
    );
    state.push_log(LOG_ITEM_EQUIPPED, format!("Equipped {}.", item.name));
    true
}

pub fn unequip_item(state: &mut PlayerState, catalog: &Catalog, slot: EquipmentSlot) -> bool {
    let Some(current) = state.equipped(slot).map(|eq| eq.item_id.clone()) else {
        return false;
    };
    if state.resource_room(current.as_str()) < 1.0 {
        return false;
    }
    state.equipment.remove(&slot);
    state.add_resource(current.as_str(), 1.0);
    state.push_log(
        LOG_ITEM_UNEQUIPPED,
        format!("Unequipped {}.", catalog.resource_name(current.as_str())),
    );
    true
}

pub fn repair_item(state: &mut PlayerState, catalog: &Catalog, slot: EquipmentSlot) -> bool {
    if state.building_level(BuildingId::Forge) == 0 {
        return false;
    }
    let Some(equipped) = state.equipped(slot) else {
        return false;
    };
    let Some(item) = catalog.item(equipped.item_id.as_str()) else {
        return false;
    };
    if equipped.durability >= item.max_durability {
        return false;
    }
    let cost = Cost::from([(item.bar_id.clone(), 1.0)]);
    if !pay_cost(&mut state.resources, &cost) {
        return false;
    }
    if let Some(equipped) = state.equipment.get_mut(&slot) {
        equipped.durability = item.max_durability;
    }
    state.add_xp(SkillId::Smithing, item.xp * REPAIR_XP_FRACTION);
    state.push_log(LOG_ITEM_REPAIRED, format!("Repaired {}.", item.name));
    true
}

// Economy ------------------------------------------------------------------

pub fn sell_resource(state: &mut PlayerState, catalog: &Catalog, resource: &str, quantity: f64) -> bool {
    if !quantity.is_finite() || quantity <= 0.0 || !state.resources.has(resource, quantity) {
        return false;
    }
    let price = catalog.sell_price(resource);
    if price <= 0.0 {
        return false;
    }
    state.resources.remove(resource, quantity);
    let gold = state.add_resource("gold", price * quantity);
    state.push_log(
        LOG_SOLD,
        format!(
            "Sold {quantity} {} for {gold} gold.",
            catalog.resource_name(resource)
        ),
    );
    true
}

/// Resale value of an equipped item: the full price, or nothing once worn
/// below the resale threshold.
#[must_use]
pub fn equipped_sell_price(catalog: &Catalog, equipped: &EquippedItem) -> f64 {
    let base = catalog.sell_price(equipped.item_id.as_str());
    let max = catalog.max_durability(equipped.item_id.as_str());
    if max <= 0.0 {
        return base;
    }
    if equipped.durability / max < MIN_RESALE_DURABILITY {
        return 0.0;
    }
    base
}

pub fn sell_equipped_item(state: &mut PlayerState, catalog: &Catalog, slot: EquipmentSlot) -> bool {
    let Some(equipped) = state.equipped(slot) else {
        return false;
    };
    let price = equipped_sell_price(catalog, equipped);
    if price <= 0.0 {
        return false;
    }
    let name = catalog.resource_name(equipped.item_id.as_str()).to_string();
    state.equipment.remove(&slot);
    let gold = state.add_resource("gold", price);
    state.push_log(LOG_SOLD, format!("Sold equipped {name} for {gold} gold."));
    true
}

// Potions and combat -------------------------------------------------------

/// Run `f` against the live encounter, temporarily detached from its run.
fn with_live_encounter(
    state: &mut PlayerState,
    f: impl FnOnce(&mut PlayerState, &mut CombatEncounter) -> bool,
) -> bool {
    let taken = if let Some(run) = state.expedition.as_mut() {
        run.room.encounter.take()
    } else {
        state.dungeon.as_mut().and_then(|run| run.encounter.take())
    };
    let Some(mut encounter) = taken else {
        return false;
    };
    let applied = f(state, &mut encounter);
    if let Some(run) = state.expedition.as_mut() {
        run.room.encounter = Some(encounter);
    } else if let Some(run) = state.dungeon.as_mut() {
        run.encounter = Some(encounter);
    }
    applied
}

/// Heal potions go into the live encounter; regen and accuracy potions start a timed buff.
pub fn drink_potion(state: &mut PlayerState, catalog: &Catalog, potion_id: &str) -> bool {
    let Some(potion) = catalog.potion(potion_id) else {
        return false;
    };
    if potion.kind == PotionKind::Heal {
        let id = potion.id.clone();
        return with_live_encounter(state, |state, encounter| {
            if !drink_heal_potion(state, catalog, &id, encounter) {
                return false;
            }
            let name = catalog.resource_name(id.as_str());
            state.push_log(LOG_POTION, format!("Drank {name}."));
            true
        });
    }

    let now = state.now_ms();
    if !state.potion.ready(potion.kind, now) || !state.resources.has(potion_id, 1.0) {
        return false;
    }
    if state
        .live_encounter()
        .is_some_and(|encounter| encounter.buff_potion_used)
    {
        return false;
    }
    state.resources.remove(potion_id, 1.0);
    state.potion.active = Some(ActivePotion {
        potion: potion.id.clone(),
        kind: potion.kind,
        amount: potion.amount,
        started_at_ms: now,
        ends_at_ms: potion.duration_sec.mul_add(1000.0, now),
        next_tick_at_ms: potion.interval_sec.mul_add(1000.0, now),
        interval_ms: potion.interval_sec * 1000.0,
    });
    state
        .potion
        .cooldowns
        .insert(potion.kind, potion.cooldown_sec.mul_add(1000.0, now));
    if let Some(encounter) = state.live_encounter_mut() {
        encounter.buff_potion_used = true;
    }
    let name = catalog.resource_name(potion_id).to_string();
    state.push_log(LOG_POTION, format!("Drank {name}."));
    true
}

pub fn use_combat_food(state: &mut PlayerState, catalog: &Catalog, food: &str) -> bool {
    let Some(heal) = catalog.food_heal(food) else {
        return false;
    };
    if !state.resources.has(food, 1.0) {
        return false;
    }
    with_live_encounter(state, |state, encounter| {
        if encounter.is_resolved() {
            return false;
        }
        state.resources.remove(food, 1.0);
        let healed = encounter.heal(heal);
        encounter.feed.push(format!(
            "You eat {} and heal {healed}.",
            catalog.resource_name(food)
        ));
        true
    })
}

pub fn use_combat_potion(state: &mut PlayerState, catalog: &Catalog, potion_id: &str) -> bool {
    drink_potion(state, catalog, potion_id)
}

pub fn queue_attack(state: &mut PlayerState) -> bool {
    state
        .live_encounter_mut()
        .is_some_and(CombatEncounter::queue_attack)
}

pub fn toggle_auto_fight(state: &mut PlayerState) -> bool {
    let Some(encounter) = state.live_encounter_mut() else {
        return false;
    };
    encounter.toggle_auto_fight();
    true
}

// Farming ------------------------------------------------------------------

pub fn plant_crop(state: &mut PlayerState, catalog: &Catalog, patch: usize, crop_id: &str) -> bool {
    let Some(crop) = catalog.crop(crop_id) else {
        return false;
    };
    if state.skill_level(SkillId::Farming) < crop.level {
        return false;
    }
    let now = state.now_ms();
    let Some(slot) = state.farming.get_mut(patch) else {
        return false;
    };
    if slot.is_some() {
        return false;
    }
    *slot = Some(CropPatch {
        crop: crop.id.clone(),
        planted_at_ms: now,
        ready_at_ms: crop.grow_sec.mul_add(1000.0, now),
    });
    state.push_log(LOG_FARM_PLANT, format!("Planted {}.", crop.name));
    true
}

/// Roll a harvest from the farming stream.
fn crop_yield(state: &mut PlayerState, crop: &CropDef) -> f64 {
    let gap = f64::from(state.skill_level(SkillId::Farming)) - f64::from(crop.level);
    let rng = state.rng.stream(RngDomain::Farming);
    let base = random_int(
        rng,
        i64::from(crop.yield_min),
        i64::from(crop.yield_max) + 1,
    );
    let pure_chance = (gap / CROP_PURE_CHANCE_DIVISOR).clamp(0.0, CROP_PURE_CHANCE_CAP);
    let pure = if rng.next_f64() < pure_chance { 1.0 } else { 0.0 };
    let bonus = f64::from(floor_f64_to_u32(gap / CROP_LEVELS_PER_BONUS));
    i64_to_f64(base) + bonus + pure
}

pub fn harvest_crop(state: &mut PlayerState, catalog: &Catalog, patch: usize) -> bool {
    let now = state.now_ms();
    let Some(Some(planted)) = state.farming.get(patch) else {
        return false;
    };
    if now < planted.ready_at_ms {
        return false;
    }
    let Some(crop) = catalog.crop(planted.crop.as_str()) else {
        return false;
    };
    let amount = crop_yield(state, crop);
    let added = state.add_resource(crop.id.as_str(), amount);
    state.add_xp(SkillId::Farming, f64::from(crop.tier) * CROP_XP_PER_TIER);
    if let Some(slot) = state.farming.get_mut(patch) {
        *slot = None;
    }
    state.push_log(LOG_FARM_HARVEST, format!("Harvested {added} {}.", crop.name));
    true
}

// Runs ---------------------------------------------------------------------

pub fn start_expedition(state: &mut PlayerState, catalog: &Catalog, risk: u32) -> bool {
    expedition::start(state, catalog, risk)
}

pub fn choose_expedition_option(state: &mut PlayerState, choice: RouteChoice) -> bool {
    expedition::choose(state, choice)
}

pub fn stop_expedition(state: &mut PlayerState) -> bool {
    expedition::stop(state)
}

pub fn start_dungeon(state: &mut PlayerState, catalog: &Catalog) -> bool {
    dungeon::start(state, catalog)
}

/// Unit step in the dungeon; anything but a single orthogonal step is rejected.
pub fn move_dungeon(state: &mut PlayerState, catalog: &Catalog, dx: i32, dy: i32) -> bool {
    Direction::from_delta(dx, dy)
        .is_some_and(|direction| dungeon::move_player(state, catalog, direction))
}

pub fn exit_dungeon(state: &mut PlayerState) -> bool {
    dungeon::exit(state)
}

// Legacy -------------------------------------------------------------------

/// Legacy points a reset would grant right now, `None` when not yet allowed.
#[must_use]
pub fn prestige_gain(state: &PlayerState) -> Option<u32> {
    let hall = state.building_level(BuildingId::TownHall);
    let bosses = state.records.bosses_defeated;
    if hall < 1 || bosses < 1 {
        return None;
    }
    let gain = bosses * 2 + hall + state.total_level() / 25;
    Some(gain.max(1))
}

/// Reset the settlement, keeping legacy progress and the random streams.
pub fn found_new_settlement(state: &mut PlayerState, catalog: &Catalog) -> bool {
    let Some(gain) = prestige_gain(state) else {
        return false;
    };
    let mut next = PlayerState::new(catalog, state.seed, state.meta.created_at_ms);
    next.meta = state.meta;
    next.rng = state.rng.clone();
    next.legacy = state.legacy;
    next.legacy.points += gain;
    next.legacy.settlements_founded += 1;
    *state = next;
    log::info!("new settlement founded: +{gain} legacy points");
    let plural = if gain == 1 { "" } else { "s" };
    state.push_log(
        LOG_PRESTIGE,
        format!("Founded a new settlement. Gained {gain} legacy point{plural}."),
    );
    true
}

pub fn buy_legacy_upgrade(state: &mut PlayerState, kind: LegacyUpgrade) -> bool {
    if state.legacy.points < 1 {
        return false;
    }
    state.legacy.points -= 1;
    match kind {
        LegacyUpgrade::Xp => state.legacy.global_xp_mult *= LEGACY_UPGRADE_MULT,
        LegacyUpgrade::Yield => state.legacy.global_yield_mult *= LEGACY_UPGRADE_MULT,
    }
    state.push_log(
        LOG_LEGACY_UPGRADE,
        format!("Legacy: +5% global {}.", kind.as_str()),
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Catalog, PlayerState) {
        let catalog = Catalog::builtin().unwrap();
        let state = PlayerState::new(&catalog, 99, 0.0);
        (catalog, state)
    }

    #[test]
    fn upgrade_pays_scaled_cost_atomically() {
        let (catalog, mut state) = setup();
        let cost = building_next_cost(&state, &catalog, BuildingId::Workshop).unwrap();
        let wood_before = state.resources.get("wood");
        assert!(upgrade_building(&mut state, &catalog, BuildingId::Workshop));
        assert_eq!(state.building_level(BuildingId::Workshop), 1);
        assert!((state.resources.get("wood") - (wood_before - cost["wood"])).abs() < f64::EPSILON);

        let before = state.resources.clone();
        assert!(!upgrade_building(&mut state, &catalog, BuildingId::TownHall));
        assert_eq!(state.resources, before);
    }

    #[test]
    fn start_gather_respects_target_level() {
        let (catalog, mut state) = setup();
        assert!(start_gather(&mut state, &catalog, SkillId::Woodcutting));
        assert!(!start_gather(&mut state, &catalog, SkillId::Woodcutting));
        assert!(!start_gather(&mut state, &catalog, SkillId::Smithing));
        assert!(!select_scavenging_zone(&mut state, &catalog, "voidRift"));
        assert!(start_gather(&mut state, &catalog, SkillId::Scavenging));
        let Activity::Gather(gather) = &state.activity else {
            panic!("expected gather");
        };
        assert_eq!(gather.target.as_deref(), Some("mossyHollow"));
        assert!((gather.interval_sec - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn craft_requires_building_and_level() {
        let (catalog, mut state) = setup();
        assert!(!start_craft(&mut state, &catalog, "cookRations"));
        state.buildings.insert(BuildingId::Campfire, 1);
        assert!(start_craft(&mut state, &catalog, "cookRations"));
        assert!(!start_craft(&mut state, &catalog, "cookRations"));
        assert!(!start_craft(&mut state, &catalog, "noSuchRecipe"));
    }

    #[test]
    fn equip_swaps_and_returns_previous_item() {
        let (catalog, mut state) = setup();
        state.resources.set("dullflickDagger", 1.0, 200.0);
        state.resources.set("dullflickSword", 1.0, 200.0);
        assert!(equip_item(&mut state, &catalog, "dullflickDagger"));
        assert!(!equip_item(&mut state, &catalog, "dullflickSword"));
        state.skills.insert(SkillId::Combat, crate::progression::xp_for_level(2));
        assert!(equip_item(&mut state, &catalog, "dullflickSword"));
        assert!((state.resources.get("dullflickDagger") - 1.0).abs() < f64::EPSILON);
        assert!(state.resources.get("dullflickSword").abs() < f64::EPSILON);
        let weapon = state.equipped(EquipmentSlot::Weapon).unwrap();
        assert!((weapon.durability - 2000.0).abs() < f64::EPSILON);
        assert!(unequip_item(&mut state, &catalog, EquipmentSlot::Weapon));
        assert!(!unequip_item(&mut state, &catalog, EquipmentSlot::Weapon));
    }

    #[test]
    fn repair_needs_forge_bar_and_damage() {
        let (catalog, mut state) = setup();
        state.equipment.insert(
            EquipmentSlot::Axe,
            EquippedItem {
                item_id: "dullflickAxe".into(),
                durability: 10.0,
            },
        );
        state.resources.set("dullflickBar", 1.0, 200.0);
        assert!(!repair_item(&mut state, &catalog, EquipmentSlot::Axe));
        state.buildings.insert(BuildingId::Forge, 1);
        assert!(repair_item(&mut state, &catalog, EquipmentSlot::Axe));
        assert!(state.resources.get("dullflickBar").abs() < f64::EPSILON);
        assert!(state.skill_xp(SkillId::Smithing) > 0.0);
        assert!(!repair_item(&mut state, &catalog, EquipmentSlot::Axe));
    }

    #[test]
    fn selling_requires_stock_and_price() {
        let (catalog, mut state) = setup();
        assert!(!sell_resource(&mut state, &catalog, "dullstoneOre", 100.0));
        assert!(!sell_resource(&mut state, &catalog, "dullstoneOre", -1.0));
        assert!(sell_resource(&mut state, &catalog, "dullstoneOre", 8.0));
        assert!(state.resources.get("dullstoneOre").abs() < f64::EPSILON);
        assert!(state.resources.get("gold") > 0.0);
    }

    #[test]
    fn worn_equipment_sells_at_full_price_until_ruined() {
        let (catalog, mut state) = setup();
        let fresh = EquippedItem {
            item_id: "dullflickChestplate".into(),
            durability: 2000.0,
        };
        let worn = EquippedItem {
            durability: 400.0,
            ..fresh.clone()
        };
        let ruined = EquippedItem {
            durability: 399.0,
            ..fresh.clone()
        };
        let full = equipped_sell_price(&catalog, &fresh);
        assert!(full > 0.0);
        assert!((equipped_sell_price(&catalog, &worn) - full).abs() < f64::EPSILON);
        assert!(equipped_sell_price(&catalog, &ruined).abs() < f64::EPSILON);
        state.equipment.insert(EquipmentSlot::Chest, ruined);
        assert!(!sell_equipped_item(&mut state, &catalog, EquipmentSlot::Chest));
        state.equipment.insert(EquipmentSlot::Chest, worn);
        let gold = state.resources.get("gold");
        assert!(sell_equipped_item(&mut state, &catalog, EquipmentSlot::Chest));
        assert!((state.resources.get("gold") - gold - full).abs() < 1e-9);
        assert!(state.equipped(EquipmentSlot::Chest).is_none());
    }

    #[test]
    fn farming_plants_and_harvests_when_ready() {
        let (catalog, mut state) = setup();
        assert!(plant_crop(&mut state, &catalog, 0, "sunleaf"));
        assert!(!plant_crop(&mut state, &catalog, 0, "sunleaf"));
        assert!(!plant_crop(&mut state, &catalog, 99, "sunleaf"));
        assert!(!plant_crop(&mut state, &catalog, 1, "moonsage"));
        assert!(!harvest_crop(&mut state, &catalog, 0));
        state.meta.sim_time_ms = 1800.0 * 1000.0;
        assert!(harvest_crop(&mut state, &catalog, 0));
        let amount = state.resources.get("sunleaf");
        assert!((3.0..=5.0).contains(&amount));
        assert!((state.skill_xp(SkillId::Farming) - 12.0).abs() < f64::EPSILON);
        assert!(state.farming[0].is_none());
    }

    #[test]
    fn harvest_xp_ignores_legacy_xp_bonus() {
        let (catalog, mut state) = setup();
        state.legacy.global_xp_mult = 2.0;
        assert!(plant_crop(&mut state, &catalog, 0, "sunleaf"));
        state.meta.sim_time_ms = 1800.0 * 1000.0;
        assert!(harvest_crop(&mut state, &catalog, 0));
        assert!((state.skill_xp(SkillId::Farming) - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buff_potions_respect_cooldown() {
        let (catalog, mut state) = setup();
        state.resources.set("regenTonic", 2.0, 200.0);
        assert!(drink_potion(&mut state, &catalog, "regenTonic"));
        assert!(state.potion.buff_active());
        assert!(!drink_potion(&mut state, &catalog, "regenTonic"));
        state.meta.sim_time_ms = 60_000.0;
        assert!(drink_potion(&mut state, &catalog, "regenTonic"));
        assert!(state.resources.get("regenTonic").abs() < f64::EPSILON);
    }

    #[test]
    fn heal_potions_need_a_live_encounter() {
        let (catalog, mut state) = setup();
        state.resources.set("minorHealingPotion", 1.0, 200.0);
        assert!(!drink_potion(&mut state, &catalog, "minorHealingPotion"));
        assert!(!queue_attack(&mut state));
        assert!(!toggle_auto_fight(&mut state));
        assert!(!use_combat_food(&mut state, &catalog, "rations"));
    }

    #[test]
    fn prestige_requires_hall_and_boss_and_keeps_legacy() {
        let (catalog, mut state) = setup();
        assert!(!found_new_settlement(&mut state, &catalog));
        state.buildings.insert(BuildingId::TownHall, 1);
        state.records.bosses_defeated = 2;
        state.resources.set("gold", 150.0, 200.0);
        assert_eq!(prestige_gain(&state), Some(5));
        assert!(found_new_settlement(&mut state, &catalog));
        assert_eq!(state.legacy.points, 5);
        assert_eq!(state.legacy.settlements_founded, 1);
        assert_eq!(state.building_level(BuildingId::TownHall), 0);
        assert!(state.resources.get("gold").abs() < f64::EPSILON);

        assert!(buy_legacy_upgrade(&mut state, LegacyUpgrade::Yield));
        assert!((state.legacy.global_yield_mult - 1.05).abs() < 1e-12);
        assert_eq!(state.legacy.points, 4);
    }

    #[test]
    fn dungeon_moves_must_be_unit_steps() {
        let (catalog, mut state) = setup();
        assert!(!move_dungeon(&mut state, &catalog, 0, 1));
        assert!(start_dungeon(&mut state, &catalog));
        assert!(!move_dungeon(&mut state, &catalog, 1, 1));
        assert!(!move_dungeon(&mut state, &catalog, 0, 2));
        assert!(!start_expedition(&mut state, &catalog, 1));
        assert!(exit_dungeon(&mut state));
    }

    #[test]
    fn actions_deserialize_from_tagged_json() {
        let action: Action =
            serde_json::from_str(r#"{"type":"startGather","skill":"woodcutting"}"#).unwrap();
        assert_eq!(
            action,
            Action::StartGather {
                skill: SkillId::Woodcutting
            }
        );
        let action: Action = serde_json::from_str(r#"{"type":"moveDungeon","dx":1,"dy":0}"#).unwrap();
        assert_eq!(action, Action::MoveDungeon { dx: 1, dy: 0 });
    }
}
