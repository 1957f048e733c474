//! Seeded room-by-room expeditions.
//!
//! Every room is a pure function of the run seed and its index, so the
//! sequence of room kinds and difficulties is fixed the moment the run
//! starts. Only the route choice made at event rooms feeds back into the
//! next room.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::catalog::{Catalog, SkillId};
use crate::combat::{
    CombatEncounter, CombatOutcome, EnemyProfile, PlayerCombat, award_loot, roll_injury,
    tick_encounter,
};
use crate::constants::{
    COMBAT_ROOM_SEC, ENCOUNTER_SEED_SALT, ENEMY_NAME_SALT, EXPEDITION_FEED_CAPACITY,
    LOG_COMBAT_WON, LOG_EXPEDITION_CHOICE, LOG_EXPEDITION_COMPLETE, LOG_EXPEDITION_END,
    LOG_EXPEDITION_REST, LOG_EXPEDITION_RETREAT, LOG_EXPEDITION_START, LOG_EXPEDITION_TREASURE,
    MAX_ROOM_INJURY_CHANCE, REST_ROOM_SEC, ROOM_SEED_STRIDE, TREASURE_ROOM_SEC,
};
use crate::numbers::{floor_f64_to_i64, floor_f64_to_index};
use crate::rng::{Mulberry32, RngDomain, random_int};
use crate::sim::interrupt_activity;
use crate::state::{Activity, Feed, PlayerState};

const PROVISIONS: [&str; 2] = ["rations", "meat"];

const ENEMIES_BY_TIER: [[&str; 4]; 3] = [
    ["Slime", "Boar", "Wolf", "Giant Rat"],
    ["Bandit", "Giant Spider", "Skeletal Scout", "Wild Stag"],
    ["Cultist", "Ogre", "Stone Golem", "Warg"],
];
const BOSSES: [&str; 3] = ["Feral Alpha", "Ruin Warden", "Ancient Stag"];

pub const MIN_RISK: u32 = 1;
pub const MAX_RISK: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomKind {
    Combat,
    Event,
    Rest,
    Treasure,
    Boss,
}

impl RoomKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Combat => "combat",
            Self::Event => "event",
            Self::Rest => "rest",
            Self::Treasure => "treasure",
            Self::Boss => "boss",
        }
    }

    #[must_use]
    pub const fn is_fight(self) -> bool {
        matches!(self, Self::Combat | Self::Boss)
    }
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adjustment carried from an event choice into the following room only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomModifier {
    pub loot_mult: f64,
    pub difficulty_add: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteChoice {
    Safe,
    Risky,
}

impl RouteChoice {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Risky => "risky",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Safe => "Safe path",
            Self::Risky => "Risky path",
        }
    }

    #[must_use]
    pub const fn modifier(self) -> RoomModifier {
        match self {
            Self::Safe => RoomModifier {
                loot_mult: 0.9,
                difficulty_add: -1,
            },
            Self::Risky => RoomModifier {
                loot_mult: 1.35,
                difficulty_add: 1,
            },
        }
    }
}

impl FromStr for RouteChoice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "safe" => Ok(Self::Safe),
            "risky" => Ok(Self::Risky),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub kind: RoomKind,
    pub difficulty: u32,
    pub duration_sec: f64,
    pub progress_sec: f64,
    pub loot_mult: f64,
    pub resolved: bool,
    pub seed: u32,
    pub enemy_name: Option<String>,
    pub encounter: Option<CombatEncounter>,
    pub prompted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub rooms_cleared: u32,
    pub bosses_defeated: u32,
    pub gold_earned: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpeditionRun {
    pub seed: u32,
    pub risk: u32,
    pub room_index: u32,
    pub room_count: u32,
    pub room: Room,
    pub pending_choice: bool,
    pub next_room_mod: Option<RoomModifier>,
    pub feed: Feed<EXPEDITION_FEED_CAPACITY>,
    pub stats: RunStats,
}

#[must_use]
pub const fn room_count_for(risk: u32) -> u32 {
    8 + 2 * risk
}

/// Generate room `index` of a run. Pure in its arguments.
#[must_use]
pub fn make_room(
    seed: u32,
    index: u32,
    count: u32,
    risk: u32,
    modifier: Option<RoomModifier>,
) -> Room {
    let base_seed = seed.wrapping_add(index.wrapping_mul(ROOM_SEED_STRIDE));
    let mut rng = Mulberry32::new(base_seed);
    let kind = if index + 1 == count {
        RoomKind::Boss
    } else {
        let roll = rng.next_f64();
        if roll < 0.55 {
            RoomKind::Combat
        } else if roll < 0.70 {
            RoomKind::Event
        } else if roll < 0.85 {
            RoomKind::Rest
        } else {
            RoomKind::Treasure
        }
    };

    let span = f64::from(count.saturating_sub(1).max(1));
    let depth = f64::from(index) / span * f64::from(2 + risk);
    let jitter = random_int(&mut rng, 0, 2);
    let modifier = modifier.unwrap_or(RoomModifier {
        loot_mult: 1.0,
        difficulty_add: 0,
    });
    let difficulty = (1 + floor_f64_to_i64(depth) + jitter + modifier.difficulty_add).max(1);
    let difficulty = u32::try_from(difficulty).unwrap_or(u32::MAX);

    let duration_sec = match kind {
        RoomKind::Rest => REST_ROOM_SEC,
        RoomKind::Treasure => TREASURE_ROOM_SEC,
        RoomKind::Event => 0.0,
        RoomKind::Combat | RoomKind::Boss => COMBAT_ROOM_SEC,
    };
    let room_seed = base_seed.wrapping_add(difficulty.wrapping_shl(8));
    let enemy_name = kind
        .is_fight()
        .then(|| pick_enemy_name(room_seed, difficulty, kind == RoomKind::Boss));

    Room {
        kind,
        difficulty,
        duration_sec,
        progress_sec: 0.0,
        loot_mult: modifier.loot_mult,
        resolved: false,
        seed: room_seed,
        enemy_name,
        encounter: None,
        prompted: false,
    }
}

fn pick_enemy_name(room_seed: u32, difficulty: u32, boss: bool) -> String {
    let mut rng = Mulberry32::new(room_seed ^ ENEMY_NAME_SALT);
    if boss {
        return BOSSES[pick_index(&mut rng, BOSSES.len())].to_string();
    }
    let tier = ((f64::from(difficulty) - 1.0) / 2.0).floor();
    let list = &ENEMIES_BY_TIER[floor_f64_to_index(tier, ENEMIES_BY_TIER.len())];
    list[pick_index(&mut rng, list.len())].to_string()
}

fn pick_index(rng: &mut Mulberry32, len: usize) -> usize {
    let hi = i64::try_from(len).unwrap_or(i64::MAX);
    usize::try_from(random_int(rng, 0, hi)).unwrap_or(0)
}

/// Spend one ration, or one meat when out of rations. Leaving empty-handed is allowed.
fn pack_provisions(state: &mut PlayerState) {
    if let Some(food) = PROVISIONS
        .into_iter()
        .find(|food| state.resources.has(food, 1.0))
    {
        state.resources.remove(food, 1.0);
    }
}

/// Begin a run at `risk` (clamped to 1..=3). Rejected while another run is active.
pub fn start(state: &mut PlayerState, catalog: &Catalog, risk: u32) -> bool {
    if state.activity.is_run() || state.expedition.is_some() || state.dungeon.is_some() {
        return false;
    }
    interrupt_activity(state, catalog);
    let risk = risk.clamp(MIN_RISK, MAX_RISK);
    pack_provisions(state);
    let seed = state.rng.stream(RngDomain::Expedition).next_word() & 0x7FFF_FFFF;
    let room_count = room_count_for(risk);
    let mut run = ExpeditionRun {
        seed,
        risk,
        room_index: 0,
        room_count,
        room: make_room(seed, 0, room_count, risk, None),
        pending_choice: false,
        next_room_mod: None,
        feed: Feed::new(),
        stats: RunStats::default(),
    };
    run.feed.push(format!("You head out (Risk {risk})."));
    state.expedition = Some(run);
    state.activity = Activity::Expedition;
    log::debug!("expedition started: seed={seed} risk={risk} rooms={room_count}");
    state.push_log(LOG_EXPEDITION_START, format!("Expedition started (Risk {risk})."));
    true
}

/// Abandon the active run.
pub fn stop(state: &mut PlayerState) -> bool {
    if state.expedition.take().is_none() {
        return false;
    }
    state.activity = Activity::Idle;
    log::debug!("expedition abandoned");
    state.push_log(LOG_EXPEDITION_END, "Expedition ended.");
    true
}

/// Resolve a pending route choice.
pub fn choose(state: &mut PlayerState, choice: RouteChoice) -> bool {
    let Some(mut run) = state.expedition.take() else {
        return false;
    };
    if !run.pending_choice {
        state.expedition = Some(run);
        return false;
    }
    run.pending_choice = false;
    run.next_room_mod = Some(choice.modifier());
    run.feed.push(format!("You choose: {}.", choice.label()));
    state.push_log(LOG_EXPEDITION_CHOICE, format!("Chose: {}.", choice.label()));
    if run.room.kind == RoomKind::Event && !advance_room(state, &mut run) {
        return true;
    }
    state.expedition = Some(run);
    true
}

/// Advance the active run by `dt` simulated seconds.
pub fn tick(state: &mut PlayerState, catalog: &Catalog, dt: f64) {
    let Some(mut run) = state.expedition.take() else {
        return;
    };
    if tick_run(state, catalog, &mut run, dt) {
        state.expedition = Some(run);
    }
}

/// Returns `false` once the run is over.
fn tick_run(state: &mut PlayerState, catalog: &Catalog, run: &mut ExpeditionRun, dt: f64) -> bool {
    if run.pending_choice {
        return true;
    }
    let scaled = dt * state.efficiency();
    match run.room.kind {
        RoomKind::Event => {
            if !run.room.prompted {
                run.room.prompted = true;
                run.feed.push("A fork in the path… choose your route.");
            }
            run.pending_choice = true;
            return true;
        }
        RoomKind::Rest => {
            run.room.progress_sec += scaled;
            if run.room.progress_sec >= run.room.duration_sec {
                rest(state, catalog, run);
                run.room.resolved = true;
            }
        }
        RoomKind::Treasure => {
            run.room.progress_sec += scaled;
            if run.room.progress_sec >= run.room.duration_sec {
                let loot = award_loot(state, run.room.difficulty, false, run.room.loot_mult);
                run.stats.gold_earned += loot.gold;
                run.feed.push("You find a hidden cache.");
                run.feed.push(format!("Loot: {}.", loot.describe()));
                state.push_log(
                    LOG_EXPEDITION_TREASURE,
                    format!("Found treasure: {}.", loot.describe()),
                );
                run.room.resolved = true;
            }
        }
        RoomKind::Combat | RoomKind::Boss => {
            if !fight(state, catalog, run, scaled) {
                return false;
            }
        }
    }

    if !run.room.resolved {
        return true;
    }
    advance_room(state, run)
}

fn rest(state: &mut PlayerState, catalog: &Catalog, run: &mut ExpeditionRun) {
    let food = catalog
        .foods
        .iter()
        .filter(|(id, _)| state.resources.has(id.as_str(), 1.0))
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(id, _)| id.clone());
    if let Some(food) = food {
        state.resources.remove(food.as_str(), 1.0);
        let name = catalog.resource_name(food.as_str()).to_string();
        run.feed.push(format!("You rest and eat {name}."));
        state.push_log(LOG_EXPEDITION_REST, format!("Rested and used 1 {name}."));
    } else {
        run.feed.push("You rest for a moment.");
        state.push_log(LOG_EXPEDITION_REST, "Rested (no food).");
    }
}

/// Returns `false` when the player lost and the run ended.
fn fight(state: &mut PlayerState, catalog: &Catalog, run: &mut ExpeditionRun, dt: f64) -> bool {
    let boss = run.room.kind == RoomKind::Boss;
    let risk = f64::from(run.risk);
    let mut encounter = run.room.encounter.take().unwrap_or_else(|| {
        let name = run.room.enemy_name.clone().unwrap_or_default();
        let profile = EnemyProfile::expedition_room(name, run.room.difficulty, run.risk, boss);
        CombatEncounter::new(
            profile,
            PlayerCombat::from_state(state, catalog),
            run.room.seed ^ ENCOUNTER_SEED_SALT,
            state.potion.buff_active(),
        )
    });
    let outcome = tick_encounter(state, catalog, &mut encounter, dt);

    match outcome {
        CombatOutcome::Ongoing => {
            run.room.encounter = Some(encounter);
            true
        }
        CombatOutcome::Defeat => {
            run.feed.push("You are forced to retreat!");
            roll_injury(state, 0.05f64.mul_add(risk, 0.25));
            state.activity = Activity::Idle;
            log::debug!("expedition lost in room {}", run.room_index);
            state.push_log(LOG_EXPEDITION_RETREAT, "You retreated from the expedition.");
            false
        }
        CombatOutcome::Victory => {
            let d = f64::from(run.room.difficulty);
            let boss_xp = if boss { 35.0 } else { 0.0 };
            let base_xp = d.mul_add(7.0, 12.0 + boss_xp) * 0.1f64.mul_add(risk, 0.9);
            state.add_xp(SkillId::Combat, base_xp * state.modifiers().global_xp_mult);
            let loot = award_loot(state, run.room.difficulty, boss, run.room.loot_mult);
            run.stats.gold_earned += loot.gold;

            let danger = (encounter.enemy_power / encounter.player_toughness.max(0.5)).max(0.1);
            let took = encounter.damage_taken / encounter.player_max_hp.max(1.0);
            let boss_risk = if boss { 0.04 } else { 0.0 };
            let chance = 0.03f64
                .mul_add(risk, 0.06f64.mul_add(danger, 0.18 * took) + boss_risk)
                .min(MAX_ROOM_INJURY_CHANCE);
            roll_injury(state, chance);

            run.feed.push(format!("Defeated {}.", encounter.enemy_name));
            run.feed.push(format!("Loot: {}.", loot.describe()));
            let label = if boss { "Boss defeated" } else { "Won fight" };
            state.push_log(
                LOG_COMBAT_WON,
                format!("{label}: +{} combat XP, +{} gold.", base_xp.floor(), loot.gold),
            );
            if boss {
                run.stats.bosses_defeated += 1;
                state.records.bosses_defeated += 1;
            }
            run.room.resolved = true;
            true
        }
    }
}

/// Count the current room cleared and move on. Returns `false` when the run completed.
fn advance_room(state: &mut PlayerState, run: &mut ExpeditionRun) -> bool {
    run.stats.rooms_cleared += 1;
    state.records.rooms_cleared += 1;
    run.room_index += 1;
    if run.room_index >= run.room_count {
        state.records.expeditions_completed += 1;
        state.activity = Activity::Idle;
        log::info!(
            "expedition complete: rooms={} gold={}",
            run.stats.rooms_cleared,
            run.stats.gold_earned
        );
        state.push_log(LOG_EXPEDITION_COMPLETE, "Expedition complete. Back to town.");
        return false;
    }
    run.room = make_room(
        run.seed,
        run.room_index,
        run.room_count,
        run.risk,
        run.next_room_mod.take(),
    );
    log::debug!(
        "expedition room {} of {}: {} d{}",
        run.room_index + 1,
        run.room_count,
        run.room.kind,
        run.room.difficulty
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Catalog, PlayerState) {
        let catalog = Catalog::builtin().unwrap();
        let state = PlayerState::new(&catalog, 2024, 0.0);
        (catalog, state)
    }

    #[test]
    fn last_room_is_always_boss() {
        for seed in [0_u32, 1, 77, 0x7FFF_FFFF] {
            for risk in MIN_RISK..=MAX_RISK {
                let count = room_count_for(risk);
                let room = make_room(seed, count - 1, count, risk, None);
                assert_eq!(room.kind, RoomKind::Boss);
                assert!(room.enemy_name.as_deref().is_some_and(|n| BOSSES.contains(&n)));
            }
        }
        assert_eq!(room_count_for(1), 10);
    }

    #[test]
    fn rooms_are_pure_in_seed_and_index() {
        let a = make_room(4242, 3, 12, 2, None);
        let b = make_room(4242, 3, 12, 2, None);
        assert_eq!(a, b);
        assert!(a.difficulty >= 1);
    }

    #[test]
    fn modifiers_shift_difficulty_and_loot() {
        let plain = make_room(99, 2, 10, 1, None);
        let risky = make_room(99, 2, 10, 1, Some(RouteChoice::Risky.modifier()));
        assert_eq!(risky.difficulty, plain.difficulty + 1);
        assert!((risky.loot_mult - 1.35).abs() < f64::EPSILON);
        let safe = make_room(99, 0, 10, 1, Some(RoomModifier { loot_mult: 1.0, difficulty_add: -10 }));
        assert_eq!(safe.difficulty, 1);
    }

    #[test]
    fn start_rejects_second_run_and_clamps_risk() {
        let (catalog, mut state) = setup();
        assert!(start(&mut state, &catalog, 9));
        let run = state.expedition.as_ref().unwrap();
        assert_eq!(run.risk, 3);
        assert_eq!(run.room_count, 14);
        assert!(run.seed <= 0x7FFF_FFFF);
        assert!(!start(&mut state, &catalog, 1));
        assert!(stop(&mut state));
        assert_eq!(state.activity, Activity::Idle);
        assert!(!stop(&mut state));
    }

    #[test]
    fn start_packs_rations_then_meat() {
        let (catalog, mut state) = setup();
        state.resources.set("rations", 1.0, 200.0);
        state.resources.set("meat", 2.0, 200.0);
        assert!(start(&mut state, &catalog, 1));
        assert!(state.resources.get("rations").abs() < f64::EPSILON);
        assert!((state.resources.get("meat") - 2.0).abs() < f64::EPSILON);

        assert!(stop(&mut state));
        assert!(start(&mut state, &catalog, 1));
        assert!((state.resources.get("meat") - 1.0).abs() < f64::EPSILON);

        assert!(stop(&mut state));
        state.resources.set("meat", 0.0, 200.0);
        assert!(start(&mut state, &catalog, 2));
        assert!(state.resources.get("meat").abs() < f64::EPSILON);
        assert!(state.expedition.is_some());
    }

    #[test]
    fn event_rooms_suspend_until_choice() {
        let (catalog, mut state) = setup();
        assert!(start(&mut state, &catalog, 1));
        let run = state.expedition.as_mut().unwrap();
        run.room = Room {
            kind: RoomKind::Event,
            ..make_room(run.seed, 0, run.room_count, 1, None)
        };
        tick(&mut state, &catalog, 1.0);
        assert!(state.expedition.as_ref().unwrap().pending_choice);
        tick(&mut state, &catalog, 1.0);
        assert_eq!(state.expedition.as_ref().unwrap().room_index, 0);
        assert!(choose(&mut state, RouteChoice::Safe));
        let run = state.expedition.as_ref().unwrap();
        assert_eq!(run.room_index, 1);
        assert!(run.next_room_mod.is_none());
        assert!((run.room.loot_mult - 0.9).abs() < f64::EPSILON);
        assert!(!choose(&mut state, RouteChoice::Risky));
    }

    #[test]
    fn runs_end_and_return_to_idle() {
        let (catalog, mut state) = setup();
        assert!(start(&mut state, &catalog, 1));
        for _ in 0..20_000 {
            if state.expedition.is_none() {
                break;
            }
            if state.expedition.as_ref().is_some_and(|run| run.pending_choice) {
                choose(&mut state, RouteChoice::Safe);
            }
            tick(&mut state, &catalog, 0.1);
        }
        assert!(state.expedition.is_none());
        assert_eq!(state.activity, Activity::Idle);
        assert!(state.records.rooms_cleared > 0);
    }

    #[test]
    fn route_choice_parses() {
        assert_eq!("risky".parse::<RouteChoice>(), Ok(RouteChoice::Risky));
        assert!("sideways".parse::<RouteChoice>().is_err());
    }
}
