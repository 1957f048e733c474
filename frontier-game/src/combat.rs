//! Cooldown-scheduled combat shared by expedition rooms, dungeon encounters,
//! and the dungeon boss.
//!
//! An encounter snapshots the player's stats, refreshes them every tick so
//! equipment changes mid-fight take effect, and draws every roll from its
//! own [`Mulberry32`] cursor. Replaying the same ticks against the same
//! cursor therefore yields the same fight.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::catalog::{Catalog, EquipmentSlot, PotionKind, ResourceId, SkillId};
use crate::constants::{
    AUTO_ACTION_BUDGET, AUTO_USE_COOLDOWN_MS, AUTO_USE_HP_FRACTION, COMBAT_FEED_CAPACITY,
    CRIT_MULTIPLIER, HERB_DROP_CHANCE, INJURY_DURATION_MS, LOG_INJURY, MANUAL_ACTION_BUDGET,
    MAX_PLAYER_INTERVAL, MAX_QUEUED_ATTACKS, MEAT_DROP_CHANCE, MIN_PLAYER_INTERVAL,
};
use crate::numbers::usize_to_f64;
use crate::rng::{Mulberry32, RngDomain};
use crate::state::{Feed, PlayerState};

/// Player stats derived from combat level, equipment, and barracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerCombat {
    pub level: u32,
    pub power: f64,
    pub toughness: f64,
    pub max_hp: f64,
    pub interval: f64,
}

impl PlayerCombat {
    #[must_use]
    pub fn from_state(state: &PlayerState, catalog: &Catalog) -> Self {
        let level = state.skill_level(SkillId::Combat);
        let lvl = f64::from(level);
        let weapon = state.effective_tier(catalog, EquipmentSlot::Weapon);
        let armor = EquipmentSlot::ARMOR
            .into_iter()
            .map(|slot| state.effective_tier(catalog, slot))
            .sum::<f64>()
            / usize_to_f64(EquipmentSlot::ARMOR.len());
        let power = weapon.mul_add(0.45, lvl.mul_add(0.18, 1.0)) * state.modifiers().combat_power_mult;
        let toughness = armor.mul_add(0.5, lvl.mul_add(0.12, 1.0));
        let max_hp = armor.mul_add(10.0, lvl.mul_add(8.0, 30.0)).floor();
        let interval = (1.15 / (0.75 + power / 6.0)).clamp(MIN_PLAYER_INTERVAL, MAX_PLAYER_INTERVAL);
        Self {
            level,
            power,
            toughness,
            max_hp,
            interval,
        }
    }
}

/// Enemy stats and opening cooldowns for one encounter kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EnemyProfile {
    pub name: String,
    pub power: f64,
    pub max_hp: f64,
    pub interval: f64,
    pub player_cd: f64,
    pub enemy_cd: f64,
    pub boss: bool,
    pub difficulty: u32,
}

impl EnemyProfile {
    #[must_use]
    pub fn expedition_room(name: String, difficulty: u32, risk: u32, boss: bool) -> Self {
        let d = f64::from(difficulty);
        let boss_power = if boss { 4.0 } else { 0.0 };
        let boss_hp = if boss { 75.0 } else { 0.0 };
        let power = d.mul_add(0.35f64.mul_add(f64::from(risk), 1.2), 1.0) + boss_power;
        Self {
            name,
            power,
            max_hp: d.mul_add(14.0, 18.0 + boss_hp).floor(),
            interval: (1.35 / (0.7 + power / 7.0)).clamp(0.6, 1.5),
            player_cd: 0.1,
            enemy_cd: 0.7,
            boss,
            difficulty,
        }
    }

    #[must_use]
    pub fn dungeon_encounter(name: String, difficulty: u32) -> Self {
        let d = f64::from(difficulty);
        Self {
            name,
            power: d.mul_add(1.4, 1.0),
            max_hp: d.mul_add(12.0, 16.0).floor(),
            interval: 2.4,
            player_cd: 0.0,
            enemy_cd: 0.8,
            boss: false,
            difficulty,
        }
    }

    #[must_use]
    pub fn dungeon_boss(difficulty: u32) -> Self {
        Self {
            name: "Green Slime".to_string(),
            power: 3.2,
            max_hp: 120.0,
            interval: 2.4,
            player_cd: 0.0,
            enemy_cd: 1.2,
            boss: true,
            difficulty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CombatOutcome {
    Ongoing,
    Victory,
    Defeat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombatEvent {
    PlayerMissed,
    EnemyDodged,
    PlayerHit { damage: f64, crit: bool },
    PlayerDodged,
    Blocked,
    EnemyHit { damage: f64 },
}

/// What happened during one call to [`CombatEncounter::step`].
#[derive(Debug, Clone, PartialEq)]
pub struct CombatStep {
    pub events: SmallVec<[CombatEvent; 8]>,
    /// Landed player hits; each costs the weapon one durability.
    pub weapon_hits: u32,
    /// Enemy attacks that were not dodged; each costs every armor piece one durability.
    pub armor_hits: u32,
    pub outcome: CombatOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatEncounter {
    pub enemy_name: String,
    pub enemy_power: f64,
    pub enemy_max_hp: f64,
    pub enemy_hp: f64,
    pub enemy_interval: f64,
    pub player_level: u32,
    pub player_power: f64,
    pub player_toughness: f64,
    pub player_max_hp: f64,
    pub player_hp: f64,
    pub player_interval: f64,
    pub player_cd: f64,
    pub enemy_cd: f64,
    rng: Mulberry32,
    pub feed: Feed<COMBAT_FEED_CAPACITY>,
    pub buff_potion_used: bool,
    pub queued_attacks: u8,
    pub auto_fight: bool,
    pub last_auto_use_ms: Option<f64>,
    pub damage_taken: f64,
    pub boss: bool,
    pub difficulty: u32,
    pub started: bool,
}

impl CombatEncounter {
    #[must_use]
    pub fn new(profile: EnemyProfile, player: PlayerCombat, seed: u32, buff_active: bool) -> Self {
        Self {
            enemy_name: profile.name,
            enemy_power: profile.power,
            enemy_max_hp: profile.max_hp,
            enemy_hp: profile.max_hp,
            enemy_interval: profile.interval,
            player_level: player.level,
            player_power: player.power,
            player_toughness: player.toughness,
            player_max_hp: player.max_hp,
            player_hp: player.max_hp,
            player_interval: player.interval,
            player_cd: profile.player_cd,
            enemy_cd: profile.enemy_cd,
            rng: Mulberry32::new(seed),
            feed: Feed::new(),
            buff_potion_used: buff_active,
            queued_attacks: 0,
            auto_fight: true,
            last_auto_use_ms: None,
            damage_taken: 0.0,
            boss: profile.boss,
            difficulty: profile.difficulty,
            started: false,
        }
    }

    /// Replace the stat snapshot, keeping current HP within the new maximum.
    pub fn refresh(&mut self, player: PlayerCombat) {
        self.player_level = player.level;
        self.player_power = player.power;
        self.player_toughness = player.toughness;
        self.player_interval = player.interval;
        self.player_max_hp = player.max_hp;
        self.player_hp = self.player_hp.min(self.player_max_hp);
    }

    #[must_use]
    pub fn outcome(&self) -> CombatOutcome {
        if self.player_hp <= 0.0 {
            CombatOutcome::Defeat
        } else if self.enemy_hp <= 0.0 {
            CombatOutcome::Victory
        } else {
            CombatOutcome::Ongoing
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.outcome() != CombatOutcome::Ongoing
    }

    /// Queue one manual attack. Returns `false` when the queue is full.
    pub fn queue_attack(&mut self) -> bool {
        if self.is_resolved() || self.queued_attacks >= MAX_QUEUED_ATTACKS {
            return false;
        }
        self.queued_attacks += 1;
        true
    }

    pub fn toggle_auto_fight(&mut self) {
        self.auto_fight = !self.auto_fight;
        self.queued_attacks = 0;
    }

    /// Restore HP up to the maximum. Returns the amount healed.
    pub fn heal(&mut self, amount: f64) -> f64 {
        let before = self.player_hp;
        self.player_hp = (self.player_hp + amount.max(0.0)).min(self.player_max_hp);
        self.player_hp - before
    }

    #[must_use]
    pub fn hit_chance(&self, accuracy_bonus: f64) -> f64 {
        0.04f64
            .mul_add(self.player_power - self.enemy_power, 0.72)
            .clamp(0.55, 0.95)
            + accuracy_bonus
    }

    fn enemy_dodge_chance(&self) -> f64 {
        0.02f64
            .mul_add(self.enemy_power - self.player_power, 0.06)
            .clamp(0.03, 0.22)
    }

    fn crit_chance(&self) -> f64 {
        0.02f64
            .mul_add(self.player_power - self.enemy_power, 0.06)
            .clamp(0.04, 0.18)
    }

    fn player_dodge_chance(&self) -> f64 {
        0.002f64
            .mul_add(f64::from(self.player_level), 0.08)
            .clamp(0.05, 0.25)
    }

    /// Advance both cooldowns by `dt` and resolve every attack that came due.
    pub fn step(&mut self, dt: f64, accuracy_bonus: f64) -> CombatStep {
        let mut report = CombatStep {
            events: SmallVec::new(),
            weapon_hits: 0,
            armor_hits: 0,
            outcome: self.outcome(),
        };
        if self.is_resolved() {
            return report;
        }

        self.player_cd -= dt;
        self.enemy_cd -= dt;
        if !self.auto_fight && self.queued_attacks == 0 {
            self.player_cd = self.player_cd.max(0.0);
        }

        let budget = if self.auto_fight {
            AUTO_ACTION_BUDGET
        } else {
            MANUAL_ACTION_BUDGET
        };
        for _ in 0..budget {
            let player_ready =
                self.player_cd <= 0.0 && (self.auto_fight || self.queued_attacks > 0);
            let enemy_ready = self.enemy_cd <= 0.0;
            if !player_ready && !enemy_ready {
                break;
            }
            if player_ready && (!enemy_ready || self.player_cd <= self.enemy_cd) {
                self.player_cd += self.player_interval;
                if !self.auto_fight {
                    self.queued_attacks = self.queued_attacks.saturating_sub(1);
                }
                self.player_attack(accuracy_bonus, &mut report);
            } else {
                self.enemy_cd += self.enemy_interval;
                self.enemy_attack(&mut report);
            }
            if self.is_resolved() {
                break;
            }
        }

        report.outcome = self.outcome();
        report
    }

    fn player_attack(&mut self, accuracy_bonus: f64, report: &mut CombatStep) {
        if self.rng.next_f64() > self.hit_chance(accuracy_bonus) {
            self.feed.push("You miss.");
            report.events.push(CombatEvent::PlayerMissed);
            return;
        }
        if self.rng.next_f64() < self.enemy_dodge_chance() {
            self.feed.push(format!("{} dodges.", self.enemy_name));
            report.events.push(CombatEvent::EnemyDodged);
            return;
        }
        let crit = self.rng.next_f64() < self.crit_chance();
        let spread = self.rng.next_f64().mul_add(0.5, 0.75);
        let mult = if crit { CRIT_MULTIPLIER } else { 1.0 };
        let damage = (spread * self.player_power.mul_add(3.0, 2.0) * mult)
            .floor()
            .max(1.0);
        self.enemy_hp = (self.enemy_hp - damage).max(0.0);
        report.weapon_hits += 1;
        report.events.push(CombatEvent::PlayerHit { damage, crit });
        let suffix = if crit { " (crit)" } else { "" };
        self.feed
            .push(format!("You hit {} for {damage}{suffix}.", self.enemy_name));
    }

    fn enemy_attack(&mut self, report: &mut CombatStep) {
        if self.rng.next_f64() < self.player_dodge_chance() {
            self.feed.push("You dodge.");
            report.events.push(CombatEvent::PlayerDodged);
            return;
        }
        report.armor_hits += 1;
        let spread = self.rng.next_f64().mul_add(0.45, 0.8);
        let damage = spread
            .mul_add(self.enemy_power.mul_add(2.2, 1.0), -self.player_toughness * 1.2)
            .floor()
            .max(0.0);
        if damage <= 0.0 {
            self.feed
                .push(format!("{} strikes, but you block it.", self.enemy_name));
            report.events.push(CombatEvent::Blocked);
            return;
        }
        self.player_hp = (self.player_hp - damage).max(0.0);
        self.damage_taken += damage;
        report.events.push(CombatEvent::EnemyHit { damage });
        self.feed
            .push(format!("{} hits you for {damage}.", self.enemy_name));
    }
}

/// One simulation tick of a live encounter: refresh stats, apply regen and
/// auto-use, resolve attacks, then charge equipment durability.
pub fn tick_encounter(
    state: &mut PlayerState,
    catalog: &Catalog,
    encounter: &mut CombatEncounter,
    dt: f64,
) -> CombatOutcome {
    encounter.refresh(PlayerCombat::from_state(state, catalog));
    if !encounter.started {
        encounter.started = true;
        encounter.feed.push(format!("{} appears!", encounter.enemy_name));
    }
    apply_regen(state, encounter);
    if encounter.auto_fight {
        auto_use(state, catalog, encounter);
    }

    let step = encounter.step(dt, state.potion.accuracy_bonus());
    if step.weapon_hits > 0 {
        state.wear(catalog, EquipmentSlot::Weapon, f64::from(step.weapon_hits));
    }
    if step.armor_hits > 0 {
        for slot in EquipmentSlot::ARMOR {
            state.wear(catalog, slot, f64::from(step.armor_hits));
        }
    }
    step.outcome
}

fn apply_regen(state: &mut PlayerState, encounter: &mut CombatEncounter) {
    let now = state.now_ms();
    let Some(active) = state.potion.active.as_mut() else {
        return;
    };
    if active.kind != PotionKind::Regen || active.interval_ms <= 0.0 {
        return;
    }
    while active.next_tick_at_ms <= now && active.next_tick_at_ms <= active.ends_at_ms {
        encounter.heal(active.amount);
        active.next_tick_at_ms += active.interval_ms;
    }
}

fn auto_use(state: &mut PlayerState, catalog: &Catalog, encounter: &mut CombatEncounter) {
    if encounter.player_hp >= encounter.player_max_hp * AUTO_USE_HP_FRACTION {
        return;
    }
    let now = state.now_ms();
    if encounter
        .last_auto_use_ms
        .is_some_and(|last| now - last < AUTO_USE_COOLDOWN_MS)
    {
        return;
    }
    if let Some((food, heal)) = best_food(state, catalog) {
        state.resources.remove(food.as_str(), 1.0);
        let healed = encounter.heal(heal);
        encounter.feed.push(format!(
            "You eat {} and heal {healed}.",
            catalog.resource_name(food.as_str())
        ));
        encounter.last_auto_use_ms = Some(now);
        return;
    }
    if let Some(potion) = best_heal_potion(state, catalog)
        && drink_heal_potion(state, catalog, &potion, encounter)
    {
        encounter.last_auto_use_ms = Some(now);
    }
}

/// Held food with the largest heal.
pub(crate) fn best_food(state: &PlayerState, catalog: &Catalog) -> Option<(ResourceId, f64)> {
    catalog
        .foods
        .iter()
        .filter(|(id, _)| state.resources.has(id.as_str(), 1.0))
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(id, heal)| (id.clone(), *heal))
}

/// Held healing potion with the largest heal.
pub(crate) fn best_heal_potion(state: &PlayerState, catalog: &Catalog) -> Option<ResourceId> {
    catalog
        .potions
        .values()
        .filter(|potion| potion.kind == PotionKind::Heal && state.resources.has(potion.id.as_str(), 1.0))
        .max_by(|a, b| a.amount.total_cmp(&b.amount))
        .map(|potion| potion.id.clone())
}

/// Drink a healing potion into `encounter`, honouring the shared heal cooldown.
pub(crate) fn drink_heal_potion(
    state: &mut PlayerState,
    catalog: &Catalog,
    potion_id: &ResourceId,
    encounter: &mut CombatEncounter,
) -> bool {
    let Some(potion) = catalog.potion(potion_id.as_str()) else {
        return false;
    };
    let now = state.now_ms();
    if potion.kind != PotionKind::Heal
        || !state.potion.ready(PotionKind::Heal, now)
        || !state.resources.has(potion_id.as_str(), 1.0)
    {
        return false;
    }
    state.resources.remove(potion_id.as_str(), 1.0);
    state
        .potion
        .cooldowns
        .insert(PotionKind::Heal, potion.cooldown_sec.mul_add(1000.0, now));
    let healed = encounter.heal(potion.amount);
    encounter.feed.push(format!(
        "You drink {} and heal {healed}.",
        catalog.resource_name(potion_id.as_str())
    ));
    true
}

/// Rewards credited after a won fight or an opened cache.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Loot {
    pub gold: f64,
    pub meat: f64,
    pub herbs: f64,
}

impl Loot {
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = format!("+{} gold", self.gold);
        if self.meat > 0.0 {
            text.push_str(&format!(", +{} meat", self.meat));
        }
        if self.herbs > 0.0 {
            text.push_str(&format!(", +{} herbs", self.herbs));
        }
        text
    }
}

/// Roll and credit loot from the loot stream.
pub fn award_loot(state: &mut PlayerState, difficulty: u32, boss: bool, loot_mult: f64) -> Loot {
    let m = loot_mult * state.modifiers().loot_mult;
    let d = f64::from(difficulty);
    let boss_gold = if boss { 20.0 } else { 0.0 };
    let rng = state.rng.stream(RngDomain::Loot);
    let meat_roll = rng.chance(MEAT_DROP_CHANCE);
    let herb_roll = rng.chance(HERB_DROP_CHANCE);
    let loot = Loot {
        gold: (d.mul_add(5.0, 6.0 + boss_gold) * m).ceil(),
        meat: if meat_roll { (d.mul_add(0.6, 1.0) * m).ceil() } else { 0.0 },
        herbs: if herb_roll { (d.mul_add(0.4, 1.0) * m).ceil() } else { 0.0 },
    };
    state.add_resource("gold", loot.gold);
    state.add_resource("meat", loot.meat);
    state.add_resource("herbs", loot.herbs);
    loot
}

/// Roll an injury at `base_chance`, scaled by scout lodge protection.
pub fn roll_injury(state: &mut PlayerState, base_chance: f64) -> bool {
    let chance = base_chance * state.modifiers().injury_chance_mult;
    if state.rng.stream(RngDomain::Injury).next_f64() > chance {
        return false;
    }
    let until = state.now_ms() + INJURY_DURATION_MS;
    state.injured_until_ms = Some(state.injured_until_ms.map_or(until, |current| current.max(until)));
    log::debug!("injured until {until}ms");
    state.push_log(LOG_INJURY, "Injury! Efficiency reduced for 60s.");
    true
}
