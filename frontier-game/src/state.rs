//! The single root state tree mutated by ticks and actions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::catalog::{
    BuildingId, Catalog, EquipmentSlot, PotionKind, RecipeId, ResourceId, SkillId, upper_first,
};
use crate::combat::CombatEncounter;
use crate::constants::{
    GAME_LOG_CAPACITY, INJURED_EFFICIENCY, LOG_ITEM_BROKEN, LOG_LEVEL_UP,
};
use crate::dungeon::DungeonRun;
use crate::expedition::ExpeditionRun;
use crate::ledger::ResourceLedger;
use crate::modifiers::{Modifiers, compute_modifiers};
use crate::progression::level_from_xp;
use crate::rng::RngStreams;

/// Save format version. Documents with any other value are discarded on load.
pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub created_at_ms: f64,
    /// Host wall clock at the last frame, used to measure offline time.
    pub last_tick_at_ms: f64,
    /// Monotonic simulated clock. Potions, injuries, crops, and auto-use read this.
    pub sim_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquippedItem {
    pub item_id: ResourceId,
    pub durability: f64,
}

impl EquippedItem {
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.durability <= 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatherActivity {
    pub skill: SkillId,
    /// Mining node, fish, or scavenging zone id. Woodcutting has no target.
    #[serde(default)]
    pub target: Option<String>,
    pub progress_sec: f64,
    pub interval_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CraftActivity {
    pub recipe: RecipeId,
    pub in_progress: bool,
    pub remaining_sec: f64,
}

/// The one mutually exclusive thing the player is doing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Activity {
    #[default]
    Idle,
    Gather(GatherActivity),
    Craft(CraftActivity),
    Expedition,
    Dungeon,
}

impl Activity {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Gather(_) => "gather",
            Self::Craft(_) => "craft",
            Self::Expedition => "expedition",
            Self::Dungeon => "dungeon",
        }
    }

    #[must_use]
    pub const fn is_run(&self) -> bool {
        matches!(self, Self::Expedition | Self::Dungeon)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Records {
    pub rooms_cleared: u32,
    pub bosses_defeated: u32,
    pub expeditions_completed: u32,
    pub dungeons_completed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePotion {
    pub potion: ResourceId,
    pub kind: PotionKind,
    pub amount: f64,
    pub started_at_ms: f64,
    pub ends_at_ms: f64,
    pub next_tick_at_ms: f64,
    #[serde(default)]
    pub interval_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PotionState {
    pub active: Option<ActivePotion>,
    /// Simulated time at which each potion family may be drunk again.
    pub cooldowns: BTreeMap<PotionKind, f64>,
}

impl PotionState {
    #[must_use]
    pub fn ready(&self, kind: PotionKind, now_ms: f64) -> bool {
        self.cooldowns.get(&kind).is_none_or(|ready_at| now_ms >= *ready_at)
    }

    /// Bonus added to hit chance by an active accuracy potion.
    #[must_use]
    pub fn accuracy_bonus(&self) -> f64 {
        match &self.active {
            Some(active) if active.kind == PotionKind::Accuracy => active.amount,
            _ => 0.0,
        }
    }

    #[must_use]
    pub fn buff_active(&self) -> bool {
        self.active.as_ref().is_some_and(|active| active.kind.is_buff())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropPatch {
    pub crop: ResourceId,
    pub planted_at_ms: f64,
    pub ready_at_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Legacy {
    #[serde(default)]
    pub points: u32,
    #[serde(default = "Legacy::default_mult")]
    pub global_xp_mult: f64,
    #[serde(default = "Legacy::default_mult")]
    pub global_yield_mult: f64,
    #[serde(default)]
    pub settlements_founded: u32,
}

impl Legacy {
    const fn default_mult() -> f64 {
        1.0
    }
}

impl Default for Legacy {
    fn default() -> Self {
        Self {
            points: 0,
            global_xp_mult: Self::default_mult(),
            global_yield_mult: Self::default_mult(),
            settlements_founded: 0,
        }
    }
}

/// Bounded newest-first list of feed lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Feed<const CAP: usize> {
    lines: VecDeque<String>,
}

impl<const CAP: usize> Feed<CAP> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: VecDeque::new(),
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push_front(line.into());
        self.lines.truncate(CAP);
    }

    #[must_use]
    pub fn latest(&self) -> Option<&str> {
        self.lines.front().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub at_ms: u64,
    pub key: String,
    pub text: String,
}

/// Player-facing message log, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameLog {
    entries: VecDeque<LogEntry>,
}

impl GameLog {
    pub fn push(&mut self, at_ms: f64, key: &str, text: impl Into<String>) {
        self.entries.push_front(LogEntry {
            at_ms: crate::numbers::f64_to_u64_saturating(at_ms),
            key: key.to_string(),
            text: text.into(),
        });
        self.entries.truncate(GAME_LOG_CAPACITY);
    }

    #[must_use]
    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any retained entry carries `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry.key == key)
    }
}

/// Root of everything that is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub version: u32,
    pub meta: Meta,
    pub seed: u64,
    pub rng: RngStreams,
    pub resources: ResourceLedger,
    pub skills: BTreeMap<SkillId, f64>,
    pub buildings: BTreeMap<BuildingId, u32>,
    pub equipment: BTreeMap<EquipmentSlot, EquippedItem>,
    pub activity: Activity,
    pub mining_target: Option<ResourceId>,
    pub fishing_target: Option<ResourceId>,
    pub scavenging_zone: Option<String>,
    pub expedition: Option<ExpeditionRun>,
    pub dungeon: Option<DungeonRun>,
    pub records: Records,
    pub potion: PotionState,
    pub farming: Vec<Option<CropPatch>>,
    pub legacy: Legacy,
    pub injured_until_ms: Option<f64>,
    pub log: GameLog,
}

impl PlayerState {
    /// Fresh settlement seeded from `seed`, stamped with the host clock.
    #[must_use]
    pub fn new(catalog: &Catalog, seed: u64, now_ms: f64) -> Self {
        let mut resources = ResourceLedger::new();
        for (id, amount) in &catalog.starting_resources {
            resources.set(id.as_str(), *amount, f64::MAX);
        }
        Self {
            version: SAVE_VERSION,
            meta: Meta {
                created_at_ms: now_ms,
                last_tick_at_ms: now_ms,
                sim_time_ms: 0.0,
            },
            seed,
            rng: RngStreams::from_user_seed(seed),
            resources,
            skills: SkillId::ALL.into_iter().map(|skill| (skill, 0.0)).collect(),
            buildings: BuildingId::ALL.into_iter().map(|id| (id, 0)).collect(),
            equipment: BTreeMap::new(),
            activity: Activity::Idle,
            mining_target: catalog.mining_nodes.first().map(|node| node.id.clone()),
            fishing_target: catalog.fish.first().map(|fish| fish.id.clone()),
            scavenging_zone: catalog.scavenging_zones.first().map(|zone| zone.id.clone()),
            expedition: None,
            dungeon: None,
            records: Records::default(),
            potion: PotionState::default(),
            farming: vec![None; catalog.farming_patches],
            legacy: Legacy::default(),
            injured_until_ms: None,
            log: GameLog::default(),
        }
    }

    #[must_use]
    pub fn now_ms(&self) -> f64 {
        self.meta.sim_time_ms
    }

    #[must_use]
    pub fn skill_xp(&self, skill: SkillId) -> f64 {
        self.skills.get(&skill).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn skill_level(&self, skill: SkillId) -> u32 {
        level_from_xp(self.skill_xp(skill))
    }

    /// Sum of every skill level, used by prestige.
    #[must_use]
    pub fn total_level(&self) -> u32 {
        SkillId::ALL.into_iter().map(|skill| self.skill_level(skill)).sum()
    }

    #[must_use]
    pub fn building_level(&self, id: BuildingId) -> u32 {
        self.buildings.get(&id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn modifiers(&self) -> Modifiers {
        compute_modifiers(self)
    }

    #[must_use]
    pub fn storage_cap(&self) -> f64 {
        self.modifiers().storage_cap
    }

    /// Credit a resource up to the current storage cap. Returns the amount added.
    pub fn add_resource(&mut self, id: &str, amount: f64) -> f64 {
        let cap = self.storage_cap();
        self.resources.add(id, amount, cap)
    }

    #[must_use]
    pub fn resource_room(&self, id: &str) -> f64 {
        self.resources.room(id, self.storage_cap())
    }

    /// Award XP and log any level crossed.
    pub fn add_xp(&mut self, skill: SkillId, amount: f64) {
        if amount.is_nan() || amount <= 0.0 {
            return;
        }
        let before = self.skill_level(skill);
        *self.skills.entry(skill).or_insert(0.0) += amount;
        let after = self.skill_level(skill);
        if after > before {
            log::info!("{skill} reached level {after}");
            self.push_log(
                LOG_LEVEL_UP,
                format!("{} reached level {after}!", upper_first(skill.as_str())),
            );
        }
    }

    #[must_use]
    pub fn is_injured(&self) -> bool {
        self.injured_until_ms
            .is_some_and(|until| until > self.meta.sim_time_ms)
    }

    /// Work-rate multiplier applied while injured.
    #[must_use]
    pub fn efficiency(&self) -> f64 {
        if self.is_injured() {
            INJURED_EFFICIENCY
        } else {
            1.0
        }
    }

    pub fn push_log(&mut self, key: &str, text: impl Into<String>) {
        let at = self.meta.sim_time_ms;
        self.log.push(at, key, text);
    }

    #[must_use]
    pub fn equipped(&self, slot: EquipmentSlot) -> Option<&EquippedItem> {
        self.equipment.get(&slot)
    }

    /// Tier of the item in `slot`, halved when broken and zero when empty.
    #[must_use]
    pub fn effective_tier(&self, catalog: &Catalog, slot: EquipmentSlot) -> f64 {
        self.equipped(slot)
            .and_then(|equipped| {
                catalog.item(equipped.item_id.as_str()).map(|item| {
                    let tier = f64::from(item.tier);
                    if equipped.is_broken() { tier * 0.5 } else { tier }
                })
            })
            .unwrap_or(0.0)
    }

    /// Reduce durability of the item in `slot`, logging when it breaks.
    pub fn wear(&mut self, catalog: &Catalog, slot: EquipmentSlot, amount: f64) {
        if amount <= 0.0 {
            return;
        }
        let Some(equipped) = self.equipment.get_mut(&slot) else {
            return;
        };
        let before = equipped.durability;
        equipped.durability = (before - amount).max(0.0);
        if before > 0.0 && equipped.durability <= 0.0 {
            let name = catalog.resource_name(equipped.item_id.as_str()).to_string();
            self.push_log(LOG_ITEM_BROKEN, format!("Broken {name}."));
        }
    }

    /// The encounter currently being fought, wherever it lives.
    pub fn live_encounter_mut(&mut self) -> Option<&mut CombatEncounter> {
        if let Some(run) = self.expedition.as_mut() {
            return run.room.encounter.as_mut();
        }
        self.dungeon.as_mut().and_then(|run| run.encounter.as_mut())
    }

    #[must_use]
    pub fn live_encounter(&self) -> Option<&CombatEncounter> {
        if let Some(run) = self.expedition.as_ref() {
            return run.room.encounter.as_ref();
        }
        self.dungeon.as_ref().and_then(|run| run.encounter.as_ref())
    }
}
