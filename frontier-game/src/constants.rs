//! Centralized balance and tuning constants for the frontier simulation.
//!
//! Content tables (resources, tiers, recipes) are injected through the
//! catalog; the numbers here are the rules that act on that content and
//! only change through reviewed code.

// Logging keys -------------------------------------------------------------
pub(crate) const LOG_IDLE: &str = "log.activity.idle";
pub(crate) const LOG_GATHER_START: &str = "log.gather.start";
pub(crate) const LOG_GATHER_TARGET: &str = "log.gather.target";
pub(crate) const LOG_STORAGE_FULL: &str = "log.gather.storage-full";
pub(crate) const LOG_CRAFT_START: &str = "log.craft.start";
pub(crate) const LOG_LEVEL_UP: &str = "log.level-up";
pub(crate) const LOG_BUILDING_UPGRADED: &str = "log.building.upgraded";
pub(crate) const LOG_ITEM_BROKEN: &str = "log.item.broken";
pub(crate) const LOG_ITEM_EQUIPPED: &str = "log.item.equipped";
pub(crate) const LOG_ITEM_UNEQUIPPED: &str = "log.item.unequipped";
pub(crate) const LOG_ITEM_REPAIRED: &str = "log.item.repaired";
pub(crate) const LOG_SOLD: &str = "log.economy.sold";
pub(crate) const LOG_POTION: &str = "log.potion.drink";
pub(crate) const LOG_FARM_PLANT: &str = "log.farming.plant";
pub(crate) const LOG_FARM_HARVEST: &str = "log.farming.harvest";
pub(crate) const LOG_INJURY: &str = "log.injury";
pub(crate) const LOG_EXPEDITION_START: &str = "log.expedition.start";
pub(crate) const LOG_EXPEDITION_END: &str = "log.expedition.end";
pub(crate) const LOG_EXPEDITION_COMPLETE: &str = "log.expedition.complete";
pub(crate) const LOG_EXPEDITION_RETREAT: &str = "log.expedition.retreat";
pub(crate) const LOG_EXPEDITION_CHOICE: &str = "log.expedition.choice";
pub(crate) const LOG_EXPEDITION_REST: &str = "log.expedition.rest";
pub(crate) const LOG_EXPEDITION_TREASURE: &str = "log.expedition.treasure";
pub(crate) const LOG_COMBAT_WON: &str = "log.combat.won";
pub(crate) const LOG_DUNGEON_ENTER: &str = "log.dungeon.enter";
pub(crate) const LOG_DUNGEON_EXIT: &str = "log.dungeon.exit";
pub(crate) const LOG_DUNGEON_COMPLETE: &str = "log.dungeon.complete";
pub(crate) const LOG_PRESTIGE: &str = "log.legacy.prestige";
pub(crate) const LOG_LEGACY_UPGRADE: &str = "log.legacy.upgrade";
pub(crate) const LOG_OFFLINE: &str = "log.offline";

// Feed capacities ----------------------------------------------------------
pub(crate) const GAME_LOG_CAPACITY: usize = 80;
pub(crate) const EXPEDITION_FEED_CAPACITY: usize = 40;
pub(crate) const DUNGEON_FEED_CAPACITY: usize = 40;
pub(crate) const COMBAT_FEED_CAPACITY: usize = 30;

// Simulation ---------------------------------------------------------------
pub(crate) const MAX_TICK_SEC: f64 = 1.0;
pub(crate) const INJURED_EFFICIENCY: f64 = 0.6;
pub(crate) const INJURY_DURATION_MS: f64 = 60_000.0;
pub(crate) const GATHER_INTERVAL_SEC: f64 = 1.0;
pub(crate) const SCAVENGE_INTERVAL_SEC: f64 = 2.0;
pub(crate) const MIN_GATHER_INTERVAL_SEC: f64 = 0.2;
pub(crate) const CRAFT_SAFETY_ITERATIONS: u32 = 100;
pub(crate) const BURN_BASE_PCT: f64 = 35.0;
pub(crate) const BURN_PCT_PER_LEVEL: f64 = 2.0;
pub(crate) const BURNT_XP_FRACTION: f64 = 0.25;

// Offline catch-up ---------------------------------------------------------
pub(crate) const OFFLINE_CAP_SEC: f64 = 8.0 * 3600.0;
pub(crate) const OFFLINE_STEP_SEC: f64 = 1.0;
pub(crate) const OFFLINE_MIN_SEC: f64 = 1.0;

// Modifiers ----------------------------------------------------------------
pub(crate) const TOWN_HALL_XP_PER_LEVEL: f64 = 0.02;
pub(crate) const WORKSHOP_YIELD_PER_LEVEL: f64 = 0.07;
pub(crate) const FORGE_SPEED_PER_LEVEL: f64 = 0.08;
pub(crate) const CAMPFIRE_SPEED_PER_LEVEL: f64 = 0.10;
pub(crate) const ALCHEMY_SPEED_PER_LEVEL: f64 = 0.08;
pub(crate) const BARRACKS_POWER_PER_LEVEL: f64 = 0.07;
pub(crate) const SCOUT_LOOT_PER_LEVEL: f64 = 0.05;
pub(crate) const ALCHEMY_LOOT_PER_LEVEL: f64 = 0.03;
pub(crate) const SCOUT_INJURY_PER_LEVEL: f64 = 0.04;
pub(crate) const SCOUT_INJURY_REDUCTION_CAP: f64 = 0.35;
pub(crate) const BASE_STORAGE_CAP: f64 = 200.0;
pub(crate) const STORAGE_CAP_PER_STOREHOUSE: f64 = 250.0;

// Combat -------------------------------------------------------------------
pub(crate) const AUTO_ACTION_BUDGET: u32 = 8;
pub(crate) const MANUAL_ACTION_BUDGET: u32 = 20;
pub(crate) const MAX_QUEUED_ATTACKS: u8 = 1;
pub(crate) const AUTO_USE_HP_FRACTION: f64 = 0.35;
pub(crate) const AUTO_USE_COOLDOWN_MS: f64 = 3_000.0;
pub(crate) const MIN_PLAYER_INTERVAL: f64 = 0.45;
pub(crate) const MAX_PLAYER_INTERVAL: f64 = 1.2;
pub(crate) const CRIT_MULTIPLIER: f64 = 1.6;

// Expedition ---------------------------------------------------------------
pub(crate) const ROOM_SEED_STRIDE: u32 = 1337;
pub(crate) const ENEMY_NAME_SALT: u32 = 0x9E37_79B9;
pub(crate) const ENCOUNTER_SEED_SALT: u32 = 0xDEAD_BEEF;
pub(crate) const REST_ROOM_SEC: f64 = 6.0;
pub(crate) const TREASURE_ROOM_SEC: f64 = 3.0;
pub(crate) const COMBAT_ROOM_SEC: f64 = 1.0;
pub(crate) const MAX_ROOM_INJURY_CHANCE: f64 = 0.42;

// Loot ---------------------------------------------------------------------
pub(crate) const MEAT_DROP_CHANCE: f64 = 0.65;
pub(crate) const HERB_DROP_CHANCE: f64 = 0.40;

// Dungeon ------------------------------------------------------------------
pub(crate) const DUNGEON_WIDTH: usize = 25;
pub(crate) const DUNGEON_HEIGHT: usize = 17;
pub(crate) const DUNGEON_MAX_ROOMS: usize = 8;
pub(crate) const DUNGEON_ROOM_MIN: i64 = 4;
pub(crate) const DUNGEON_ROOM_MAX: i64 = 7;
pub(crate) const DUNGEON_PLACEMENT_ATTEMPTS: u32 = 120;
pub(crate) const DUNGEON_ENCOUNTER_CHANCE: f64 = 0.18;
pub(crate) const DUNGEON_ENCOUNTER_COOLDOWN: u32 = 2;
pub(crate) const DUNGEON_STEPS_PER_DIFFICULTY: u32 = 8;
pub(crate) const DUNGEON_DEFEAT_INJURY_CHANCE: f64 = 0.35;
pub(crate) const DUNGEON_RNG_SALT: u32 = 0xBEEF;

// Economy and legacy -------------------------------------------------------
pub(crate) const MIN_RESALE_DURABILITY: f64 = 0.2;
pub(crate) const REPAIR_XP_FRACTION: f64 = 0.25;
pub(crate) const LEGACY_UPGRADE_MULT: f64 = 1.05;
pub(crate) const CROP_XP_PER_TIER: f64 = 12.0;
pub(crate) const CROP_LEVELS_PER_BONUS: f64 = 20.0;
pub(crate) const CROP_PURE_CHANCE_DIVISOR: f64 = 120.0;
pub(crate) const CROP_PURE_CHANCE_CAP: f64 = 0.25;
