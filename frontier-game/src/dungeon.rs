//! Procedural grid dungeons: room placement, corridor carving, fog of war
//! and step-triggered encounters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::catalog::{Catalog, SkillId};
use crate::combat::{
    CombatEncounter, CombatOutcome, EnemyProfile, PlayerCombat, award_loot, roll_injury,
    tick_encounter,
};
use crate::constants::{
    DUNGEON_DEFEAT_INJURY_CHANCE, DUNGEON_ENCOUNTER_CHANCE, DUNGEON_ENCOUNTER_COOLDOWN,
    DUNGEON_FEED_CAPACITY, DUNGEON_HEIGHT, DUNGEON_MAX_ROOMS, DUNGEON_PLACEMENT_ATTEMPTS,
    DUNGEON_RNG_SALT, DUNGEON_ROOM_MAX, DUNGEON_ROOM_MIN, DUNGEON_STEPS_PER_DIFFICULTY,
    DUNGEON_WIDTH, LOG_COMBAT_WON, LOG_DUNGEON_COMPLETE, LOG_DUNGEON_ENTER, LOG_DUNGEON_EXIT,
};
use crate::rng::{Mulberry32, RngDomain, random_int};
use crate::sim::interrupt_activity;
use crate::state::{Activity, Feed, PlayerState};

const DUNGEON_ENEMIES: [&str; 5] = ["Slime", "Cave Rat", "Goblin", "Sporeling", "Rock Beetle"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tile {
    Wall,
    Floor,
    Boss,
}

impl Tile {
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        !matches!(self, Self::Wall)
    }

    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Wall => '#',
            Self::Floor => '.',
            Self::Boss => 'B',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        }
    }

    /// Unit offset as `(dx, dy)`, with north being `-y`.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::South => (0, 1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }

    #[must_use]
    pub const fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (0, -1) => Some(Self::North),
            (0, 1) => Some(Self::South),
            (1, 0) => Some(Self::East),
            (-1, 0) => Some(Self::West),
            _ => None,
        }
    }

    /// Neighbouring position, `None` when it would leave the grid.
    #[must_use]
    pub fn step(self, from: Position, width: usize, height: usize) -> Option<Position> {
        let (x, y) = match self {
            Self::North => (Some(from.x), from.y.checked_sub(1)),
            Self::South => (Some(from.x), Some(from.y + 1)),
            Self::East => (Some(from.x + 1), Some(from.y)),
            Self::West => (from.x.checked_sub(1), Some(from.y)),
        };
        let (x, y) = (x?, y?);
        (x < width && y < height).then_some(Position { x, y })
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "north" | "n" | "up" => Ok(Self::North),
            "south" | "s" | "down" => Ok(Self::South),
            "east" | "e" | "right" => Ok(Self::East),
            "west" | "w" | "left" => Ok(Self::West),
            _ => Err(()),
        }
    }
}

/// Packed visited-set over grid indices.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileBitmap {
    words: Vec<u64>,
}

impl TileBitmap {
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
        }
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .is_some_and(|word| word & (1 << (index % 64)) != 0)
    }

    /// Set `index`; returns `true` if it was not set before.
    pub fn insert(&mut self, index: usize) -> bool {
        let word = index / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let mask = 1 << (index % 64);
        let fresh = self.words[word] & mask == 0;
        self.words[word] |= mask;
        fresh
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonGrid {
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<Tile>,
    pub start: Position,
    pub boss: Position,
}

impl DungeonGrid {
    #[must_use]
    pub const fn index(&self, pos: Position) -> usize {
        pos.y * self.width + pos.x
    }

    #[must_use]
    pub fn tile(&self, pos: Position) -> Tile {
        if pos.x >= self.width || pos.y >= self.height {
            return Tile::Wall;
        }
        self.tiles.get(self.index(pos)).copied().unwrap_or(Tile::Wall)
    }

    fn set(&mut self, pos: Position, tile: Tile) {
        let index = self.index(pos);
        if let Some(slot) = self.tiles.get_mut(index) {
            *slot = tile;
        }
    }

    /// Render rows with `@` for the player and `?` for undiscovered tiles.
    #[must_use]
    pub fn render(&self, player: Position, discovered: &TileBitmap) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| {
                        let pos = Position::new(x, y);
                        if pos == player {
                            '@'
                        } else if discovered.contains(self.index(pos)) {
                            self.tile(pos).glyph()
                        } else {
                            '?'
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    x: usize,
    y: usize,
    w: usize,
    h: usize,
}

impl Rect {
    const fn centre(&self) -> Position {
        Position::new(self.x + self.w / 2, self.y + self.h / 2)
    }

    /// Overlap test that also rejects rooms touching with no wall between them.
    const fn overlaps_with_margin(&self, other: &Self) -> bool {
        self.x <= other.x + other.w
            && other.x <= self.x + self.w
            && self.y <= other.y + other.h
            && other.y <= self.y + self.h
    }
}

fn draw_usize(rng: &mut Mulberry32, lo: usize, hi: usize) -> usize {
    let lo_i = i64::try_from(lo).unwrap_or(0);
    let hi_i = i64::try_from(hi).unwrap_or(lo_i);
    usize::try_from(random_int(rng, lo_i, hi_i)).unwrap_or(lo)
}

/// Lay out rooms joined by L-shaped corridors. Pure in `seed`.
#[must_use]
pub fn generate_dungeon(seed: u32, width: usize, height: usize) -> DungeonGrid {
    let mut rng = Mulberry32::new(seed);
    let mut grid = DungeonGrid {
        width,
        height,
        tiles: vec![Tile::Wall; width * height],
        start: Position::new(0, 0),
        boss: Position::new(0, 0),
    };
    let room_lo = usize::try_from(DUNGEON_ROOM_MIN).unwrap_or(4);
    let room_hi = usize::try_from(DUNGEON_ROOM_MAX).unwrap_or(7) + 1;

    let mut rooms: Vec<Rect> = Vec::with_capacity(DUNGEON_MAX_ROOMS);
    for _ in 0..DUNGEON_PLACEMENT_ATTEMPTS {
        if rooms.len() >= DUNGEON_MAX_ROOMS {
            break;
        }
        let w = draw_usize(&mut rng, room_lo, room_hi);
        let h = draw_usize(&mut rng, room_lo, room_hi);
        if w + 2 >= width || h + 2 >= height {
            continue;
        }
        let x = draw_usize(&mut rng, 1, width - w - 1);
        let y = draw_usize(&mut rng, 1, height - h - 1);
        let room = Rect { x, y, w, h };
        if rooms.iter().any(|other| room.overlaps_with_margin(other)) {
            continue;
        }
        carve_room(&mut grid, room);
        if let Some(prev) = rooms.last() {
            carve_corridor(&mut grid, prev.centre(), room.centre());
        }
        rooms.push(room);
    }

    if rooms.is_empty() {
        let fallback = Rect {
            x: 2,
            y: 2,
            w: width.saturating_sub(4).max(1),
            h: height.saturating_sub(4).max(1),
        };
        carve_room(&mut grid, fallback);
        rooms.push(fallback);
    }

    let first = rooms[0];
    let last = rooms[rooms.len() - 1];
    if rooms.len() > 1 {
        grid.start = first.centre();
        grid.boss = last.centre();
    } else {
        // A lone room keeps the start and the boss in opposite corners.
        grid.start = Position::new(first.x, first.y);
        grid.boss = Position::new(first.x + first.w - 1, first.y + first.h - 1);
    }
    let boss = grid.boss;
    grid.set(boss, Tile::Boss);
    log::trace!("dungeon {seed:#x}: {} rooms", rooms.len());
    grid
}

fn carve_room(grid: &mut DungeonGrid, room: Rect) {
    for y in room.y..room.y + room.h {
        for x in room.x..room.x + room.w {
            grid.set(Position::new(x, y), Tile::Floor);
        }
    }
}

fn carve_corridor(grid: &mut DungeonGrid, from: Position, to: Position) {
    for x in from.x.min(to.x)..=from.x.max(to.x) {
        grid.set(Position::new(x, from.y), Tile::Floor);
    }
    for y in from.y.min(to.y)..=from.y.max(to.y) {
        grid.set(Position::new(to.x, y), Tile::Floor);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DungeonMode {
    Explore,
    Encounter,
    Boss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DungeonRun {
    pub seed: u32,
    pub grid: DungeonGrid,
    pub player: Position,
    pub discovered: TileBitmap,
    pub mode: DungeonMode,
    pub steps: u32,
    pub encounter_cooldown: u32,
    pub encounter: Option<CombatEncounter>,
    rng: Mulberry32,
    pub feed: Feed<DUNGEON_FEED_CAPACITY>,
}

impl DungeonRun {
    #[must_use]
    pub fn new(seed: u32) -> Self {
        let grid = generate_dungeon(seed, DUNGEON_WIDTH, DUNGEON_HEIGHT);
        let mut discovered = TileBitmap::with_len(grid.tiles.len());
        discovered.insert(grid.index(grid.start));
        let mut feed = Feed::new();
        feed.push("You descend into the dungeon.");
        Self {
            seed,
            player: grid.start,
            grid,
            discovered,
            mode: DungeonMode::Explore,
            steps: 0,
            encounter_cooldown: 0,
            encounter: None,
            rng: Mulberry32::new(seed ^ DUNGEON_RNG_SALT),
            feed,
        }
    }

    #[must_use]
    pub const fn depth_difficulty(&self) -> u32 {
        1 + self.steps / DUNGEON_STEPS_PER_DIFFICULTY
    }

    #[must_use]
    pub fn render(&self) -> Vec<String> {
        self.grid.render(self.player, &self.discovered)
    }
}

/// Enter a fresh dungeon. Rejected while another run is active.
pub fn start(state: &mut PlayerState, catalog: &Catalog) -> bool {
    if state.activity.is_run() || state.expedition.is_some() || state.dungeon.is_some() {
        return false;
    }
    interrupt_activity(state, catalog);
    let seed = state.rng.stream(RngDomain::Dungeon).next_word();
    state.dungeon = Some(DungeonRun::new(seed));
    state.activity = Activity::Dungeon;
    log::debug!("dungeon entered: seed={seed:#x}");
    state.push_log(LOG_DUNGEON_ENTER, "Entered the dungeon.");
    true
}

/// Leave the dungeon without finishing it.
pub fn exit(state: &mut PlayerState) -> bool {
    if state.dungeon.take().is_none() {
        return false;
    }
    state.activity = Activity::Idle;
    state.push_log(LOG_DUNGEON_EXIT, "Left the dungeon.");
    true
}

/// Step one tile. Only allowed while exploring.
pub fn move_player(state: &mut PlayerState, catalog: &Catalog, direction: Direction) -> bool {
    let buff_active = state.potion.buff_active();
    let player_stats = PlayerCombat::from_state(state, catalog);
    let Some(run) = state.dungeon.as_mut() else {
        return false;
    };
    if run.mode != DungeonMode::Explore {
        return false;
    }
    let Some(target) = direction.step(run.player, run.grid.width, run.grid.height) else {
        return false;
    };
    if !run.grid.tile(target).is_walkable() {
        return false;
    }

    run.player = target;
    let fresh = run.discovered.insert(run.grid.index(target));
    run.steps += 1;
    run.encounter_cooldown = run.encounter_cooldown.saturating_sub(1);

    if target == run.grid.boss {
        let profile = EnemyProfile::dungeon_boss(run.depth_difficulty());
        run.feed.push(format!("{} awakens!", profile.name));
        let seed = run.rng.next_word();
        run.encounter = Some(CombatEncounter::new(profile, player_stats, seed, buff_active));
        run.mode = DungeonMode::Boss;
        return true;
    }

    if fresh && run.encounter_cooldown == 0 && run.rng.next_f64() < DUNGEON_ENCOUNTER_CHANCE {
        let name = run
            .rng
            .pick(&DUNGEON_ENEMIES)
            .copied()
            .unwrap_or(DUNGEON_ENEMIES[0]);
        let seed = run.rng.next_word();
        let profile = EnemyProfile::dungeon_encounter(name.to_string(), run.depth_difficulty());
        run.feed.push("An enemy blocks your path.");
        run.feed.push(format!("{} emerges from the shadows.", profile.name));
        run.encounter = Some(CombatEncounter::new(profile, player_stats, seed, buff_active));
        run.mode = DungeonMode::Encounter;
        run.encounter_cooldown = DUNGEON_ENCOUNTER_COOLDOWN;
    }
    true
}

/// Advance a live dungeon fight by `dt` simulated seconds.
pub fn tick(state: &mut PlayerState, catalog: &Catalog, dt: f64) {
    let Some(mut run) = state.dungeon.take() else {
        return;
    };
    if tick_run(state, catalog, &mut run, dt) {
        state.dungeon = Some(run);
    }
}

fn tick_run(state: &mut PlayerState, catalog: &Catalog, run: &mut DungeonRun, dt: f64) -> bool {
    if run.mode == DungeonMode::Explore {
        return true;
    }
    let Some(mut encounter) = run.encounter.take() else {
        run.mode = DungeonMode::Explore;
        return true;
    };
    let scaled = dt * state.efficiency();
    match tick_encounter(state, catalog, &mut encounter, scaled) {
        CombatOutcome::Ongoing => {
            run.encounter = Some(encounter);
            true
        }
        CombatOutcome::Defeat => {
            run.feed.push("You flee the dungeon, battered.");
            roll_injury(state, DUNGEON_DEFEAT_INJURY_CHANCE);
            state.activity = Activity::Idle;
            state.push_log(LOG_DUNGEON_EXIT, "Defeated in the dungeon.");
            false
        }
        CombatOutcome::Victory => {
            let boss = run.mode == DungeonMode::Boss;
            let d = f64::from(encounter.difficulty);
            let boss_xp = if boss { 35.0 } else { 0.0 };
            let xp = d.mul_add(7.0, 12.0 + boss_xp) * state.modifiers().global_xp_mult;
            state.add_xp(SkillId::Combat, xp);
            let loot = award_loot(state, encounter.difficulty, boss, 1.0);
            run.feed.push(format!("Defeated {}.", encounter.enemy_name));
            run.feed.push(format!("Loot: {}.", loot.describe()));
            state.push_log(
                LOG_COMBAT_WON,
                format!("Won fight: +{} combat XP, +{} gold.", xp.floor(), loot.gold),
            );
            if boss {
                state.records.dungeons_completed += 1;
                state.activity = Activity::Idle;
                log::info!("dungeon cleared in {} steps", run.steps);
                state.push_log(LOG_DUNGEON_COMPLETE, "Dungeon cleared!");
                return false;
            }
            run.mode = DungeonMode::Explore;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn reachable(grid: &DungeonGrid) -> TileBitmap {
        let mut seen = TileBitmap::with_len(grid.tiles.len());
        let mut queue = VecDeque::from([grid.start]);
        seen.insert(grid.index(grid.start));
        while let Some(pos) = queue.pop_front() {
            for dir in Direction::ALL {
                if let Some(next) = dir.step(pos, grid.width, grid.height)
                    && grid.tile(next).is_walkable()
                    && seen.insert(grid.index(next))
                {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    #[test]
    fn every_floor_tile_is_connected_to_start() {
        for seed in 0..64_u32 {
            let grid = generate_dungeon(seed.wrapping_mul(2_654_435_761), DUNGEON_WIDTH, DUNGEON_HEIGHT);
            let seen = reachable(&grid);
            let walkable = grid.tiles.iter().filter(|t| t.is_walkable()).count();
            assert_eq!(seen.count(), walkable, "seed {seed}");
            assert!(seen.contains(grid.index(grid.boss)));
            assert_eq!(grid.tile(grid.boss), Tile::Boss);
            assert_ne!(grid.start, grid.boss);
        }
    }

    #[test]
    fn cramped_grid_falls_back_to_one_room_with_distinct_ends() {
        for seed in [0_u32, 9, 0xDEAD_BEEF] {
            let grid = generate_dungeon(seed, 6, 6);
            assert_eq!(grid.start, Position::new(2, 2));
            assert_eq!(grid.boss, Position::new(3, 3));
            assert_eq!(grid.tile(grid.start), Tile::Floor);
            assert_eq!(grid.tile(grid.boss), Tile::Boss);
            let seen = reachable(&grid);
            assert!(seen.contains(grid.index(grid.boss)));
            assert_eq!(grid.tiles.iter().filter(|t| t.is_walkable()).count(), 4);
        }
    }

    #[test]
    fn border_stays_solid() {
        let grid = generate_dungeon(31337, DUNGEON_WIDTH, DUNGEON_HEIGHT);
        for x in 0..grid.width {
            assert_eq!(grid.tile(Position::new(x, 0)), Tile::Wall);
            assert_eq!(grid.tile(Position::new(x, grid.height - 1)), Tile::Wall);
        }
        for y in 0..grid.height {
            assert_eq!(grid.tile(Position::new(0, y)), Tile::Wall);
            assert_eq!(grid.tile(Position::new(grid.width - 1, y)), Tile::Wall);
        }
    }

    #[test]
    fn generation_is_pure() {
        assert_eq!(
            generate_dungeon(5, DUNGEON_WIDTH, DUNGEON_HEIGHT),
            generate_dungeon(5, DUNGEON_WIDTH, DUNGEON_HEIGHT)
        );
    }

    #[test]
    fn bitmap_tracks_fresh_inserts() {
        let mut bits = TileBitmap::with_len(100);
        assert!(bits.insert(70));
        assert!(!bits.insert(70));
        assert!(bits.contains(70));
        assert!(!bits.contains(71));
        assert_eq!(bits.count(), 1);
    }

    #[test]
    fn movement_respects_walls_and_mode() {
        let catalog = Catalog::builtin().unwrap();
        let mut state = PlayerState::new(&catalog, 11, 0.0);
        assert!(start(&mut state, &catalog));
        assert!(!start(&mut state, &catalog));
        let run = state.dungeon.as_ref().unwrap();
        let blocked = Direction::ALL.into_iter().find(|dir| {
            dir.step(run.player, run.grid.width, run.grid.height)
                .is_none_or(|pos| !run.grid.tile(pos).is_walkable())
        });
        if let Some(dir) = blocked {
            let before = state.dungeon.as_ref().unwrap().steps;
            assert!(!move_player(&mut state, &catalog, dir));
            assert_eq!(state.dungeon.as_ref().unwrap().steps, before);
        }

        state.dungeon.as_mut().unwrap().mode = DungeonMode::Encounter;
        for dir in Direction::ALL {
            assert!(!move_player(&mut state, &catalog, dir));
        }
        assert!(exit(&mut state));
        assert_eq!(state.activity, Activity::Idle);
        assert!(!exit(&mut state));
    }

    #[test]
    fn stepping_on_boss_tile_starts_boss_fight() {
        let catalog = Catalog::builtin().unwrap();
        let mut state = PlayerState::new(&catalog, 11, 0.0);
        assert!(start(&mut state, &catalog));
        let run = state.dungeon.as_mut().unwrap();
        let (boss, width, height) = (run.grid.boss, run.grid.width, run.grid.height);
        let (from, dir) = Direction::ALL
            .into_iter()
            .find_map(|dir| {
                Direction::ALL
                    .iter()
                    .filter_map(|back| back.step(boss, width, height))
                    .find(|from| {
                        run.grid.tile(*from) == Tile::Floor
                            && dir.step(*from, width, height) == Some(boss)
                    })
                    .map(|from| (from, dir))
            })
            .unwrap();
        run.player = from;
        assert!(move_player(&mut state, &catalog, dir));
        let run = state.dungeon.as_ref().unwrap();
        assert_eq!(run.mode, DungeonMode::Boss);
        assert!(run.encounter.as_ref().is_some_and(|enc| enc.boss));
    }

    #[test]
    fn direction_parses_aliases() {
        assert_eq!("up".parse::<Direction>(), Ok(Direction::North));
        assert_eq!("w".parse::<Direction>(), Ok(Direction::West));
        assert!("sideways".parse::<Direction>().is_err());
        for direction in Direction::ALL {
            let (dx, dy) = direction.delta();
            assert_eq!(Direction::from_delta(dx, dy), Some(direction));
        }
        assert_eq!(Direction::from_delta(1, 1), None);
    }
}
