//! Named QA scenarios run against the core through the host loop.

use anyhow::{Context, Result, ensure};
use frontier_game::actions::prestige_gain;
use frontier_game::dungeon::DungeonMode;
use frontier_game::{
    Action, Activity, BuildingId, Catalog, Direction, GameSession, HostConfig, LegacyUpgrade,
    Mulberry32, PlayerState, RouteChoice, SkillId, run_offline_progress, state_fingerprint, tick,
};
use std::sync::Arc;

/// One scenario body, run once per seed and iteration.
pub type ScenarioFn = fn(&Arc<Catalog>, u64) -> Result<()>;

#[derive(Debug, Clone, Copy)]
pub struct TestScenario {
    pub key: &'static str,
    pub name: &'static str,
    pub run: ScenarioFn,
}

const SCENARIOS: [TestScenario; 8] = [
    TestScenario {
        key: "smoke",
        name: "Smoke Test",
        run: smoke,
    },
    TestScenario {
        key: "woodcutting",
        name: "Woodcutting Through The Host Loop",
        run: woodcutting,
    },
    TestScenario {
        key: "crafting",
        name: "Campfire Crafting Cycle",
        run: crafting,
    },
    TestScenario {
        key: "expedition",
        name: "Expedition Run To Completion",
        run: expedition,
    },
    TestScenario {
        key: "dungeon",
        name: "Dungeon Exploration Walk",
        run: dungeon,
    },
    TestScenario {
        key: "offline-equivalence",
        name: "Offline Catch-up Equivalence",
        run: offline_equivalence,
    },
    TestScenario {
        key: "determinism",
        name: "Deterministic Replay",
        run: determinism,
    },
    TestScenario {
        key: "prestige",
        name: "Found A New Settlement",
        run: prestige,
    },
];

#[must_use]
pub fn get_scenario(key: &str) -> Option<TestScenario> {
    let key = key.trim().to_lowercase();
    SCENARIOS.iter().find(|scenario| scenario.key == key).copied()
}

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    SCENARIOS
        .iter()
        .map(|scenario| (scenario.key, scenario.name))
        .collect()
}

// Helpers ------------------------------------------------------------------

fn new_session(catalog: &Arc<Catalog>, seed: u64) -> GameSession {
    let state = PlayerState::new(catalog, seed, 0.0);
    GameSession::new(state, Arc::clone(catalog), HostConfig::default())
}

/// Feed sub-step sized frames until exactly `steps` fixed steps have run.
fn run_steps(session: &mut GameSession, steps: u32) {
    let frame = session.config().sub_step_sec;
    let mut done = 0;
    let mut now_ms = session.state().meta.last_tick_at_ms;
    while done < steps {
        now_ms += frame * 1000.0;
        done += session.advance_frame(frame, now_ms).steps;
    }
}

fn ensure_ledger_bounded(state: &PlayerState) -> Result<()> {
    let cap = state.storage_cap();
    for (id, amount) in state.resources.iter() {
        ensure!(
            (0.0..=cap).contains(&amount),
            "resource {id} = {amount} outside [0, {cap}]"
        );
    }
    Ok(())
}

fn ensure_close(label: &str, actual: f64, expected: f64) -> Result<()> {
    ensure!(
        (actual - expected).abs() < 1e-6,
        "{label}: expected {expected}, got {actual}"
    );
    Ok(())
}

fn apply(session: &mut GameSession, action: &Action) -> Result<()> {
    ensure!(session.apply(action), "action rejected: {action:?}");
    Ok(())
}

// Scenarios ----------------------------------------------------------------

fn smoke(catalog: &Arc<Catalog>, seed: u64) -> Result<()> {
    let mut session = new_session(catalog, seed);
    run_steps(&mut session, 100);
    ensure_close("sim time", session.state().meta.sim_time_ms, 10_000.0)?;
    ensure!(session.state().activity == Activity::Idle, "fresh game should idle");
    ensure_ledger_bounded(session.state())?;
    state_fingerprint(session.state()).context("fingerprinting state")?;
    Ok(())
}

fn woodcutting(catalog: &Arc<Catalog>, seed: u64) -> Result<()> {
    let mut session = new_session(catalog, seed);
    let rates = catalog
        .gather_rates(SkillId::Woodcutting)
        .context("catalog has no woodcutting rates")?;
    let wood_before = session.state().resources.get("wood");
    apply(
        &mut session,
        &Action::StartGather {
            skill: SkillId::Woodcutting,
        },
    )?;
    run_steps(&mut session, 300);

    let mods = session.state().modifiers();
    let expected = rates
        .base_yield_per_second
        .mul_add(mods.gather_yield_mult * 30.0, wood_before);
    ensure_close("wood", session.state().resources.get("wood"), expected)?;
    ensure_close(
        "woodcutting xp",
        session.state().skill_xp(SkillId::Woodcutting),
        rates.base_xp_per_second * mods.gather_xp_mult * 30.0,
    )?;
    ensure_ledger_bounded(session.state())
}

fn crafting(catalog: &Arc<Catalog>, seed: u64) -> Result<()> {
    let mut session = new_session(catalog, seed);
    session.with_state_mut(|state| {
        let cap = state.storage_cap();
        state.resources.set("wood", 60.0, cap);
        state.resources.set("meat", 20.0, cap);
    });
    apply(
        &mut session,
        &Action::UpgradeBuilding {
            building: BuildingId::Campfire,
        },
    )?;
    let meat_before = session.state().resources.get("meat");
    let rations_before = session.state().resources.get("rations");
    apply(
        &mut session,
        &Action::StartCraft {
            recipe: "cookRations".into(),
        },
    )?;
    run_steps(&mut session, 600);

    let state = session.state();
    let made = state.resources.get("rations") - rations_before;
    let spent = meat_before - state.resources.get("meat");
    ensure!(made > 0.0, "no rations were cooked");
    ensure!(
        spent >= made * 2.0 && spent <= made.mul_add(2.0, 2.0),
        "spent {spent} meat for {made} rations"
    );
    ensure!(state.skill_xp(SkillId::Cooking) > 0.0, "cooking earned no xp");
    ensure_ledger_bounded(state)
}

fn expedition(catalog: &Arc<Catalog>, seed: u64) -> Result<()> {
    let mut session = new_session(catalog, seed);
    let risk = u32::try_from(seed % 3).unwrap_or(0) + 1;
    apply(&mut session, &Action::StartExpedition { risk })?;
    let room_count = session
        .state()
        .expedition
        .as_ref()
        .map(|run| run.room_count)
        .context("expedition did not start")?;
    ensure!(room_count == 8 + 2 * risk, "risk {risk} produced {room_count} rooms");

    for _ in 0..3_600 {
        if session
            .state()
            .expedition
            .as_ref()
            .is_some_and(|run| run.pending_choice)
        {
            apply(
                &mut session,
                &Action::ChooseExpeditionOption {
                    choice: RouteChoice::Safe,
                },
            )?;
        }
        run_steps(&mut session, 10);
        let state = session.state();
        ensure!(
            state.expedition.is_some() == (state.activity == Activity::Expedition),
            "expedition state and activity disagree"
        );
        ensure_ledger_bounded(state)?;
        if state.activity == Activity::Idle {
            return Ok(());
        }
    }
    anyhow::bail!("expedition still running after an hour of simulated time")
}

fn dungeon(catalog: &Arc<Catalog>, seed: u64) -> Result<()> {
    let mut session = new_session(catalog, seed);
    apply(&mut session, &Action::StartDungeon)?;
    let mut walker = Mulberry32::new(u32::try_from(seed & 0xFFFF_FFFF).unwrap_or(0));

    for _ in 0..2_000 {
        let Some(run) = session.state().dungeon.as_ref() else {
            break;
        };
        ensure!(
            run.grid.tile(run.player).is_walkable(),
            "player stands inside a wall"
        );
        ensure!(
            run.encounter.is_some() == (run.mode != DungeonMode::Explore),
            "dungeon mode {:?} disagrees with encounter",
            run.mode
        );
        if run.mode == DungeonMode::Explore {
            let direction = walker
                .pick(&Direction::ALL)
                .copied()
                .unwrap_or(Direction::North);
            let (dx, dy) = direction.delta();
            session.apply(&Action::MoveDungeon { dx, dy });
        }
        run_steps(&mut session, 5);
        ensure_ledger_bounded(session.state())?;
    }
    Ok(())
}

fn offline_equivalence(catalog: &Arc<Catalog>, seed: u64) -> Result<()> {
    let mut offline = PlayerState::new(catalog, seed, 0.0);
    let skill = match seed % 3 {
        0 => SkillId::Woodcutting,
        1 => SkillId::Mining,
        _ => SkillId::Scavenging,
    };
    ensure!(
        frontier_game::apply_action(&mut offline, catalog, &Action::StartGather { skill }),
        "could not start {skill}"
    );
    let mut ticked = offline.clone();

    run_offline_progress(&mut offline, catalog, 600.0);
    for _ in 0..600 {
        tick(&mut ticked, catalog, 1.0);
    }
    ensure!(
        state_fingerprint(&offline)? == state_fingerprint(&ticked)?,
        "offline catch-up diverged from one-second ticks for {skill}"
    );
    Ok(())
}

fn determinism(catalog: &Arc<Catalog>, seed: u64) -> Result<()> {
    let script = |session: &mut GameSession| -> Result<u64> {
        apply(
            session,
            &Action::StartGather {
                skill: SkillId::Scavenging,
            },
        )?;
        run_steps(session, 200);
        session.apply(&Action::StartExpedition { risk: 2 });
        for _ in 0..120 {
            session.apply(&Action::ChooseExpeditionOption {
                choice: RouteChoice::Risky,
            });
            run_steps(session, 10);
        }
        Ok(state_fingerprint(session.state())?)
    };
    let first = script(&mut new_session(catalog, seed))?;
    let second = script(&mut new_session(catalog, seed))?;
    ensure!(first == second, "replay fingerprints differ: {first:#x} vs {second:#x}");
    Ok(())
}

fn prestige(catalog: &Arc<Catalog>, seed: u64) -> Result<()> {
    let mut session = new_session(catalog, seed);
    ensure!(
        !session.apply(&Action::FoundNewSettlement),
        "reset allowed without a town hall"
    );
    session.with_state_mut(|state| {
        state.buildings.insert(BuildingId::TownHall, 1);
        state.records.bosses_defeated = 2;
        state.skills.insert(SkillId::Mining, 50_000.0);
    });
    let gain = prestige_gain(session.state()).context("reset should be allowed")?;
    let rng_before = session.state().rng.clone();
    apply(&mut session, &Action::FoundNewSettlement)?;

    let state = session.state();
    ensure!(state.legacy.points == gain, "expected {gain} legacy points");
    ensure!(state.legacy.settlements_founded == 1, "settlement count not bumped");
    ensure!(state.rng == rng_before, "random streams were reseeded");
    ensure!(state.seed == seed, "seed changed across reset");
    ensure!(
        state.building_level(BuildingId::TownHall) == 0,
        "buildings survived the reset"
    );
    ensure!(
        state.skill_xp(SkillId::Mining).abs() < f64::EPSILON,
        "skills survived the reset"
    );

    apply(
        &mut session,
        &Action::BuyLegacyUpgrade {
            kind: LegacyUpgrade::Yield,
        },
    )?;
    ensure_close(
        "yield mult",
        session.state().legacy.global_yield_mult,
        1.05,
    )?;
    Ok(())
}
