//! Offline catch-up replay against a save kept on disk.

use anyhow::{Context, Result};
use frontier_game::{
    Action, BuiltinCatalog, GameEngine, PlayerState, SaveStorage, SkillId, decode_save,
    state_fingerprint,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::FileStorage;

#[derive(Debug, Clone, Serialize)]
pub struct OfflineReplay {
    pub seed: u64,
    pub save_path: PathBuf,
    pub created_save: bool,
    pub requested_sec: f64,
    pub simulated_sec: f64,
    pub activity: String,
    pub resource_deltas: BTreeMap<String, f64>,
    pub xp_deltas: BTreeMap<String, f64>,
    pub fingerprint: u64,
}

/// Load the save in `dir` (creating a woodcutting save for `seed` when none
/// exists), pretend `offline_sec` passed, catch up, and write it back.
pub fn replay_offline(dir: &Path, seed: u64, offline_sec: f64) -> Result<OfflineReplay> {
    let storage = FileStorage::new(dir);
    let engine = GameEngine::new(BuiltinCatalog, storage.clone());
    let key = engine.config().storage_key.clone();

    let existing = storage
        .read(&key)
        .with_context(|| format!("failed to read {}", storage.path_for(&key).display()))?
        .and_then(|document| match decode_save(&document) {
            Ok(state) => Some(state),
            Err(err) => {
                log::warn!("ignoring unusable save: {err}");
                None
            }
        });
    let created_save = existing.is_none();
    let baseline = if let Some(state) = existing {
        state
    } else {
        let mut session = engine.new_session(seed, 0.0)?;
        session.apply(&Action::StartGather {
            skill: SkillId::Woodcutting,
        });
        engine
            .save_session(&mut session)
            .context("failed to write the initial save")?;
        log::info!("created a fresh save for seed {seed}");
        session.into_state()
    };

    let now_ms = offline_sec.max(0.0).mul_add(1000.0, baseline.meta.last_tick_at_ms);
    let mut session = engine.load_session(seed, now_ms)?;
    engine
        .save_session(&mut session)
        .context("failed to write the caught-up save")?;

    let state = session.state();
    Ok(OfflineReplay {
        seed: state.seed,
        save_path: storage.path_for(&key),
        created_save,
        requested_sec: offline_sec,
        simulated_sec: (state.meta.sim_time_ms - baseline.meta.sim_time_ms) / 1000.0,
        activity: state.activity.as_str().to_string(),
        resource_deltas: resource_deltas(&baseline, state),
        xp_deltas: xp_deltas(&baseline, state),
        fingerprint: state_fingerprint(state)?,
    })
}

fn resource_deltas(before: &PlayerState, after: &PlayerState) -> BTreeMap<String, f64> {
    let ids: BTreeSet<&str> = before
        .resources
        .iter()
        .chain(after.resources.iter())
        .map(|(id, _)| id.as_str())
        .collect();
    ids.into_iter()
        .filter_map(|id| {
            let delta = after.resources.get(id) - before.resources.get(id);
            (delta.abs() > f64::EPSILON).then(|| (id.to_string(), delta))
        })
        .collect()
}

fn xp_deltas(before: &PlayerState, after: &PlayerState) -> BTreeMap<String, f64> {
    SkillId::ALL
        .into_iter()
        .filter_map(|skill| {
            let delta = after.skill_xp(skill) - before.skill_xp(skill);
            (delta > 0.0).then(|| (skill.to_string(), delta))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_offline_time_against_a_fresh_save() {
        let dir = std::env::temp_dir().join(format!("frontier-offline-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let first = replay_offline(&dir, 21, 60.0).unwrap();
        assert!(first.created_save);
        assert!((first.simulated_sec - 60.0).abs() < 1e-6);
        assert!(first.resource_deltas["wood"] > 0.0);
        assert!(first.xp_deltas["woodcutting"] > 0.0);
        assert_eq!(first.activity, "gather");

        let second = replay_offline(&dir, 99, 30.0).unwrap();
        assert!(!second.created_save);
        assert_eq!(second.seed, 21);
        assert!((second.simulated_sec - 30.0).abs() < 1e-6);

        let _ = std::fs::remove_dir_all(dir);
    }
}
