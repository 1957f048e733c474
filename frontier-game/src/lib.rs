//! Frontier Idle Game Engine
//!
//! Deterministic, platform-agnostic simulation for the Frontier Idle settlement game.
//! Hosts drive it through a [`GameSession`] and supply storage through [`SaveStorage`].

pub mod actions;
pub mod catalog;
pub mod combat;
pub mod config;
pub mod constants;
pub mod dungeon;
pub mod expedition;
pub mod ledger;
pub mod modifiers;
pub mod numbers;
pub mod progression;
pub mod rng;
pub mod session;
pub mod sim;
pub mod state;
pub mod store;

use std::hash::Hasher;
use std::sync::Arc;

use twox_hash::XxHash64;

// Re-export commonly used types
pub use actions::{Action, LegacyUpgrade, apply as apply_action};
pub use catalog::{
    BuildingId, Catalog, CatalogError, Cost, EquipmentSlot, PotionKind, RecipeId, ResourceId,
    SkillId,
};
pub use combat::{CombatEncounter, CombatOutcome, Loot};
pub use config::{ConfigError, HostConfig};
pub use dungeon::{Direction, DungeonGrid, DungeonMode, DungeonRun, Tile, generate_dungeon};
pub use expedition::{ExpeditionRun, Room, RoomKind, RouteChoice, room_count_for};
pub use ledger::ResourceLedger;
pub use modifiers::{Modifiers, compute_modifiers};
pub use progression::{LevelProgress, level_from_xp, level_progress, xp_for_level};
pub use rng::{Mulberry32, RngDomain, RngStreams};
pub use session::{FrameReport, GameSession, SessionError};
pub use sim::{run_offline_progress, tick};
pub use state::{Activity, PlayerState, SAVE_VERSION};
pub use store::{STORAGE_KEY, SaveError, SaveStorage, decode_save, encode_save};

/// Where the static game catalog comes from.
pub trait CatalogSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load and validate the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or fails validation.
    fn load_catalog(&self) -> Result<Catalog, Self::Error>;
}

/// The catalog compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

impl CatalogSource for BuiltinCatalog {
    type Error = CatalogError;

    fn load_catalog(&self) -> Result<Catalog, Self::Error> {
        Catalog::builtin()
    }
}

/// Main game engine for opening and persisting sessions
pub struct GameEngine<C, S>
where
    C: CatalogSource,
    S: SaveStorage,
{
    catalog_source: C,
    storage: S,
    config: HostConfig,
}

impl<C, S> GameEngine<C, S>
where
    C: CatalogSource,
    S: SaveStorage,
{
    /// Create an engine with the default host configuration
    pub fn new(catalog_source: C, storage: S) -> Self {
        Self::with_config(catalog_source, storage, HostConfig::default())
    }

    pub const fn with_config(catalog_source: C, storage: S, config: HostConfig) -> Self {
        Self {
            catalog_source,
            storage,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Start a brand new settlement.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    pub fn new_session(&self, seed: u64, now_ms: f64) -> Result<GameSession, C::Error> {
        let catalog = Arc::new(self.catalog_source.load_catalog()?);
        let state = PlayerState::new(&catalog, seed, now_ms);
        Ok(GameSession::new(state, catalog, self.config.clone()))
    }

    /// Open the saved settlement, or a fresh one seeded with `fallback_seed`
    /// when there is no usable save, then catch up on offline time.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or storage cannot be read.
    /// A save that fails to decode is discarded, not reported.
    pub fn load_session(&self, fallback_seed: u64, now_ms: f64) -> anyhow::Result<GameSession>
    where
        C::Error: Into<anyhow::Error>,
        S::Error: Into<anyhow::Error>,
    {
        let catalog = Arc::new(self.catalog_source.load_catalog().map_err(Into::into)?);
        let document = self
            .storage
            .read(&self.config.storage_key)
            .map_err(Into::into)?;
        let state = match document.as_deref().map(decode_save) {
            Some(Ok(state)) => state,
            Some(Err(err)) => {
                log::warn!("discarding unreadable save: {err}");
                PlayerState::new(&catalog, fallback_seed, now_ms)
            }
            None => PlayerState::new(&catalog, fallback_seed, now_ms),
        };
        let mut session = GameSession::new(state, catalog, self.config.clone());
        session.resume(now_ms);
        Ok(session)
    }

    /// Persist the session if it changed since the last save.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the storage backend fails.
    pub fn save_session(&self, session: &mut GameSession) -> Result<bool, SessionError> {
        session.save(&self.storage)
    }

    /// Remove the save slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend cannot delete the key.
    pub fn delete_save(&self) -> Result<(), S::Error> {
        self.storage.remove(&self.config.storage_key)
    }
}

/// Stable 64-bit digest of the full state, used to compare simulation runs.
///
/// # Errors
///
/// Returns an error if the state cannot be serialized.
pub fn state_fingerprint(state: &PlayerState) -> Result<u64, serde_json::Error> {
    let bytes = serde_json::to_vec(state)?;
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&bytes);
    Ok(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct MemoryStorage {
        docs: Rc<RefCell<HashMap<String, String>>>,
    }

    impl SaveStorage for MemoryStorage {
        type Error = Infallible;

        fn read(&self, key: &str) -> Result<Option<String>, Self::Error> {
            Ok(self.docs.borrow().get(key).cloned())
        }

        fn write(&self, key: &str, document: &str) -> Result<(), Self::Error> {
            self.docs
                .borrow_mut()
                .insert(key.to_string(), document.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<(), Self::Error> {
            self.docs.borrow_mut().remove(key);
            Ok(())
        }
    }

    #[test]
    fn engine_saves_and_resumes_with_offline_progress() {
        let storage = MemoryStorage::default();
        let engine = GameEngine::new(BuiltinCatalog, storage.clone());
        let mut session = engine.new_session(0xABCD, 0.0).unwrap();
        assert!(session.apply(&Action::StartGather {
            skill: SkillId::Woodcutting
        }));
        let wood_before = session.state().resources.get("wood");
        assert!(engine.save_session(&mut session).unwrap());
        assert!(!engine.save_session(&mut session).unwrap());

        let loaded = engine.load_session(1, 20_000.0).unwrap();
        assert_eq!(loaded.state().seed, 0xABCD);
        assert!(loaded.state().resources.get("wood") > wood_before);
        assert!(loaded.state().skill_xp(SkillId::Woodcutting) > 0.0);
        assert!((loaded.state().meta.last_tick_at_ms - 20_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_or_corrupt_saves_start_fresh() {
        let storage = MemoryStorage::default();
        let engine = GameEngine::new(BuiltinCatalog, storage.clone());
        let fresh = engine.load_session(42, 1_000.0).unwrap();
        assert_eq!(fresh.state().seed, 42);
        assert!((fresh.state().meta.sim_time_ms).abs() < f64::EPSILON);

        storage
            .write(STORAGE_KEY, r#"{"version": 999, "seed": 7}"#)
            .unwrap();
        let fallback = engine.load_session(43, 1_000.0).unwrap();
        assert_eq!(fallback.state().seed, 43);

        storage.write(STORAGE_KEY, "garbage").unwrap();
        assert_eq!(engine.load_session(44, 1_000.0).unwrap().state().seed, 44);

        engine.delete_save().unwrap();
        assert!(storage.read(STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn fingerprint_tracks_state_changes() {
        let engine = GameEngine::new(BuiltinCatalog, MemoryStorage::default());
        let a = engine.new_session(9, 0.0).unwrap();
        let mut b = engine.new_session(9, 0.0).unwrap();
        assert_eq!(
            state_fingerprint(a.state()).unwrap(),
            state_fingerprint(b.state()).unwrap()
        );
        b.advance_frame(0.5, 500.0);
        assert_ne!(
            state_fingerprint(a.state()).unwrap(),
            state_fingerprint(b.state()).unwrap()
        );
    }
}
