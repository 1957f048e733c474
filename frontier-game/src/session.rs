//! The single owner of a [`PlayerState`] while a host is running it.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::actions::{self, Action};
use crate::catalog::Catalog;
use crate::config::HostConfig;
use crate::constants::LOG_OFFLINE;
use crate::numbers::floor_f64_to_u32;
use crate::sim::{run_offline_progress_with, tick};
use crate::state::PlayerState;
use crate::store::{SaveError, SaveStorage, encode_save};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to encode save: {0}")]
    Encode(#[from] SaveError),
    #[error("storage backend failed: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

type Listener = Box<dyn FnMut(&PlayerState)>;

/// What one host frame did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub steps: u32,
    pub simulated_sec: f64,
}

/// Wraps the state with the host loop's accumulator, dirty flag, and listeners.
pub struct GameSession {
    state: PlayerState,
    catalog: Arc<Catalog>,
    config: HostConfig,
    accumulator_sec: f64,
    since_save_sec: f64,
    dirty: bool,
    listeners: Vec<Listener>,
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameSession")
            .field("seed", &self.state.seed)
            .field("activity", &self.state.activity.as_str())
            .field("dirty", &self.dirty)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl GameSession {
    #[must_use]
    pub fn new(state: PlayerState, catalog: Arc<Catalog>, config: HostConfig) -> Self {
        Self {
            state,
            catalog,
            config,
            accumulator_sec: 0.0,
            since_save_sec: 0.0,
            dirty: false,
            listeners: Vec::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &PlayerState {
        &self.state
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn into_state(self) -> PlayerState {
        self.state
    }

    /// Mutate the state directly, e.g. from a debug console.
    pub fn with_state_mut<F>(&mut self, f: F)
    where
        F: FnOnce(&mut PlayerState),
    {
        f(&mut self.state);
        self.mark_changed();
    }

    /// Register a callback that sees the state after every change.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&PlayerState) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn mark_changed(&mut self) {
        self.dirty = true;
        for listener in &mut self.listeners {
            listener(&self.state);
        }
    }

    /// Run one user intent.
    pub fn apply(&mut self, action: &Action) -> bool {
        let applied = actions::apply(&mut self.state, &self.catalog, action);
        if applied {
            self.mark_changed();
        } else {
            log::trace!("action rejected: {action:?}");
        }
        applied
    }

    /// Feed one host frame of `frame_dt_sec` into the fixed-step accumulator.
    pub fn advance_frame(&mut self, frame_dt_sec: f64, now_ms: f64) -> FrameReport {
        let dt = if frame_dt_sec.is_nan() {
            0.0
        } else {
            frame_dt_sec.clamp(0.0, self.config.max_frame_delta_sec)
        };
        self.accumulator_sec += dt;
        self.since_save_sec += dt;

        let step = self.config.sub_step_sec;
        let steps =
            floor_f64_to_u32(self.accumulator_sec / step).min(self.config.max_steps_per_frame);
        for _ in 0..steps {
            tick(&mut self.state, &self.catalog, step);
        }
        // Backlog beyond the per-frame step cap is dropped.
        self.accumulator_sec = (self.accumulator_sec - f64::from(steps) * step).min(step);
        self.state.meta.last_tick_at_ms = now_ms;

        if steps > 0 {
            self.mark_changed();
        }
        FrameReport {
            steps,
            simulated_sec: f64::from(steps) * step,
        }
    }

    /// Catch up on the time since the last recorded tick. Returns the seconds simulated.
    pub fn resume(&mut self, now_ms: f64) -> f64 {
        let elapsed_sec = ((now_ms - self.state.meta.last_tick_at_ms) / 1000.0).max(0.0);
        let simulated = run_offline_progress_with(
            &mut self.state,
            &self.catalog,
            elapsed_sec,
            self.config.offline_cap_sec,
            self.config.offline_step_sec,
        );
        self.state.meta.last_tick_at_ms = now_ms;
        if simulated >= self.config.offline_log_threshold_sec {
            log::info!("offline progress: simulated {simulated}s");
            self.state.push_log(
                LOG_OFFLINE,
                format!("Offline progress: simulated {}s.", simulated.floor()),
            );
        }
        if simulated > 0.0 {
            self.mark_changed();
        }
        simulated
    }

    /// Whether enough host time has passed for an autosave.
    #[must_use]
    pub fn autosave_due(&self) -> bool {
        self.dirty && self.since_save_sec >= self.config.autosave_interval_sec
    }

    /// Persist when dirty. Returns whether anything was written.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the storage backend fails.
    pub fn save<S: SaveStorage>(&mut self, storage: &S) -> Result<bool, SessionError> {
        if !self.dirty {
            return Ok(false);
        }
        let document = encode_save(&self.state)?;
        storage
            .write(&self.config.storage_key, &document)
            .map_err(|err| SessionError::Storage(Box::new(err)))?;
        self.dirty = false;
        self.since_save_sec = 0.0;
        log::debug!("saved {} bytes", document.len());
        Ok(true)
    }

    /// Save only once the autosave interval has elapsed.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the storage backend fails.
    pub fn autosave<S: SaveStorage>(&mut self, storage: &S) -> Result<bool, SessionError> {
        if self.autosave_due() {
            self.save(storage)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SkillId;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Default)]
    struct MemoryStorage {
        docs: RefCell<HashMap<String, String>>,
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

    fn session() -> GameSession {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let state = PlayerState::new(&catalog, 3, 0.0);
        GameSession::new(state, catalog, HostConfig::default())
    }

    #[test]
    fn frames_substep_and_carry_remainder() {
        let mut session = session();
        let report = session.advance_frame(0.25, 250.0);
        assert_eq!(report.steps, 2);
        let report = session.advance_frame(0.1, 300.0);
        assert_eq!(report.steps, 1);
        assert!((session.state().meta.sim_time_ms - 300.0).abs() < 1e-6);
        assert!((session.state().meta.last_tick_at_ms - 300.0).abs() < f64::EPSILON);

        let report = session.advance_frame(30.0, 30_300.0);
        assert_eq!(report.steps, 5);
    }

    #[test]
    fn listeners_fire_on_changes_only() {
        let mut session = session();
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        session.subscribe(move |_| seen.set(seen.get() + 1));
        assert!(!session.apply(&Action::StartCraft {
            recipe: "noSuchRecipe".into()
        }));
        assert_eq!(calls.get(), 0);
        assert!(session.apply(&Action::StartGather {
            skill: SkillId::Woodcutting
        }));
        assert_eq!(calls.get(), 1);
        session.advance_frame(0.01, 10.0);
        assert_eq!(calls.get(), 1);
        session.advance_frame(0.1, 110.0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn saves_only_when_dirty_and_due() {
        let storage = MemoryStorage::default();
        let mut session = session();
        assert!(!session.save(&storage).unwrap());
        session.advance_frame(0.5, 500.0);
        assert!(session.is_dirty());
        assert!(!session.autosave(&storage).unwrap());
        for i in 0..10 {
            session.advance_frame(0.5, 1_000.0 + f64::from(i) * 500.0);
        }
        assert!(session.autosave(&storage).unwrap());
        assert!(!session.is_dirty());
        assert!(storage.read("frontier-idle.save.v1").unwrap().is_some());
    }

    #[test]
    fn resume_logs_long_absences() {
        let mut session = session();
        let simulated = session.resume(5_000.0);
        assert!((simulated - 5.0).abs() < f64::EPSILON);
        assert!(!session.state().log.contains_key(LOG_OFFLINE));
        let simulated = session.resume(65_000.0);
        assert!((simulated - 60.0).abs() < f64::EPSILON);
        assert!(session.state().log.contains_key(LOG_OFFLINE));
        assert!(session.resume(65_500.0).abs() < f64::EPSILON);
    }
}
