use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;

use frontier_game::{
    Action, BuiltinCatalog, Catalog, GameEngine, HostConfig, PlayerState, SAVE_VERSION,
    STORAGE_KEY, SaveError, SaveStorage, SkillId, apply_action, decode_save, encode_save, tick,
};

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
fn mid_expedition_save_resumes_identically() {
    let catalog = Catalog::builtin().unwrap();
    let mut live = PlayerState::new(&catalog, 314, 0.0);
    assert!(apply_action(
        &mut live,
        &catalog,
        &Action::StartExpedition { risk: 3 }
    ));
    for _ in 0..25 {
        tick(&mut live, &catalog, 1.0);
    }

    let document = encode_save(&live).unwrap();
    let mut restored = decode_save(&document).unwrap();
    assert_eq!(restored, live);

    for _ in 0..40 {
        tick(&mut live, &catalog, 1.0);
        tick(&mut restored, &catalog, 1.0);
    }
    assert_eq!(restored, live);
}

#[test]
fn dungeon_state_survives_a_roundtrip() {
    let catalog = Catalog::builtin().unwrap();
    let mut state = PlayerState::new(&catalog, 2718, 0.0);
    assert!(apply_action(&mut state, &catalog, &Action::StartDungeon));
    for (dx, dy) in [(1, 0), (0, 1), (1, 0), (0, 1)] {
        apply_action(&mut state, &catalog, &Action::MoveDungeon { dx, dy });
        tick(&mut state, &catalog, 0.5);
    }
    let restored = decode_save(&encode_save(&state).unwrap()).unwrap();
    assert_eq!(restored.dungeon, state.dungeon);
}

#[test]
fn saves_from_other_versions_are_discarded_on_load() {
    let storage = MemoryStorage::default();
    let engine = GameEngine::new(BuiltinCatalog, storage.clone());
    let catalog = Catalog::builtin().unwrap();
    let mut old = PlayerState::new(&catalog, 55, 0.0);
    old.skills.insert(SkillId::Mining, 5_000.0);
    let mut value = serde_json::to_value(&old).unwrap();
    value["version"] = serde_json::json!(SAVE_VERSION + 1);
    storage.write(STORAGE_KEY, &value.to_string()).unwrap();

    assert!(matches!(
        decode_save(&value.to_string()),
        Err(SaveError::VersionMismatch { .. })
    ));
    let session = engine.load_session(56, 0.0).unwrap();
    assert_eq!(session.state().seed, 56);
    assert!(session.state().skill_xp(SkillId::Mining).abs() < f64::EPSILON);
}

#[test]
fn custom_storage_key_is_respected() {
    let storage = MemoryStorage::default();
    let config = HostConfig {
        storage_key: "slot-two".into(),
        ..HostConfig::default()
    };
    let engine = GameEngine::with_config(BuiltinCatalog, storage.clone(), config);
    let mut session = engine.new_session(8, 0.0).unwrap();
    session.advance_frame(0.2, 200.0);
    assert!(engine.save_session(&mut session).unwrap());
    assert!(storage.read("slot-two").unwrap().is_some());
    assert!(storage.read(STORAGE_KEY).unwrap().is_none());

    let reloaded = engine.load_session(1, 200.0).unwrap();
    assert_eq!(reloaded.state(), session.state());
    engine.delete_save().unwrap();
    assert!(storage.read("slot-two").unwrap().is_none());
}
