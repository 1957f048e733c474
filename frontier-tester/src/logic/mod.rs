pub mod offline;
pub mod reports;
pub mod scenarios;
pub mod seeds;
pub mod storage;
pub mod tester;

pub use offline::{OfflineReplay, replay_offline};
pub use scenarios::{TestScenario, get_scenario, list_scenarios};
pub use seeds::resolve_seed_inputs;
pub use storage::FileStorage;
pub use tester::*;
