pub mod helpers;
pub mod fixtures;

pub use fixtures::{ScriptedRandom, SettlementHarness};
