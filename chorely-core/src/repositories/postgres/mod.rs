// src/repositories/postgres/mod.rs

pub mod settlement_store;
pub mod ledger;
pub mod day_records;
pub mod reward_catalog;
pub mod claims;
pub mod lucky_boxes;
pub mod effects;
pub mod backpack;
pub mod directory;

pub use settlement_store::{PgSettlementTx, PostgresSettlementStore};
pub use directory::{PostgresProductCatalog, PostgresUserDirectory};
