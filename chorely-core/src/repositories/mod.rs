// src/repositories/mod.rs

pub mod memory;
pub mod postgres;

pub use memory::{FailurePoint, MemoryDirectory, MemoryStore};
pub use postgres::{PostgresProductCatalog, PostgresSettlementStore, PostgresUserDirectory};
