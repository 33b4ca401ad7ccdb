// File: chorely-core/src/repositories/postgres/settlement_store.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};

use chorely_common::error::Error;
use chorely_common::traits::{SettlementStore, SettlementTx};

/// Postgres-backed settlement store. Each `begin` opens a real database
/// transaction; the per-table trait impls live next to this file.
#[derive(Clone)]
pub struct PostgresSettlementStore {
    pub pool: Pool<Postgres>,
}

impl PostgresSettlementStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettlementStore for PostgresSettlementStore {
    async fn begin(&self) -> Result<Box<dyn SettlementTx>, Error> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSettlementTx { tx }))
    }
}

/// An open transaction. Dropping it without `commit` rolls back.
pub struct PgSettlementTx {
    pub(super) tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SettlementTx for PgSettlementTx {
    async fn commit(self: Box<Self>) -> Result<(), Error> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// Maps a unique-constraint violation onto `Error::Conflict`.
pub(super) fn conflict_on_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> Error {
    let err = Error::from(err);
    if err.is_unique_violation() {
        Error::Conflict(what())
    } else {
        err
    }
}
