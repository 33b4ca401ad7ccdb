// File: chorely-core/src/repositories/postgres/ledger.rs

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;
use chrono::Utc;

use chorely_common::error::Error;
use chorely_common::models::{PointBalance, PointLedgerEntry, PointType};
use chorely_common::traits::LedgerTx;

use super::settlement_store::PgSettlementTx;

fn ledger_entry_from_row(row: &PgRow) -> Result<PointLedgerEntry, Error> {
    let point_type: String = row.try_get("point_type")?;
    let reason: String = row.try_get("reason")?;
    Ok(PointLedgerEntry {
        entry_id: row.try_get("entry_id")?,
        user_id: row.try_get("user_id")?,
        point_type: point_type.parse()?,
        delta: row.try_get("delta")?,
        balance_after: row.try_get("balance_after")?,
        reason: reason.parse()?,
        related_ref: row.try_get("related_ref")?,
        counterparty_id: row.try_get("counterparty_id")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl LedgerTx for PgSettlementTx {
    async fn lock_balance(&mut self, user_id: Uuid, point_type: PointType) -> Result<i64, Error> {
        sqlx::query(
            r#"
            INSERT INTO point_balances (user_id, point_type, balance, updated_at)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (user_id, point_type) DO NOTHING
            "#,
        )
            .bind(user_id)
            .bind(point_type.as_str())
            .bind(Utc::now())
            .execute(&mut *self.tx)
            .await?;

        let row = sqlx::query(
            r#"
            SELECT balance
            FROM point_balances
            WHERE user_id = $1 AND point_type = $2
            FOR UPDATE
            "#,
        )
            .bind(user_id)
            .bind(point_type.as_str())
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(row.try_get("balance")?)
    }

    async fn write_balance(&mut self, user_id: Uuid, point_type: PointType, balance: i64) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE point_balances
            SET balance = $3, updated_at = $4
            WHERE user_id = $1 AND point_type = $2
            "#,
        )
            .bind(user_id)
            .bind(point_type.as_str())
            .bind(balance)
            .bind(Utc::now())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn append_ledger_entry(&mut self, entry: &PointLedgerEntry) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO point_ledger (
                entry_id, user_id, point_type, delta, balance_after,
                reason, related_ref, counterparty_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
            .bind(entry.entry_id)
            .bind(entry.user_id)
            .bind(entry.point_type.as_str())
            .bind(entry.delta)
            .bind(entry.balance_after)
            .bind(entry.reason.as_str())
            .bind(entry.related_ref)
            .bind(entry.counterparty_id)
            .bind(entry.created_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_balances(&mut self, user_id: Uuid) -> Result<Vec<PointBalance>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, point_type, balance, updated_at
            FROM point_balances
            WHERE user_id = $1
            ORDER BY point_type
            "#,
        )
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let point_type: String = row.try_get("point_type")?;
            out.push(PointBalance {
                user_id: row.try_get("user_id")?,
                point_type: point_type.parse()?,
                balance: row.try_get("balance")?,
                updated_at: row.try_get("updated_at")?,
            });
        }
        Ok(out)
    }

    async fn list_ledger_entries(
        &mut self,
        user_id: Uuid,
        point_type: Option<PointType>,
        limit: i64,
    ) -> Result<Vec<PointLedgerEntry>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT entry_id, user_id, point_type, delta, balance_after,
                   reason, related_ref, counterparty_id, created_at
            FROM point_ledger
            WHERE user_id = $1
              AND ($2::TEXT IS NULL OR point_type = $2)
            ORDER BY entry_seq DESC
            LIMIT $3
            "#,
        )
            .bind(user_id)
            .bind(point_type.map(|pt| pt.as_str()))
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter().map(ledger_entry_from_row).collect()
    }
}
