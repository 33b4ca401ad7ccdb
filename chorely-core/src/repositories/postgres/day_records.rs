// File: chorely-core/src/repositories/postgres/day_records.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use chorely_common::error::Error;
use chorely_common::models::{DayRecord, StreakState};
use chorely_common::traits::DayRecordTx;

use super::settlement_store::PgSettlementTx;

fn day_record_from_row(row: &PgRow) -> Result<DayRecord, Error> {
    let label: String = row.try_get("label")?;
    let source: String = row.try_get("source")?;
    Ok(DayRecord {
        user_id: row.try_get("user_id")?,
        record_date: row.try_get("record_date")?,
        label: label.parse()?,
        source: source.parse()?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl DayRecordTx for PgSettlementTx {
    async fn insert_day_record_if_absent(&mut self, record: &DayRecord) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO day_records (user_id, record_date, label, source, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, record_date) DO NOTHING
            "#,
        )
            .bind(record.user_id)
            .bind(record.record_date)
            .bind(record.label.as_str())
            .bind(record.source.as_str())
            .bind(record.created_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn upsert_day_record(&mut self, record: &DayRecord) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO day_records (user_id, record_date, label, source, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, record_date) DO UPDATE
               SET label = EXCLUDED.label,
                   source = EXCLUDED.source,
                   created_at = EXCLUDED.created_at
            "#,
        )
            .bind(record.user_id)
            .bind(record.record_date)
            .bind(record.label.as_str())
            .bind(record.source.as_str())
            .bind(record.created_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn get_day_record(&mut self, user_id: Uuid, date: NaiveDate) -> Result<Option<DayRecord>, Error> {
        let row = sqlx::query(
            r#"
            SELECT user_id, record_date, label, source, created_at
            FROM day_records
            WHERE user_id = $1 AND record_date = $2
            "#,
        )
            .bind(user_id)
            .bind(date)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(day_record_from_row).transpose()
    }

    async fn delete_day_record(&mut self, user_id: Uuid, date: NaiveDate) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM day_records WHERE user_id = $1 AND record_date = $2")
            .bind(user_id)
            .bind(date)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_day_records(
        &mut self,
        user_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DayRecord>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, record_date, label, source, created_at
            FROM day_records
            WHERE user_id = $1
              AND ($2::DATE IS NULL OR record_date >= $2)
              AND ($3::DATE IS NULL OR record_date <= $3)
            ORDER BY record_date
            "#,
        )
            .bind(user_id)
            .bind(from)
            .bind(to)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter().map(day_record_from_row).collect()
    }

    async fn earliest_day_record(&mut self, user_id: Uuid) -> Result<Option<NaiveDate>, Error> {
        let row = sqlx::query("SELECT MIN(record_date) AS first_date FROM day_records WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.try_get("first_date")?)
    }

    async fn get_streak_state(&mut self, user_id: Uuid) -> Result<Option<StreakState>, Error> {
        let row = sqlx::query(
            r#"
            SELECT user_id, streak_days, last_streak_date, consecutive_missed_days,
                   streak_started_on, updated_at
            FROM streak_states
            WHERE user_id = $1
            "#,
        )
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        if let Some(r) = row {
            Ok(Some(StreakState {
                user_id: r.try_get("user_id")?,
                streak_days: r.try_get("streak_days")?,
                last_streak_date: r.try_get("last_streak_date")?,
                consecutive_missed_days: r.try_get("consecutive_missed_days")?,
                streak_started_on: r.try_get("streak_started_on")?,
                updated_at: r.try_get("updated_at")?,
            }))
        } else {
            Ok(None)
        }
    }

    async fn save_streak_state(&mut self, state: &StreakState) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO streak_states (
                user_id, streak_days, last_streak_date, consecutive_missed_days,
                streak_started_on, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE
               SET streak_days = EXCLUDED.streak_days,
                   last_streak_date = EXCLUDED.last_streak_date,
                   consecutive_missed_days = EXCLUDED.consecutive_missed_days,
                   streak_started_on = EXCLUDED.streak_started_on,
                   updated_at = EXCLUDED.updated_at
            "#,
        )
            .bind(state.user_id)
            .bind(state.streak_days)
            .bind(state.last_streak_date)
            .bind(state.consecutive_missed_days)
            .bind(state.streak_started_on)
            .bind(state.updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}
