// File: chorely-core/src/repositories/postgres/reward_catalog.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use chorely_common::error::Error;
use chorely_common::models::{CycleReward, CycleType, DateReward, RewardPayload};
use chorely_common::traits::RewardCatalogTx;

use super::settlement_store::{PgSettlementTx, conflict_on_unique};

fn payload_from_row(row: &PgRow) -> Result<RewardPayload, Error> {
    let reward_type: String = row.try_get("reward_type")?;
    RewardPayload::from_columns(
        &reward_type,
        row.try_get("amount")?,
        row.try_get("product_id")?,
        row.try_get("quantity")?,
    )
}

fn date_reward_from_row(row: &PgRow) -> Result<DateReward, Error> {
    Ok(DateReward {
        reward_id: row.try_get("reward_id")?,
        reward_date: row.try_get("reward_date")?,
        payload: payload_from_row(row)?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn cycle_reward_from_row(row: &PgRow) -> Result<CycleReward, Error> {
    let cycle_type: String = row.try_get("cycle_type")?;
    Ok(CycleReward {
        reward_id: row.try_get("reward_id")?,
        cycle_type: cycle_type.parse()?,
        cycle_days: row.try_get("cycle_days")?,
        payload: payload_from_row(row)?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const DATE_REWARD_COLUMNS: &str =
    "reward_id, reward_date, reward_type, amount, product_id, quantity, description, created_at, updated_at";

const CYCLE_REWARD_COLUMNS: &str = "reward_id, cycle_type, cycle_days, reward_type, amount, product_id, quantity, \
     description, created_at, updated_at";

#[async_trait]
impl RewardCatalogTx for PgSettlementTx {
    async fn insert_date_reward(&mut self, reward: &DateReward) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO date_rewards (
                reward_id, reward_date, reward_type, amount, product_id, quantity,
                description, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
            .bind(reward.reward_id)
            .bind(reward.reward_date)
            .bind(reward.payload.reward_type())
            .bind(reward.payload.amount())
            .bind(reward.payload.product_id())
            .bind(reward.payload.quantity())
            .bind(&reward.description)
            .bind(reward.created_at)
            .bind(reward.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| conflict_on_unique(e, || format!("a reward already exists for {}", reward.reward_date)))?;
        Ok(())
    }

    async fn update_date_reward(&mut self, reward: &DateReward) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE date_rewards
            SET reward_date = $2,
                reward_type = $3,
                amount = $4,
                product_id = $5,
                quantity = $6,
                description = $7,
                updated_at = $8
            WHERE reward_id = $1
            "#,
        )
            .bind(reward.reward_id)
            .bind(reward.reward_date)
            .bind(reward.payload.reward_type())
            .bind(reward.payload.amount())
            .bind(reward.payload.product_id())
            .bind(reward.payload.quantity())
            .bind(&reward.description)
            .bind(reward.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| conflict_on_unique(e, || format!("a reward already exists for {}", reward.reward_date)))?;
        Ok(())
    }

    async fn delete_date_reward(&mut self, reward_id: Uuid) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM date_rewards WHERE reward_id = $1")
            .bind(reward_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_date_reward(&mut self, reward_id: Uuid) -> Result<Option<DateReward>, Error> {
        let sql = format!("SELECT {} FROM date_rewards WHERE reward_id = $1", DATE_REWARD_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(reward_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(date_reward_from_row).transpose()
    }

    async fn find_date_reward(&mut self, date: NaiveDate) -> Result<Option<DateReward>, Error> {
        let sql = format!("SELECT {} FROM date_rewards WHERE reward_date = $1", DATE_REWARD_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(date)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(date_reward_from_row).transpose()
    }

    async fn list_date_rewards(
        &mut self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DateReward>, Error> {
        let sql = format!(
            r#"
            SELECT {}
            FROM date_rewards
            WHERE ($1::DATE IS NULL OR reward_date >= $1)
              AND ($2::DATE IS NULL OR reward_date <= $2)
            ORDER BY reward_date
            "#,
            DATE_REWARD_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(date_reward_from_row).collect()
    }

    async fn insert_cycle_reward(&mut self, reward: &CycleReward) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO cycle_rewards (
                reward_id, cycle_type, cycle_days, reward_type, amount, product_id,
                quantity, description, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
            .bind(reward.reward_id)
            .bind(reward.cycle_type.as_str())
            .bind(reward.cycle_days)
            .bind(reward.payload.reward_type())
            .bind(reward.payload.amount())
            .bind(reward.payload.product_id())
            .bind(reward.payload.quantity())
            .bind(&reward.description)
            .bind(reward.created_at)
            .bind(reward.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                conflict_on_unique(e, || {
                    format!("a {} reward already exists for {} days", reward.cycle_type, reward.cycle_days)
                })
            })?;
        Ok(())
    }

    async fn update_cycle_reward(&mut self, reward: &CycleReward) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE cycle_rewards
            SET cycle_type = $2,
                cycle_days = $3,
                reward_type = $4,
                amount = $5,
                product_id = $6,
                quantity = $7,
                description = $8,
                updated_at = $9
            WHERE reward_id = $1
            "#,
        )
            .bind(reward.reward_id)
            .bind(reward.cycle_type.as_str())
            .bind(reward.cycle_days)
            .bind(reward.payload.reward_type())
            .bind(reward.payload.amount())
            .bind(reward.payload.product_id())
            .bind(reward.payload.quantity())
            .bind(&reward.description)
            .bind(reward.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                conflict_on_unique(e, || {
                    format!("a {} reward already exists for {} days", reward.cycle_type, reward.cycle_days)
                })
            })?;
        Ok(())
    }

    async fn delete_cycle_reward(&mut self, reward_id: Uuid) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM cycle_rewards WHERE reward_id = $1")
            .bind(reward_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_cycle_reward(&mut self, reward_id: Uuid) -> Result<Option<CycleReward>, Error> {
        let sql = format!("SELECT {} FROM cycle_rewards WHERE reward_id = $1", CYCLE_REWARD_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(reward_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(cycle_reward_from_row).transpose()
    }

    async fn find_cycle_reward(
        &mut self,
        cycle_type: CycleType,
        cycle_days: i32,
    ) -> Result<Option<CycleReward>, Error> {
        let sql = format!(
            "SELECT {} FROM cycle_rewards WHERE cycle_type = $1 AND cycle_days = $2",
            CYCLE_REWARD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(cycle_type.as_str())
            .bind(cycle_days)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(cycle_reward_from_row).transpose()
    }

    async fn list_cycle_rewards(&mut self) -> Result<Vec<CycleReward>, Error> {
        let sql = format!(
            "SELECT {} FROM cycle_rewards ORDER BY cycle_type, cycle_days",
            CYCLE_REWARD_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&mut *self.tx).await?;
        rows.iter().map(cycle_reward_from_row).collect()
    }
}
