// File: chorely-core/src/repositories/postgres/effects.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use chorely_common::error::Error;
use chorely_common::models::{PointType, SpecialEffect};
use chorely_common::traits::EffectTx;

use super::settlement_store::PgSettlementTx;

#[async_trait]
impl EffectTx for PgSettlementTx {
    async fn insert_effect(&mut self, effect: &SpecialEffect) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO special_effects (
                effect_id, user_id, point_type, multiplier, start_time, end_time,
                description, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
            .bind(effect.effect_id)
            .bind(effect.user_id)
            .bind(effect.point_type.as_str())
            .bind(effect.multiplier)
            .bind(effect.start_time)
            .bind(effect.end_time)
            .bind(&effect.description)
            .bind(effect.created_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_effects(
        &mut self,
        user_id: Uuid,
        point_type: Option<PointType>,
    ) -> Result<Vec<SpecialEffect>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT effect_id, user_id, point_type, multiplier, start_time, end_time,
                   description, created_at
            FROM special_effects
            WHERE user_id = $1
              AND ($2::TEXT IS NULL OR point_type = $2)
            ORDER BY end_time DESC, effect_id
            "#,
        )
            .bind(user_id)
            .bind(point_type.map(|pt| pt.as_str()))
            .fetch_all(&mut *self.tx)
            .await?;

        let mut effects = Vec::with_capacity(rows.len());
        for r in rows {
            let pt: String = r.try_get("point_type")?;
            effects.push(SpecialEffect {
                effect_id: r.try_get("effect_id")?,
                user_id: r.try_get("user_id")?,
                point_type: pt.parse()?,
                multiplier: r.try_get("multiplier")?,
                start_time: r.try_get("start_time")?,
                end_time: r.try_get("end_time")?,
                description: r.try_get("description")?,
                created_at: r.try_get("created_at")?,
            });
        }
        Ok(effects)
    }

    async fn delete_effects_ended_before(&mut self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM special_effects WHERE end_time < $1")
            .bind(before)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }
}
