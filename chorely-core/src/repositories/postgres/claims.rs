// File: chorely-core/src/repositories/postgres/claims.rs

use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use chorely_common::error::Error;
use chorely_common::models::ClaimRecord;
use chorely_common::traits::ClaimTx;

use super::settlement_store::PgSettlementTx;

#[async_trait]
impl ClaimTx for PgSettlementTx {
    async fn try_insert_claim(&mut self, claim: &ClaimRecord) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO reward_claims (claim_id, user_id, reward_key, source, reward_id, claimed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, reward_key, source) DO NOTHING
            "#,
        )
            .bind(claim.claim_id)
            .bind(claim.user_id)
            .bind(&claim.reward_key)
            .bind(claim.source.as_str())
            .bind(claim.reward_id)
            .bind(claim.claimed_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_claims(&mut self, user_id: Uuid) -> Result<Vec<ClaimRecord>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT claim_id, user_id, reward_key, source, reward_id, claimed_at
            FROM reward_claims
            WHERE user_id = $1
            ORDER BY claimed_at DESC, claim_id
            "#,
        )
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;

        let mut claims = Vec::with_capacity(rows.len());
        for r in rows {
            let source: String = r.try_get("source")?;
            claims.push(ClaimRecord {
                claim_id: r.try_get("claim_id")?,
                user_id: r.try_get("user_id")?,
                reward_key: r.try_get("reward_key")?,
                source: source.parse()?,
                reward_id: r.try_get("reward_id")?,
                claimed_at: r.try_get("claimed_at")?,
            });
        }
        Ok(claims)
    }
}
