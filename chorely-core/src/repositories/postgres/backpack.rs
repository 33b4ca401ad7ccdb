// File: chorely-core/src/repositories/postgres/backpack.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use chorely_common::error::Error;
use chorely_common::models::{BackpackItem, Provenance};
use chorely_common::traits::BackpackTx;

use super::settlement_store::PgSettlementTx;

#[async_trait]
impl BackpackTx for PgSettlementTx {
    async fn add_backpack_quantity(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
        provenance: Provenance,
        quantity: i32,
    ) -> Result<i32, Error> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO backpack_items (user_id, product_id, provenance, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (user_id, product_id, provenance) DO UPDATE
               SET quantity = backpack_items.quantity + EXCLUDED.quantity,
                   updated_at = EXCLUDED.updated_at
            RETURNING quantity
            "#,
        )
            .bind(user_id)
            .bind(product_id)
            .bind(provenance.as_str())
            .bind(quantity)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.try_get("quantity")?)
    }

    async fn set_backpack_quantity(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
        provenance: Provenance,
        quantity: i32,
    ) -> Result<(), Error> {
        if quantity <= 0 {
            sqlx::query(
                r#"
                DELETE FROM backpack_items
                WHERE user_id = $1 AND product_id = $2 AND provenance = $3
                "#,
            )
                .bind(user_id)
                .bind(product_id)
                .bind(provenance.as_str())
                .execute(&mut *self.tx)
                .await?;
            return Ok(());
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO backpack_items (user_id, product_id, provenance, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (user_id, product_id, provenance) DO UPDATE
               SET quantity = EXCLUDED.quantity,
                   updated_at = EXCLUDED.updated_at
            "#,
        )
            .bind(user_id)
            .bind(product_id)
            .bind(provenance.as_str())
            .bind(quantity)
            .bind(now)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_backpack(&mut self, user_id: Uuid) -> Result<Vec<BackpackItem>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, product_id, provenance, quantity, updated_at
            FROM backpack_items
            WHERE user_id = $1
            ORDER BY created_at, product_id, provenance
            FOR UPDATE
            "#,
        )
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for r in rows {
            let provenance: String = r.try_get("provenance")?;
            items.push(BackpackItem {
                user_id: r.try_get("user_id")?,
                product_id: r.try_get("product_id")?,
                provenance: provenance.parse()?,
                quantity: r.try_get("quantity")?,
                updated_at: r.try_get("updated_at")?,
            });
        }
        Ok(items)
    }
}
