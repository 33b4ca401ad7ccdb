// File: chorely-core/src/repositories/postgres/lucky_boxes.rs

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use chorely_common::error::Error;
use chorely_common::models::{LuckyBox, LuckyBoxItem, LuckyBoxPrize, LuckyBoxRedemption};
use chorely_common::traits::LuckyBoxTx;

use super::settlement_store::PgSettlementTx;

fn lucky_box_from_row(row: &PgRow) -> Result<LuckyBox, Error> {
    let cost_point_type: String = row.try_get("cost_point_type")?;
    Ok(LuckyBox {
        box_id: row.try_get("box_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        cost_point_type: cost_point_type.parse()?,
        cost_amount: row.try_get("cost_amount")?,
        is_active: row.try_get("is_active")?,
        is_hidden: row.try_get("is_hidden")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Decodes the `item_type` / `point_type` / `amount` / `product_id` columns
/// shared by items and redemptions.
fn prize_from_row(row: &PgRow) -> Result<LuckyBoxPrize, Error> {
    let item_type: String = row.try_get("item_type")?;
    let point_type: Option<String> = row.try_get("point_type")?;
    LuckyBoxPrize::from_columns(
        &item_type,
        point_type.as_deref(),
        row.try_get("amount")?,
        row.try_get("product_id")?,
    )
}

fn prize_columns(prize: &LuckyBoxPrize) -> (Option<&'static str>, Option<i64>, Option<Uuid>) {
    match prize {
        LuckyBoxPrize::Points { point_type, amount } => (Some(point_type.as_str()), Some(*amount), None),
        LuckyBoxPrize::Product { product_id } => (None, None, Some(*product_id)),
    }
}

#[async_trait]
impl LuckyBoxTx for PgSettlementTx {
    async fn insert_lucky_box(&mut self, lb: &LuckyBox) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO lucky_boxes (
                box_id, name, description, cost_point_type, cost_amount,
                is_active, is_hidden, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
            .bind(lb.box_id)
            .bind(&lb.name)
            .bind(&lb.description)
            .bind(lb.cost_point_type.as_str())
            .bind(lb.cost_amount)
            .bind(lb.is_active)
            .bind(lb.is_hidden)
            .bind(lb.created_at)
            .bind(lb.updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_lucky_box(&mut self, lb: &LuckyBox) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE lucky_boxes
            SET name = $2,
                description = $3,
                cost_point_type = $4,
                cost_amount = $5,
                is_active = $6,
                is_hidden = $7,
                updated_at = $8
            WHERE box_id = $1
            "#,
        )
            .bind(lb.box_id)
            .bind(&lb.name)
            .bind(&lb.description)
            .bind(lb.cost_point_type.as_str())
            .bind(lb.cost_amount)
            .bind(lb.is_active)
            .bind(lb.is_hidden)
            .bind(lb.updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_lucky_box(&mut self, box_id: Uuid) -> Result<bool, Error> {
        // Items go with the box via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM lucky_boxes WHERE box_id = $1")
            .bind(box_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_lucky_box(&mut self, box_id: Uuid) -> Result<Option<LuckyBox>, Error> {
        let row = sqlx::query(
            r#"
            SELECT box_id, name, description, cost_point_type, cost_amount,
                   is_active, is_hidden, created_at, updated_at
            FROM lucky_boxes
            WHERE box_id = $1
            "#,
        )
            .bind(box_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(lucky_box_from_row).transpose()
    }

    async fn list_lucky_boxes(&mut self) -> Result<Vec<LuckyBox>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT box_id, name, description, cost_point_type, cost_amount,
                   is_active, is_hidden, created_at, updated_at
            FROM lucky_boxes
            ORDER BY created_at, box_id
            "#,
        )
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(lucky_box_from_row).collect()
    }

    async fn replace_lucky_box_items(&mut self, box_id: Uuid, items: &[LuckyBoxItem]) -> Result<(), Error> {
        sqlx::query("DELETE FROM lucky_box_items WHERE box_id = $1")
            .bind(box_id)
            .execute(&mut *self.tx)
            .await?;

        for item in items {
            let (point_type, amount, product_id) = prize_columns(&item.prize);
            sqlx::query(
                r#"
                INSERT INTO lucky_box_items (
                    item_id, box_id, position, item_type, point_type, amount, product_id, probability
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
                .bind(item.item_id)
                .bind(box_id)
                .bind(item.position)
                .bind(item.prize.item_type())
                .bind(point_type)
                .bind(amount)
                .bind(product_id)
                .bind(item.probability)
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }

    async fn list_lucky_box_items(&mut self, box_id: Uuid) -> Result<Vec<LuckyBoxItem>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT item_id, box_id, position, item_type, point_type, amount, product_id, probability
            FROM lucky_box_items
            WHERE box_id = $1
            ORDER BY position, item_id
            "#,
        )
            .bind(box_id)
            .fetch_all(&mut *self.tx)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for r in &rows {
            items.push(LuckyBoxItem {
                item_id: r.try_get("item_id")?,
                box_id: r.try_get("box_id")?,
                position: r.try_get("position")?,
                prize: prize_from_row(r)?,
                probability: r.try_get("probability")?,
            });
        }
        Ok(items)
    }

    async fn insert_redemption(&mut self, redemption: &LuckyBoxRedemption) -> Result<(), Error> {
        let (point_type, amount, product_id) = prize_columns(&redemption.prize);
        sqlx::query(
            r#"
            INSERT INTO lucky_box_redemptions (
                redemption_id, user_id, box_id, item_id, item_type, point_type, amount,
                product_id, cost_point_type, cost_amount, credited_amount, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
            .bind(redemption.redemption_id)
            .bind(redemption.user_id)
            .bind(redemption.box_id)
            .bind(redemption.item_id)
            .bind(redemption.prize.item_type())
            .bind(point_type)
            .bind(amount)
            .bind(product_id)
            .bind(redemption.cost_point_type.as_str())
            .bind(redemption.cost_amount)
            .bind(redemption.credited_amount)
            .bind(redemption.created_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_redemptions(&mut self, user_id: Uuid, limit: i64) -> Result<Vec<LuckyBoxRedemption>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT redemption_id, user_id, box_id, item_id, item_type, point_type, amount,
                   product_id, cost_point_type, cost_amount, credited_amount, created_at
            FROM lucky_box_redemptions
            WHERE user_id = $1
            ORDER BY redemption_seq DESC
            LIMIT $2
            "#,
        )
            .bind(user_id)
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            let cost_point_type: String = r.try_get("cost_point_type")?;
            out.push(LuckyBoxRedemption {
                redemption_id: r.try_get("redemption_id")?,
                user_id: r.try_get("user_id")?,
                box_id: r.try_get("box_id")?,
                item_id: r.try_get("item_id")?,
                prize: prize_from_row(r)?,
                cost_point_type: cost_point_type.parse()?,
                cost_amount: r.try_get("cost_amount")?,
                credited_amount: r.try_get("credited_amount")?,
                created_at: r.try_get("created_at")?,
            });
        }
        Ok(out)
    }
}
