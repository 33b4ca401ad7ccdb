// File: chorely-core/src/services/lucky_box_service.rs

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use chorely_common::models::{
    DrawResult, DrawReward, LedgerReason, LuckyBox, LuckyBoxInput, LuckyBoxItem, LuckyBoxPrize,
    LuckyBoxRedemption, LuckyBoxWithItems, Provenance,
};
use chorely_common::traits::{BackpackTx, LedgerTx, LuckyBoxTx, ProductCatalog, SettlementStore};

use crate::Error;
use crate::clock::Clock;
use crate::services::effect_service::{apply_multiplier, effective_multiplier_in};
use crate::services::ledger_service::{credit_in, debit_in};

/// Source of the draw's random number.
pub trait RandomSource: Send + Sync {
    /// A value in `[0, upper)`. `upper` is always positive.
    fn next_below(&self, upper: f64) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn next_below(&self, upper: f64) -> f64 {
        rand::rng().random_range(0.0..upper)
    }
}

/// Walks the weights in order and returns the first index whose running sum
/// reaches `r`. Falls back to the first entry when rounding leaves `r` past
/// the end.
pub fn pick_weighted(weights: &[f64], r: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative >= r {
            return i;
        }
    }
    0
}

pub struct LuckyBoxService {
    store: Arc<dyn SettlementStore>,
    products: Arc<dyn ProductCatalog>,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
}

impl LuckyBoxService {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        products: Arc<dyn ProductCatalog>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            store,
            products,
            clock,
            rng,
        }
    }

    /// Pays for one draw and hands out the prize. Everything happens in one
    /// transaction: if any step fails the cost is not charged.
    pub async fn redeem(&self, user_id: Uuid, box_id: Uuid) -> Result<DrawResult, Error> {
        let redemption_id = Uuid::new_v4();
        let mut tx = self.store.begin().await?;

        // 1. box
        let lucky_box = match tx.get_lucky_box(box_id).await? {
            Some(b) if b.is_active => b,
            _ => return Err(Error::NotFound(format!("lucky box {}", box_id))),
        };

        // 2. balance
        let balance = tx.lock_balance(user_id, lucky_box.cost_point_type).await?;
        if balance < lucky_box.cost_amount {
            return Err(Error::InsufficientFunds {
                point_type: lucky_box.cost_point_type,
                required: lucky_box.cost_amount,
                available: balance,
            });
        }

        // 3. debit
        if lucky_box.cost_amount > 0 {
            debit_in(
                tx.as_mut(),
                user_id,
                lucky_box.cost_point_type,
                lucky_box.cost_amount,
                LedgerReason::LuckyBoxCost,
                Some(redemption_id),
            )
            .await?;
        }

        // 4. items
        let items = tx.list_lucky_box_items(box_id).await?;
        let weights: Vec<f64> = items.iter().map(|i| i.probability).collect();
        let total: f64 = weights.iter().sum();
        if items.is_empty() || !(total > 0.0) {
            return Err(Error::Unconfigured(format!("lucky box {} has no prizes", box_id)));
        }

        // 5. draw
        let r = self.rng.next_below(total);
        let drawn = &items[pick_weighted(&weights, r)];
        debug!("Draw on box {}: r={:.4} of {:.4} => item {}", box_id, r, total, drawn.item_id);

        // 6. grant
        let (reward, credited_amount) = match &drawn.prize {
            LuckyBoxPrize::Points { point_type, amount } => {
                let multiplier =
                    effective_multiplier_in(tx.as_mut(), user_id, *point_type, self.clock.now()).await?;
                let reward_amount = apply_multiplier(*amount, multiplier);
                let balance_after = if reward_amount > 0 {
                    credit_in(
                        tx.as_mut(),
                        user_id,
                        *point_type,
                        reward_amount,
                        LedgerReason::LuckyBoxWin,
                        Some(redemption_id),
                    )
                    .await?
                    .balance_after
                } else {
                    tx.lock_balance(user_id, *point_type).await?
                };
                (
                    DrawReward::Points {
                        point_type: *point_type,
                        base_amount: *amount,
                        multiplier,
                        reward_amount,
                        balance_after,
                    },
                    Some(reward_amount),
                )
            }
            LuckyBoxPrize::Product { product_id } => {
                let product = self
                    .products
                    .get_product(*product_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("product {}", product_id)))?;
                tx.add_backpack_quantity(user_id, *product_id, Provenance::LuckyBox, 1)
                    .await?;
                (DrawReward::Product { product }, None)
            }
        };

        // 7. record
        let redemption = LuckyBoxRedemption {
            redemption_id,
            user_id,
            box_id,
            item_id: drawn.item_id,
            prize: drawn.prize.clone(),
            cost_point_type: lucky_box.cost_point_type,
            cost_amount: lucky_box.cost_amount,
            credited_amount,
            created_at: Utc::now(),
        };
        tx.insert_redemption(&redemption).await?;

        let new_balance = tx.lock_balance(user_id, lucky_box.cost_point_type).await?;
        tx.commit().await?;

        info!(
            "User {} redeemed box '{}' ({}) => item {}",
            user_id, lucky_box.name, box_id, drawn.item_id
        );
        Ok(DrawResult {
            redemption_id,
            box_id,
            item_id: drawn.item_id,
            reward,
            cost_point_type: lucky_box.cost_point_type,
            new_balance,
        })
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    async fn build_items(&self, box_id: Uuid, input: &LuckyBoxInput) -> Result<Vec<LuckyBoxItem>, Error> {
        if input.name.trim().is_empty() {
            return Err(Error::Validation("lucky box name is required".to_string()));
        }
        if input.cost_amount < 0 {
            return Err(Error::Validation("cost_amount cannot be negative".to_string()));
        }

        let mut items = Vec::with_capacity(input.items.len());
        for (position, item) in input.items.iter().enumerate() {
            if !item.probability.is_finite() || item.probability <= 0.0 {
                return Err(Error::Validation(format!(
                    "item {} needs a positive probability",
                    position
                )));
            }
            match &item.prize {
                LuckyBoxPrize::Points { amount, .. } if *amount <= 0 => {
                    return Err(Error::Validation(format!("item {} needs a positive amount", position)));
                }
                LuckyBoxPrize::Product { product_id } => {
                    if self.products.get_product(*product_id).await?.is_none() {
                        return Err(Error::Validation(format!("unknown product {}", product_id)));
                    }
                }
                _ => {}
            }
            items.push(LuckyBoxItem {
                item_id: Uuid::new_v4(),
                box_id,
                position: position as i32,
                prize: item.prize.clone(),
                probability: item.probability,
            });
        }
        Ok(items)
    }

    pub async fn create_box(&self, input: LuckyBoxInput) -> Result<LuckyBoxWithItems, Error> {
        let box_id = Uuid::new_v4();
        let items = self.build_items(box_id, &input).await?;

        let now = Utc::now();
        let lucky_box = LuckyBox {
            box_id,
            name: input.name,
            description: input.description,
            cost_point_type: input.cost_point_type,
            cost_amount: input.cost_amount,
            is_active: input.is_active,
            is_hidden: input.is_hidden,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_lucky_box(&lucky_box).await?;
        tx.replace_lucky_box_items(box_id, &items).await?;
        tx.commit().await?;

        info!("Created lucky box '{}' ({}) with {} items", lucky_box.name, box_id, items.len());
        Ok(LuckyBoxWithItems { lucky_box, items })
    }

    /// Rewrites the box and replaces its items wholesale.
    pub async fn update_box(&self, box_id: Uuid, input: LuckyBoxInput) -> Result<LuckyBoxWithItems, Error> {
        let items = self.build_items(box_id, &input).await?;

        let mut tx = self.store.begin().await?;
        let mut lucky_box = tx
            .get_lucky_box(box_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("lucky box {}", box_id)))?;
        lucky_box.name = input.name;
        lucky_box.description = input.description;
        lucky_box.cost_point_type = input.cost_point_type;
        lucky_box.cost_amount = input.cost_amount;
        lucky_box.is_active = input.is_active;
        lucky_box.is_hidden = input.is_hidden;
        lucky_box.updated_at = Utc::now();

        tx.update_lucky_box(&lucky_box).await?;
        tx.replace_lucky_box_items(box_id, &items).await?;
        tx.commit().await?;

        info!("Updated lucky box {}", box_id);
        Ok(LuckyBoxWithItems { lucky_box, items })
    }

    pub async fn delete_box(&self, box_id: Uuid) -> Result<(), Error> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_lucky_box(box_id).await? {
            return Err(Error::NotFound(format!("lucky box {}", box_id)));
        }
        tx.commit().await?;
        info!("Deleted lucky box {}", box_id);
        Ok(())
    }

    pub async fn get_box(&self, box_id: Uuid) -> Result<LuckyBoxWithItems, Error> {
        let mut tx = self.store.begin().await?;
        let lucky_box = tx
            .get_lucky_box(box_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("lucky box {}", box_id)))?;
        let items = tx.list_lucky_box_items(box_id).await?;
        tx.commit().await?;
        Ok(LuckyBoxWithItems { lucky_box, items })
    }

    /// Every box with its items. Admin view.
    pub async fn list_all_boxes(&self) -> Result<Vec<LuckyBoxWithItems>, Error> {
        self.list_boxes_where(|_| true).await
    }

    /// Active, non-hidden boxes. Member view.
    pub async fn list_visible_boxes(&self) -> Result<Vec<LuckyBoxWithItems>, Error> {
        self.list_boxes_where(|b| b.is_active && !b.is_hidden).await
    }

    async fn list_boxes_where<F>(&self, keep: F) -> Result<Vec<LuckyBoxWithItems>, Error>
    where
        F: Fn(&LuckyBox) -> bool + Send + Sync,
    {
        let mut tx = self.store.begin().await?;
        let boxes = tx.list_lucky_boxes().await?;
        let mut out = Vec::new();
        for lucky_box in boxes.into_iter().filter(|b| keep(b)) {
            let items = tx.list_lucky_box_items(lucky_box.box_id).await?;
            out.push(LuckyBoxWithItems { lucky_box, items });
        }
        tx.commit().await?;
        Ok(out)
    }

    pub async fn history(&self, user_id: Uuid, limit: i64) -> Result<Vec<LuckyBoxRedemption>, Error> {
        let mut tx = self.store.begin().await?;
        let list = tx.list_redemptions(user_id, limit.clamp(1, 500)).await?;
        tx.commit().await?;
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_weighted_boundaries() {
        let weights = [10.0, 20.0, 70.0];
        assert_eq!(pick_weighted(&weights, 5.0), 0);
        assert_eq!(pick_weighted(&weights, 15.0), 1);
        assert_eq!(pick_weighted(&weights, 50.0), 2);
        assert_eq!(pick_weighted(&weights, 0.0), 0);
        assert_eq!(pick_weighted(&weights, 10.0), 0);
        assert_eq!(pick_weighted(&weights, 99.999), 2);
    }

    #[test]
    fn test_pick_weighted_falls_back_to_first() {
        assert_eq!(pick_weighted(&[0.1, 0.2], 0.31), 0);
    }

    #[test]
    fn test_weights_need_not_sum_to_100() {
        let weights = [1.0, 1.0, 2.0];
        assert_eq!(pick_weighted(&weights, 0.5), 0);
        assert_eq!(pick_weighted(&weights, 1.5), 1);
        assert_eq!(pick_weighted(&weights, 3.9), 2);
    }

    #[test]
    fn test_thread_rng_distribution() {
        let rng = ThreadRngSource;
        let weights = [10.0, 20.0, 70.0];
        let mut hits = [0u32; 3];
        let draws = 100_000;
        for _ in 0..draws {
            hits[pick_weighted(&weights, rng.next_below(100.0))] += 1;
        }
        for (got, expected) in hits.iter().zip([0.10, 0.20, 0.70]) {
            let share = *got as f64 / draws as f64;
            assert!((share - expected).abs() < 0.02, "share {} vs {}", share, expected);
        }
    }
}
