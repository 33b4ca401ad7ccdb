// File: chorely-core/src/services/backpack_service.rs

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use chorely_common::models::{BackpackEntry, BackpackItem, Provenance};
use chorely_common::traits::{BackpackTx, ProductCatalog, SettlementStore, SettlementTx, UserDirectory};

use crate::Error;

/// Removes `quantity` units of a product, oldest provenance rows first.
/// Returns what is left across all rows.
pub async fn consume_in(
    tx: &mut dyn SettlementTx,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> Result<i32, Error> {
    let rows: Vec<BackpackItem> = tx
        .list_backpack(user_id)
        .await?
        .into_iter()
        .filter(|r| r.product_id == product_id)
        .collect();
    let held: i32 = rows.iter().map(|r| r.quantity).sum();
    if held < quantity {
        return Err(Error::Validation(format!(
            "not enough units of {}: have {}, need {}",
            product_id, held, quantity
        )));
    }

    let mut remaining = quantity;
    for row in rows {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(row.quantity);
        tx.set_backpack_quantity(user_id, product_id, row.provenance, row.quantity - take)
            .await?;
        remaining -= take;
    }
    Ok(held - quantity)
}

/// Folds provenance rows into one entry per product, in first-acquired order.
pub fn aggregate(rows: &[BackpackItem]) -> Vec<BackpackEntry> {
    let mut out: Vec<BackpackEntry> = Vec::new();
    for row in rows {
        match out.iter_mut().find(|e| e.product_id == row.product_id) {
            Some(entry) => {
                entry.quantity += row.quantity;
                if !entry.provenances.contains(&row.provenance) {
                    entry.provenances.push(row.provenance);
                }
            }
            None => out.push(BackpackEntry {
                product_id: row.product_id,
                quantity: row.quantity,
                provenances: vec![row.provenance],
            }),
        }
    }
    out
}

fn ensure_quantity(quantity: i32) -> Result<(), Error> {
    if quantity <= 0 {
        return Err(Error::Validation(format!("quantity must be positive, got {}", quantity)));
    }
    Ok(())
}

/// One inventory per user. Provenance is metadata on the rows.
pub struct BackpackService {
    store: Arc<dyn SettlementStore>,
    products: Arc<dyn ProductCatalog>,
    users: Arc<dyn UserDirectory>,
}

impl BackpackService {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        products: Arc<dyn ProductCatalog>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self { store, products, users }
    }

    pub async fn grant(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        provenance: Provenance,
    ) -> Result<i32, Error> {
        ensure_quantity(quantity)?;
        if self.products.get_product(product_id).await?.is_none() {
            return Err(Error::NotFound(format!("product {}", product_id)));
        }

        let mut tx = self.store.begin().await?;
        let row_quantity = tx
            .add_backpack_quantity(user_id, product_id, provenance, quantity)
            .await?;
        tx.commit().await?;

        info!("Granted {} x {} to user {} ({})", quantity, product_id, user_id, provenance);
        Ok(row_quantity)
    }

    pub async fn consume(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<i32, Error> {
        ensure_quantity(quantity)?;
        let mut tx = self.store.begin().await?;
        let left = consume_in(tx.as_mut(), user_id, product_id, quantity).await?;
        tx.commit().await?;

        info!("User {} used {} x {} ({} left)", user_id, quantity, product_id, left);
        Ok(left)
    }

    /// Moves units between users. The recipient's row is tagged `transfer`.
    pub async fn transfer(&self, from: Uuid, to: Uuid, product_id: Uuid, quantity: i32) -> Result<(), Error> {
        ensure_quantity(quantity)?;
        if from == to {
            return Err(Error::Validation("cannot transfer items to yourself".to_string()));
        }
        for user in [from, to] {
            if !self.users.user_exists(user).await? {
                return Err(Error::NotFound(format!("user {}", user)));
            }
        }

        let mut tx = self.store.begin().await?;
        consume_in(tx.as_mut(), from, product_id, quantity).await?;
        tx.add_backpack_quantity(to, product_id, Provenance::Transfer, quantity)
            .await?;
        tx.commit().await?;

        info!("Moved {} x {} from {} to {}", quantity, product_id, from, to);
        Ok(())
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<BackpackEntry>, Error> {
        let mut tx = self.store.begin().await?;
        let rows = tx.list_backpack(user_id).await?;
        tx.commit().await?;
        Ok(aggregate(&rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorely_common::models::Role;

    use crate::repositories::{MemoryDirectory, MemoryStore};

    fn setup() -> (BackpackService, MemoryDirectory) {
        let dir = MemoryDirectory::new();
        let svc = BackpackService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(dir.clone()),
            Arc::new(dir.clone()),
        );
        (svc, dir)
    }

    #[tokio::test]
    async fn test_sources_share_one_inventory() {
        let (svc, dir) = setup();
        let kid = dir.add_user(Role::Member);
        let sticker = dir.add_product("Sticker", None);

        svc.grant(kid, sticker.product_id, 2, Provenance::LuckyBox).await.unwrap();
        svc.grant(kid, sticker.product_id, 3, Provenance::StreakReward).await.unwrap();

        let list = svc.list(kid).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].quantity, 5);
        assert_eq!(list[0].provenances, vec![Provenance::LuckyBox, Provenance::StreakReward]);

        // Oldest row drains first.
        assert_eq!(svc.consume(kid, sticker.product_id, 3).await.unwrap(), 2);
        let list = svc.list(kid).await.unwrap();
        assert_eq!(list[0].provenances, vec![Provenance::StreakReward]);
    }

    #[tokio::test]
    async fn test_consume_more_than_held_changes_nothing() {
        let (svc, dir) = setup();
        let kid = dir.add_user(Role::Member);
        let toy = dir.add_product("Toy", None);
        svc.grant(kid, toy.product_id, 1, Provenance::Manual).await.unwrap();

        assert!(matches!(svc.consume(kid, toy.product_id, 2).await, Err(Error::Validation(_))));
        assert_eq!(svc.list(kid).await.unwrap()[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_transfer_moves_units() {
        let (svc, dir) = setup();
        let a = dir.add_user(Role::Member);
        let b = dir.add_user(Role::Member);
        let toy = dir.add_product("Toy", None);
        svc.grant(a, toy.product_id, 4, Provenance::DateReward).await.unwrap();

        svc.transfer(a, b, toy.product_id, 4).await.unwrap();
        assert!(svc.list(a).await.unwrap().is_empty());
        let got = svc.list(b).await.unwrap();
        assert_eq!(got[0].quantity, 4);
        assert_eq!(got[0].provenances, vec![Provenance::Transfer]);
    }

    #[tokio::test]
    async fn test_grant_unknown_product() {
        let (svc, dir) = setup();
        let kid = dir.add_user(Role::Member);
        assert!(matches!(
            svc.grant(kid, Uuid::new_v4(), 1, Provenance::Manual).await,
            Err(Error::NotFound(_))
        ));
    }
}
