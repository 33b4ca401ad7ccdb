// File: chorely-core/src/services/reward_catalog_service.rs

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use chorely_common::models::{
    CycleReward, CycleRewardInput, CycleType, DateReward, DateRewardInput, RewardPayload,
};
use chorely_common::traits::{ProductCatalog, RewardCatalogTx, SettlementStore};

use crate::Error;

/// True when a reward of this shape pays out on the given streak day.
pub fn cycle_reward_applies(cycle_type: CycleType, cycle_days: i32, streak_days: i32) -> bool {
    if streak_days <= 0 || cycle_days <= 0 {
        return false;
    }
    match cycle_type {
        CycleType::Cycle => streak_days % cycle_days == 0,
        CycleType::Specific => streak_days == cycle_days,
    }
}

pub fn resolve_cycle_rewards_from(rewards: &[CycleReward], streak_days: i32) -> Vec<CycleReward> {
    rewards
        .iter()
        .filter(|r| cycle_reward_applies(r.cycle_type, r.cycle_days, streak_days))
        .cloned()
        .collect()
}

pub struct RewardCatalogService {
    store: Arc<dyn SettlementStore>,
    products: Arc<dyn ProductCatalog>,
}

impl RewardCatalogService {
    pub fn new(store: Arc<dyn SettlementStore>, products: Arc<dyn ProductCatalog>) -> Self {
        Self { store, products }
    }

    async fn validate_payload(&self, payload: &RewardPayload) -> Result<(), Error> {
        payload.validate()?;
        if let RewardPayload::Product { product_id, .. } = payload {
            if self.products.get_product(*product_id).await?.is_none() {
                return Err(Error::Validation(format!("unknown product {}", product_id)));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Date rewards
    // ------------------------------------------------------------------

    pub async fn create_date_reward(&self, input: DateRewardInput) -> Result<DateReward, Error> {
        self.validate_payload(&input.payload).await?;

        let now = Utc::now();
        let reward = DateReward {
            reward_id: Uuid::new_v4(),
            reward_date: input.reward_date,
            payload: input.payload,
            description: input.description,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_date_reward(&reward).await?;
        tx.commit().await?;

        info!("Created date reward {} for {}", reward.reward_id, reward.reward_date);
        Ok(reward)
    }

    pub async fn update_date_reward(&self, reward_id: Uuid, input: DateRewardInput) -> Result<DateReward, Error> {
        self.validate_payload(&input.payload).await?;

        let mut tx = self.store.begin().await?;
        let mut reward = tx
            .get_date_reward(reward_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("date reward {}", reward_id)))?;
        reward.reward_date = input.reward_date;
        reward.payload = input.payload;
        reward.description = input.description;
        reward.updated_at = Utc::now();

        tx.update_date_reward(&reward).await?;
        tx.commit().await?;

        info!("Updated date reward {}", reward_id);
        Ok(reward)
    }

    pub async fn delete_date_reward(&self, reward_id: Uuid) -> Result<(), Error> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_date_reward(reward_id).await? {
            return Err(Error::NotFound(format!("date reward {}", reward_id)));
        }
        tx.commit().await?;
        info!("Deleted date reward {}", reward_id);
        Ok(())
    }

    pub async fn list_date_rewards(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DateReward>, Error> {
        let mut tx = self.store.begin().await?;
        let list = tx.list_date_rewards(from, to).await?;
        tx.commit().await?;
        Ok(list)
    }

    pub async fn resolve_date_reward(&self, date: NaiveDate) -> Result<Option<DateReward>, Error> {
        let mut tx = self.store.begin().await?;
        let found = tx.find_date_reward(date).await?;
        tx.commit().await?;
        Ok(found)
    }

    // ------------------------------------------------------------------
    // Cycle rewards
    // ------------------------------------------------------------------

    fn validate_cycle_days(cycle_days: i32) -> Result<(), Error> {
        if cycle_days < 1 {
            return Err(Error::Validation("cycle_days must be at least 1".to_string()));
        }
        Ok(())
    }

    pub async fn create_cycle_reward(&self, input: CycleRewardInput) -> Result<CycleReward, Error> {
        Self::validate_cycle_days(input.cycle_days)?;
        self.validate_payload(&input.payload).await?;

        let now = Utc::now();
        let reward = CycleReward {
            reward_id: Uuid::new_v4(),
            cycle_type: input.cycle_type,
            cycle_days: input.cycle_days,
            payload: input.payload,
            description: input.description,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_cycle_reward(&reward).await?;
        tx.commit().await?;

        info!(
            "Created {} reward {} for {} days",
            reward.cycle_type, reward.reward_id, reward.cycle_days
        );
        Ok(reward)
    }

    pub async fn update_cycle_reward(&self, reward_id: Uuid, input: CycleRewardInput) -> Result<CycleReward, Error> {
        Self::validate_cycle_days(input.cycle_days)?;
        self.validate_payload(&input.payload).await?;

        let mut tx = self.store.begin().await?;
        let mut reward = tx
            .get_cycle_reward(reward_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("cycle reward {}", reward_id)))?;
        reward.cycle_type = input.cycle_type;
        reward.cycle_days = input.cycle_days;
        reward.payload = input.payload;
        reward.description = input.description;
        reward.updated_at = Utc::now();

        tx.update_cycle_reward(&reward).await?;
        tx.commit().await?;

        info!("Updated cycle reward {}", reward_id);
        Ok(reward)
    }

    pub async fn delete_cycle_reward(&self, reward_id: Uuid) -> Result<(), Error> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_cycle_reward(reward_id).await? {
            return Err(Error::NotFound(format!("cycle reward {}", reward_id)));
        }
        tx.commit().await?;
        info!("Deleted cycle reward {}", reward_id);
        Ok(())
    }

    pub async fn list_cycle_rewards(&self) -> Result<Vec<CycleReward>, Error> {
        let mut tx = self.store.begin().await?;
        let list = tx.list_cycle_rewards().await?;
        tx.commit().await?;
        Ok(list)
    }

    /// Every `cycle` entry dividing `streak_days` plus the `specific` entry
    /// equal to it. Day zero resolves nothing.
    pub async fn resolve_cycle_rewards(&self, streak_days: i32) -> Result<Vec<CycleReward>, Error> {
        let all = self.list_cycle_rewards().await?;
        Ok(resolve_cycle_rewards_from(&all, streak_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use mockall::predicate::eq;
    use async_trait::async_trait;
    use chorely_common::models::{PointType, ProductInfo};

    use crate::repositories::MemoryStore;

    mock! {
        pub Products {}

        #[async_trait]
        impl ProductCatalog for Products {
            async fn get_product(&self, product_id: Uuid) -> Result<Option<ProductInfo>, Error>;
        }
    }

    fn coins(amount: i64) -> RewardPayload {
        RewardPayload::Points { point_type: PointType::Coin, amount }
    }

    fn cycle_input(cycle_type: CycleType, days: i32, amount: i64) -> CycleRewardInput {
        CycleRewardInput {
            cycle_type,
            cycle_days: days,
            payload: coins(amount),
            description: None,
        }
    }

    fn service(products: MockProducts) -> RewardCatalogService {
        RewardCatalogService::new(Arc::new(MemoryStore::new()), Arc::new(products))
    }

    #[test]
    fn test_cycle_reward_applies() {
        assert!(cycle_reward_applies(CycleType::Cycle, 7, 14));
        assert!(!cycle_reward_applies(CycleType::Cycle, 7, 15));
        assert!(cycle_reward_applies(CycleType::Specific, 30, 30));
        assert!(!cycle_reward_applies(CycleType::Specific, 30, 60));
        assert!(!cycle_reward_applies(CycleType::Cycle, 7, 0));
    }

    #[tokio::test]
    async fn test_resolve_cycle_rewards_mixes_cycle_and_specific() {
        let svc = service(MockProducts::new());
        svc.create_cycle_reward(cycle_input(CycleType::Cycle, 3, 10)).await.unwrap();
        svc.create_cycle_reward(cycle_input(CycleType::Cycle, 5, 20)).await.unwrap();
        svc.create_cycle_reward(cycle_input(CycleType::Specific, 6, 50)).await.unwrap();

        let on_six: Vec<_> = svc.resolve_cycle_rewards(6).await.unwrap().iter().map(|r| r.cycle_days).collect();
        assert_eq!(on_six, vec![3, 6]);
        assert!(svc.resolve_cycle_rewards(0).await.unwrap().is_empty());
        assert_eq!(svc.resolve_cycle_rewards(15).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_keys_conflict_and_keep_the_original() {
        let svc = service(MockProducts::new());
        let date = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let original = svc
            .create_date_reward(DateRewardInput { reward_date: date, payload: coins(10), description: None })
            .await
            .unwrap();

        let dup = svc
            .create_date_reward(DateRewardInput { reward_date: date, payload: coins(99), description: None })
            .await;
        assert!(matches!(dup, Err(Error::Conflict(_))));
        assert_eq!(svc.resolve_date_reward(date).await.unwrap(), Some(original));

        svc.create_cycle_reward(cycle_input(CycleType::Cycle, 7, 10)).await.unwrap();
        let dup = svc.create_cycle_reward(cycle_input(CycleType::Cycle, 7, 11)).await;
        assert!(matches!(dup, Err(Error::Conflict(_))));
        // Same days under the other type is a different key.
        svc.create_cycle_reward(cycle_input(CycleType::Specific, 7, 12)).await.unwrap();
        assert_eq!(svc.list_cycle_rewards().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_validation_rejects_bad_input() {
        let mut products = MockProducts::new();
        let missing = Uuid::new_v4();
        products.expect_get_product().with(eq(missing)).returning(|_| Ok(None));
        let svc = service(products);

        assert!(matches!(
            svc.create_cycle_reward(cycle_input(CycleType::Cycle, 0, 10)).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            svc.create_cycle_reward(cycle_input(CycleType::Cycle, 2, 0)).await,
            Err(Error::Validation(_))
        ));
        let product_reward = DateRewardInput {
            reward_date: NaiveDate::from_ymd_opt(2026, 6, 2).unwrap(),
            payload: RewardPayload::Product { product_id: missing, quantity: 1 },
            description: None,
        };
        assert!(matches!(svc.create_date_reward(product_reward).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_reward() {
        let svc = service(MockProducts::new());
        let id = Uuid::new_v4();
        assert!(matches!(
            svc.update_cycle_reward(id, cycle_input(CycleType::Cycle, 2, 5)).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(svc.delete_date_reward(id).await, Err(Error::NotFound(_))));
    }
}
