//! In-memory settlement store.
//!
//! Used by tests and local runs. A transaction takes the store's single async
//! lock, works on a copy of the state and writes the copy back on `commit`,
//! so transactions are fully serialized and a dropped transaction leaves no
//! trace.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use chorely_common::error::Error;
use chorely_common::models::{
    BackpackItem, ClaimRecord, CycleReward, CycleType, DateReward, DayRecord, LedgerReason, LuckyBox,
    LuckyBoxItem, LuckyBoxRedemption, PointBalance, PointLedgerEntry, PointType, ProductInfo, Provenance,
    Role, SpecialEffect, StreakState,
};
use chorely_common::traits::{
    BackpackTx, ClaimTx, DayRecordTx, EffectTx, LedgerTx, LuckyBoxTx, ProductCatalog, RewardCatalogTx,
    SettlementStore, SettlementTx, UserDirectory,
};

/// A write that should fail the next time it is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePoint {
    LedgerEntry(LedgerReason),
    DayRecordInsert(NaiveDate),
    BackpackGrant,
    Redemption,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    balances: HashMap<(Uuid, PointType), PointBalance>,
    ledger: Vec<PointLedgerEntry>,
    day_records: BTreeMap<(Uuid, NaiveDate), DayRecord>,
    streak_states: HashMap<Uuid, StreakState>,
    date_rewards: HashMap<Uuid, DateReward>,
    cycle_rewards: HashMap<Uuid, CycleReward>,
    claims: Vec<ClaimRecord>,
    boxes: HashMap<Uuid, LuckyBox>,
    box_items: HashMap<Uuid, Vec<LuckyBoxItem>>,
    redemptions: Vec<LuckyBoxRedemption>,
    effects: Vec<SpecialEffect>,
    backpack: Vec<BackpackItem>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<AsyncMutex<MemoryState>>,
    failures: Arc<Mutex<Vec<FailurePoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot failure.
    pub fn fail_next(&self, point: FailurePoint) {
        self.failures.lock().push(point);
    }

    /// Number of armed failures that have not fired yet.
    pub fn pending_failures(&self) -> usize {
        self.failures.lock().len()
    }
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn SettlementTx>, Error> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            failures: self.failures.clone(),
        }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    failures: Arc<Mutex<Vec<FailurePoint>>>,
}

impl MemoryTx {
    fn check(&self, point: FailurePoint) -> Result<(), Error> {
        let mut failures = self.failures.lock();
        if let Some(pos) = failures.iter().position(|p| *p == point) {
            failures.remove(pos);
            return Err(Error::Storage(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }
}

#[async_trait]
impl SettlementTx for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), Error> {
        self.check(FailurePoint::Commit)?;
        let MemoryTx { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_balance(&mut self, user_id: Uuid, point_type: PointType) -> Result<i64, Error> {
        let row = self
            .working
            .balances
            .entry((user_id, point_type))
            .or_insert_with(|| PointBalance {
                user_id,
                point_type,
                balance: 0,
                updated_at: Utc::now(),
            });
        Ok(row.balance)
    }

    async fn write_balance(&mut self, user_id: Uuid, point_type: PointType, balance: i64) -> Result<(), Error> {
        if balance < 0 {
            return Err(Error::Storage(format!("balance check violated for user {}", user_id)));
        }
        self.working.balances.insert(
            (user_id, point_type),
            PointBalance {
                user_id,
                point_type,
                balance,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn append_ledger_entry(&mut self, entry: &PointLedgerEntry) -> Result<(), Error> {
        self.check(FailurePoint::LedgerEntry(entry.reason))?;
        self.working.ledger.push(entry.clone());
        Ok(())
    }

    async fn list_balances(&mut self, user_id: Uuid) -> Result<Vec<PointBalance>, Error> {
        let mut list: Vec<PointBalance> = self
            .working
            .balances
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by_key(|b| b.point_type);
        Ok(list)
    }

    async fn list_ledger_entries(
        &mut self,
        user_id: Uuid,
        point_type: Option<PointType>,
        limit: i64,
    ) -> Result<Vec<PointLedgerEntry>, Error> {
        Ok(self
            .working
            .ledger
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .filter(|e| point_type.map_or(true, |pt| e.point_type == pt))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DayRecordTx for MemoryTx {
    async fn insert_day_record_if_absent(&mut self, record: &DayRecord) -> Result<bool, Error> {
        self.check(FailurePoint::DayRecordInsert(record.record_date))?;
        let key = (record.user_id, record.record_date);
        if self.working.day_records.contains_key(&key) {
            return Ok(false);
        }
        self.working.day_records.insert(key, record.clone());
        Ok(true)
    }

    async fn upsert_day_record(&mut self, record: &DayRecord) -> Result<(), Error> {
        self.working
            .day_records
            .insert((record.user_id, record.record_date), record.clone());
        Ok(())
    }

    async fn get_day_record(&mut self, user_id: Uuid, date: NaiveDate) -> Result<Option<DayRecord>, Error> {
        Ok(self.working.day_records.get(&(user_id, date)).cloned())
    }

    async fn delete_day_record(&mut self, user_id: Uuid, date: NaiveDate) -> Result<bool, Error> {
        Ok(self.working.day_records.remove(&(user_id, date)).is_some())
    }

    async fn list_day_records(
        &mut self,
        user_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DayRecord>, Error> {
        let lo = (user_id, from.unwrap_or(NaiveDate::MIN));
        let hi = (user_id, to.unwrap_or(NaiveDate::MAX));
        Ok(self
            .working
            .day_records
            .range(lo..=hi)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn earliest_day_record(&mut self, user_id: Uuid) -> Result<Option<NaiveDate>, Error> {
        Ok(self
            .working
            .day_records
            .range((user_id, NaiveDate::MIN)..=(user_id, NaiveDate::MAX))
            .next()
            .map(|((_, date), _)| *date))
    }

    async fn get_streak_state(&mut self, user_id: Uuid) -> Result<Option<StreakState>, Error> {
        Ok(self.working.streak_states.get(&user_id).cloned())
    }

    async fn save_streak_state(&mut self, state: &StreakState) -> Result<(), Error> {
        self.working.streak_states.insert(state.user_id, state.clone());
        Ok(())
    }
}

#[async_trait]
impl RewardCatalogTx for MemoryTx {
    async fn insert_date_reward(&mut self, reward: &DateReward) -> Result<(), Error> {
        if self
            .working
            .date_rewards
            .values()
            .any(|r| r.reward_date == reward.reward_date)
        {
            return Err(Error::Conflict(format!(
                "a reward already exists for {}",
                reward.reward_date
            )));
        }
        self.working.date_rewards.insert(reward.reward_id, reward.clone());
        Ok(())
    }

    async fn update_date_reward(&mut self, reward: &DateReward) -> Result<(), Error> {
        if self
            .working
            .date_rewards
            .values()
            .any(|r| r.reward_date == reward.reward_date && r.reward_id != reward.reward_id)
        {
            return Err(Error::Conflict(format!(
                "a reward already exists for {}",
                reward.reward_date
            )));
        }
        self.working.date_rewards.insert(reward.reward_id, reward.clone());
        Ok(())
    }

    async fn delete_date_reward(&mut self, reward_id: Uuid) -> Result<bool, Error> {
        Ok(self.working.date_rewards.remove(&reward_id).is_some())
    }

    async fn get_date_reward(&mut self, reward_id: Uuid) -> Result<Option<DateReward>, Error> {
        Ok(self.working.date_rewards.get(&reward_id).cloned())
    }

    async fn find_date_reward(&mut self, date: NaiveDate) -> Result<Option<DateReward>, Error> {
        Ok(self
            .working
            .date_rewards
            .values()
            .find(|r| r.reward_date == date)
            .cloned())
    }

    async fn list_date_rewards(
        &mut self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DateReward>, Error> {
        let mut list: Vec<DateReward> = self
            .working
            .date_rewards
            .values()
            .filter(|r| from.map_or(true, |f| r.reward_date >= f))
            .filter(|r| to.map_or(true, |t| r.reward_date <= t))
            .cloned()
            .collect();
        list.sort_by_key(|r| r.reward_date);
        Ok(list)
    }

    async fn insert_cycle_reward(&mut self, reward: &CycleReward) -> Result<(), Error> {
        if self
            .working
            .cycle_rewards
            .values()
            .any(|r| r.cycle_type == reward.cycle_type && r.cycle_days == reward.cycle_days)
        {
            return Err(Error::Conflict(format!(
                "a {} reward already exists for {} days",
                reward.cycle_type, reward.cycle_days
            )));
        }
        self.working.cycle_rewards.insert(reward.reward_id, reward.clone());
        Ok(())
    }

    async fn update_cycle_reward(&mut self, reward: &CycleReward) -> Result<(), Error> {
        if self.working.cycle_rewards.values().any(|r| {
            r.cycle_type == reward.cycle_type
                && r.cycle_days == reward.cycle_days
                && r.reward_id != reward.reward_id
        }) {
            return Err(Error::Conflict(format!(
                "a {} reward already exists for {} days",
                reward.cycle_type, reward.cycle_days
            )));
        }
        self.working.cycle_rewards.insert(reward.reward_id, reward.clone());
        Ok(())
    }

    async fn delete_cycle_reward(&mut self, reward_id: Uuid) -> Result<bool, Error> {
        Ok(self.working.cycle_rewards.remove(&reward_id).is_some())
    }

    async fn get_cycle_reward(&mut self, reward_id: Uuid) -> Result<Option<CycleReward>, Error> {
        Ok(self.working.cycle_rewards.get(&reward_id).cloned())
    }

    async fn find_cycle_reward(
        &mut self,
        cycle_type: CycleType,
        cycle_days: i32,
    ) -> Result<Option<CycleReward>, Error> {
        Ok(self
            .working
            .cycle_rewards
            .values()
            .find(|r| r.cycle_type == cycle_type && r.cycle_days == cycle_days)
            .cloned())
    }

    async fn list_cycle_rewards(&mut self) -> Result<Vec<CycleReward>, Error> {
        let mut list: Vec<CycleReward> = self.working.cycle_rewards.values().cloned().collect();
        list.sort_by_key(|r| (r.cycle_type, r.cycle_days));
        Ok(list)
    }
}

#[async_trait]
impl ClaimTx for MemoryTx {
    async fn try_insert_claim(&mut self, claim: &ClaimRecord) -> Result<bool, Error> {
        let exists = self.working.claims.iter().any(|c| {
            c.user_id == claim.user_id && c.reward_key == claim.reward_key && c.source == claim.source
        });
        if exists {
            return Ok(false);
        }
        self.working.claims.push(claim.clone());
        Ok(true)
    }

    async fn list_claims(&mut self, user_id: Uuid) -> Result<Vec<ClaimRecord>, Error> {
        Ok(self
            .working
            .claims
            .iter()
            .rev()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LuckyBoxTx for MemoryTx {
    async fn insert_lucky_box(&mut self, lucky_box: &LuckyBox) -> Result<(), Error> {
        self.working.boxes.insert(lucky_box.box_id, lucky_box.clone());
        Ok(())
    }

    async fn update_lucky_box(&mut self, lucky_box: &LuckyBox) -> Result<(), Error> {
        self.working.boxes.insert(lucky_box.box_id, lucky_box.clone());
        Ok(())
    }

    async fn delete_lucky_box(&mut self, box_id: Uuid) -> Result<bool, Error> {
        self.working.box_items.remove(&box_id);
        Ok(self.working.boxes.remove(&box_id).is_some())
    }

    async fn get_lucky_box(&mut self, box_id: Uuid) -> Result<Option<LuckyBox>, Error> {
        Ok(self.working.boxes.get(&box_id).cloned())
    }

    async fn list_lucky_boxes(&mut self) -> Result<Vec<LuckyBox>, Error> {
        let mut list: Vec<LuckyBox> = self.working.boxes.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.box_id.cmp(&b.box_id)));
        Ok(list)
    }

    async fn replace_lucky_box_items(&mut self, box_id: Uuid, items: &[LuckyBoxItem]) -> Result<(), Error> {
        self.working.box_items.insert(box_id, items.to_vec());
        Ok(())
    }

    async fn list_lucky_box_items(&mut self, box_id: Uuid) -> Result<Vec<LuckyBoxItem>, Error> {
        let mut items = self.working.box_items.get(&box_id).cloned().unwrap_or_default();
        items.sort_by_key(|i| (i.position, i.item_id));
        Ok(items)
    }

    async fn insert_redemption(&mut self, redemption: &LuckyBoxRedemption) -> Result<(), Error> {
        self.check(FailurePoint::Redemption)?;
        self.working.redemptions.push(redemption.clone());
        Ok(())
    }

    async fn list_redemptions(&mut self, user_id: Uuid, limit: i64) -> Result<Vec<LuckyBoxRedemption>, Error> {
        Ok(self
            .working
            .redemptions
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EffectTx for MemoryTx {
    async fn insert_effect(&mut self, effect: &SpecialEffect) -> Result<(), Error> {
        self.working.effects.push(effect.clone());
        Ok(())
    }

    async fn list_effects(
        &mut self,
        user_id: Uuid,
        point_type: Option<PointType>,
    ) -> Result<Vec<SpecialEffect>, Error> {
        Ok(self
            .working
            .effects
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| point_type.map_or(true, |pt| e.point_type == pt))
            .cloned()
            .collect())
    }

    async fn delete_effects_ended_before(&mut self, before: DateTime<Utc>) -> Result<u64, Error> {
        let len = self.working.effects.len();
        self.working.effects.retain(|e| e.end_time >= before);
        Ok((len - self.working.effects.len()) as u64)
    }
}

#[async_trait]
impl BackpackTx for MemoryTx {
    async fn add_backpack_quantity(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
        provenance: Provenance,
        quantity: i32,
    ) -> Result<i32, Error> {
        self.check(FailurePoint::BackpackGrant)?;
        let now = Utc::now();
        if let Some(row) = self
            .working
            .backpack
            .iter_mut()
            .find(|b| b.user_id == user_id && b.product_id == product_id && b.provenance == provenance)
        {
            row.quantity += quantity;
            row.updated_at = now;
            return Ok(row.quantity);
        }
        self.working.backpack.push(BackpackItem {
            user_id,
            product_id,
            provenance,
            quantity,
            updated_at: now,
        });
        Ok(quantity)
    }

    async fn set_backpack_quantity(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
        provenance: Provenance,
        quantity: i32,
    ) -> Result<(), Error> {
        let matches =
            |b: &BackpackItem| b.user_id == user_id && b.product_id == product_id && b.provenance == provenance;
        if quantity <= 0 {
            self.working.backpack.retain(|b| !matches(b));
            return Ok(());
        }
        match self.working.backpack.iter_mut().find(|b| matches(b)) {
            Some(row) => {
                row.quantity = quantity;
                row.updated_at = Utc::now();
            }
            None => self.working.backpack.push(BackpackItem {
                user_id,
                product_id,
                provenance,
                quantity,
                updated_at: Utc::now(),
            }),
        }
        Ok(())
    }

    async fn list_backpack(&mut self, user_id: Uuid) -> Result<Vec<BackpackItem>, Error> {
        Ok(self
            .working
            .backpack
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Users and products held in memory, for local runs and tests.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    users: Arc<Mutex<HashMap<Uuid, Role>>>,
    products: Arc<Mutex<HashMap<Uuid, ProductInfo>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, role: Role) -> Uuid {
        let user_id = Uuid::new_v4();
        self.users.lock().insert(user_id, role);
        user_id
    }

    pub fn add_product(&self, name: &str, icon: Option<&str>) -> ProductInfo {
        let product = ProductInfo {
            product_id: Uuid::new_v4(),
            name: name.to_string(),
            icon: icon.map(String::from),
            description: None,
        };
        self.products.lock().insert(product.product_id, product.clone());
        product
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, Error> {
        Ok(self.users.lock().contains_key(&user_id))
    }

    async fn role(&self, user_id: Uuid) -> Result<Option<Role>, Error> {
        Ok(self.users.lock().get(&user_id).copied())
    }
}

#[async_trait]
impl ProductCatalog for MemoryDirectory {
    async fn get_product(&self, product_id: Uuid) -> Result<Option<ProductInfo>, Error> {
        Ok(self.products.lock().get(&product_id).cloned())
    }
}
