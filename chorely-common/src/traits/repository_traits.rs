// File: chorely-common/src/traits/repository_traits.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    BackpackItem, ClaimRecord, CycleReward, CycleType, DateReward, DayRecord, LuckyBox, LuckyBoxItem,
    LuckyBoxRedemption, PointBalance, PointLedgerEntry, PointType, Provenance, SpecialEffect,
    StreakState,
};

/// Entry point of the settlement store. Every read and write goes through a
/// transaction; dropping a transaction without `commit` rolls it back.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn SettlementTx>, Error>;
}

/// One open transaction against the settlement tables.
#[async_trait]
pub trait SettlementTx:
    LedgerTx + DayRecordTx + RewardCatalogTx + ClaimTx + LuckyBoxTx + EffectTx + BackpackTx + Send
{
    async fn commit(self: Box<Self>) -> Result<(), Error>;
}

#[async_trait]
pub trait LedgerTx: Send {
    /// Returns the current balance and holds the row until the transaction
    /// ends. Creates a zero row when the pair has never been touched.
    async fn lock_balance(&mut self, user_id: Uuid, point_type: PointType) -> Result<i64, Error>;

    async fn write_balance(&mut self, user_id: Uuid, point_type: PointType, balance: i64) -> Result<(), Error>;

    async fn append_ledger_entry(&mut self, entry: &PointLedgerEntry) -> Result<(), Error>;

    async fn list_balances(&mut self, user_id: Uuid) -> Result<Vec<PointBalance>, Error>;

    /// Newest first.
    async fn list_ledger_entries(
        &mut self,
        user_id: Uuid,
        point_type: Option<PointType>,
        limit: i64,
    ) -> Result<Vec<PointLedgerEntry>, Error>;
}

#[async_trait]
pub trait DayRecordTx: Send {
    /// Inserts unless the (user, date) already carries a label. Returns whether
    /// a row was written.
    async fn insert_day_record_if_absent(&mut self, record: &DayRecord) -> Result<bool, Error>;

    /// Inserts or replaces the label for (user, date).
    async fn upsert_day_record(&mut self, record: &DayRecord) -> Result<(), Error>;

    async fn get_day_record(&mut self, user_id: Uuid, date: NaiveDate) -> Result<Option<DayRecord>, Error>;

    async fn delete_day_record(&mut self, user_id: Uuid, date: NaiveDate) -> Result<bool, Error>;

    /// Inclusive bounds, ordered by date.
    async fn list_day_records(
        &mut self,
        user_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DayRecord>, Error>;

    async fn earliest_day_record(&mut self, user_id: Uuid) -> Result<Option<NaiveDate>, Error>;

    async fn get_streak_state(&mut self, user_id: Uuid) -> Result<Option<StreakState>, Error>;

    async fn save_streak_state(&mut self, state: &StreakState) -> Result<(), Error>;
}

#[async_trait]
pub trait RewardCatalogTx: Send {
    /// Fails with `Error::Conflict` when the date already has a reward.
    async fn insert_date_reward(&mut self, reward: &DateReward) -> Result<(), Error>;
    async fn update_date_reward(&mut self, reward: &DateReward) -> Result<(), Error>;
    async fn delete_date_reward(&mut self, reward_id: Uuid) -> Result<bool, Error>;
    async fn get_date_reward(&mut self, reward_id: Uuid) -> Result<Option<DateReward>, Error>;
    async fn find_date_reward(&mut self, date: NaiveDate) -> Result<Option<DateReward>, Error>;
    async fn list_date_rewards(
        &mut self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DateReward>, Error>;

    /// Fails with `Error::Conflict` when (cycle_type, cycle_days) is taken.
    async fn insert_cycle_reward(&mut self, reward: &CycleReward) -> Result<(), Error>;
    async fn update_cycle_reward(&mut self, reward: &CycleReward) -> Result<(), Error>;
    async fn delete_cycle_reward(&mut self, reward_id: Uuid) -> Result<bool, Error>;
    async fn get_cycle_reward(&mut self, reward_id: Uuid) -> Result<Option<CycleReward>, Error>;
    async fn find_cycle_reward(
        &mut self,
        cycle_type: CycleType,
        cycle_days: i32,
    ) -> Result<Option<CycleReward>, Error>;
    async fn list_cycle_rewards(&mut self) -> Result<Vec<CycleReward>, Error>;
}

#[async_trait]
pub trait ClaimTx: Send {
    /// Atomic check-and-insert on the (user, key, source) unique constraint.
    /// Returns false when the claim already exists.
    async fn try_insert_claim(&mut self, claim: &ClaimRecord) -> Result<bool, Error>;

    /// Newest first.
    async fn list_claims(&mut self, user_id: Uuid) -> Result<Vec<ClaimRecord>, Error>;
}

#[async_trait]
pub trait LuckyBoxTx: Send {
    async fn insert_lucky_box(&mut self, lucky_box: &LuckyBox) -> Result<(), Error>;
    async fn update_lucky_box(&mut self, lucky_box: &LuckyBox) -> Result<(), Error>;
    /// Removes the box and its items.
    async fn delete_lucky_box(&mut self, box_id: Uuid) -> Result<bool, Error>;
    async fn get_lucky_box(&mut self, box_id: Uuid) -> Result<Option<LuckyBox>, Error>;
    async fn list_lucky_boxes(&mut self) -> Result<Vec<LuckyBox>, Error>;

    async fn replace_lucky_box_items(&mut self, box_id: Uuid, items: &[LuckyBoxItem]) -> Result<(), Error>;
    /// Ordered by (position, item_id).
    async fn list_lucky_box_items(&mut self, box_id: Uuid) -> Result<Vec<LuckyBoxItem>, Error>;

    async fn insert_redemption(&mut self, redemption: &LuckyBoxRedemption) -> Result<(), Error>;
    /// Newest first.
    async fn list_redemptions(&mut self, user_id: Uuid, limit: i64) -> Result<Vec<LuckyBoxRedemption>, Error>;
}

#[async_trait]
pub trait EffectTx: Send {
    async fn insert_effect(&mut self, effect: &SpecialEffect) -> Result<(), Error>;

    async fn list_effects(
        &mut self,
        user_id: Uuid,
        point_type: Option<PointType>,
    ) -> Result<Vec<SpecialEffect>, Error>;

    async fn delete_effects_ended_before(&mut self, before: DateTime<Utc>) -> Result<u64, Error>;
}

#[async_trait]
pub trait BackpackTx: Send {
    /// Adds `quantity` to the (user, product, provenance) row, creating it if
    /// needed. Returns the row's new quantity.
    async fn add_backpack_quantity(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
        provenance: Provenance,
        quantity: i32,
    ) -> Result<i32, Error>;

    /// A quantity of zero removes the row.
    async fn set_backpack_quantity(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
        provenance: Provenance,
        quantity: i32,
    ) -> Result<(), Error>;

    /// Oldest rows first.
    async fn list_backpack(&mut self, user_id: Uuid) -> Result<Vec<BackpackItem>, Error>;
}
