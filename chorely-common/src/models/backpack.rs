// File: chorely-common/src/models/backpack.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    /// Where a backpack unit came from. Metadata only; every source shares
    /// one inventory.
    pub enum Provenance {
        LuckyBox => "lucky_box",
        StreakReward => "streak_reward",
        DateReward => "date_reward",
        Transfer => "transfer",
        Manual => "manual",
    }
}

/// One (user, product, provenance) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackpackItem {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub provenance: Provenance,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

/// Quantity per product summed over provenance rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackpackEntry {
    pub product_id: Uuid,
    pub quantity: i32,
    pub provenances: Vec<Provenance>,
}
