// File: chorely-common/src/models/points.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    /// The three point currencies a user can hold.
    pub enum PointType {
        Coin => "coin",
        Diamond => "diamond",
        Energy => "energy",
    }
}

impl PointType {
    /// Name used by the reward catalog's `reward_type` column.
    pub fn reward_type(&self) -> &'static str {
        match self {
            PointType::Coin => "coins",
            PointType::Diamond => "diamonds",
            PointType::Energy => "energy",
        }
    }

    pub fn from_reward_type(s: &str) -> Option<PointType> {
        match s {
            "coins" => Some(PointType::Coin),
            "diamonds" => Some(PointType::Diamond),
            "energy" => Some(PointType::Energy),
            _ => None,
        }
    }
}

text_enum! {
    /// Why a ledger entry was written.
    pub enum LedgerReason {
        LuckyBoxCost => "lucky_box_cost",
        LuckyBoxWin => "lucky_box_win",
        StreakReward => "streak_reward",
        StreakGoalReward => "streak_goal_reward",
        DateReward => "date_reward",
        TransferOut => "transfer_out",
        TransferIn => "transfer_in",
        Adjustment => "adjustment",
    }
}

/// Cached balance for one (user, point type). Always equal to the
/// `balance_after` of the newest ledger entry for the same pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointBalance {
    pub user_id: Uuid,
    pub point_type: PointType,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

/// Immutable record of one balance change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointLedgerEntry {
    pub entry_id: Uuid,
    pub user_id: Uuid,
    pub point_type: PointType,
    pub delta: i64,
    pub balance_after: i64,
    pub reason: LedgerReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_ref: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
