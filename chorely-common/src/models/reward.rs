// File: chorely-common/src/models/reward.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::models::points::PointType;

/// What a reward hands out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardPayload {
    Points { point_type: PointType, amount: i64 },
    Product { product_id: Uuid, quantity: i32 },
}

impl RewardPayload {
    /// Value of the `reward_type` column: `coins|diamonds|energy|product`.
    pub fn reward_type(&self) -> &'static str {
        match self {
            RewardPayload::Points { point_type, .. } => point_type.reward_type(),
            RewardPayload::Product { .. } => "product",
        }
    }

    pub fn amount(&self) -> Option<i64> {
        match self {
            RewardPayload::Points { amount, .. } => Some(*amount),
            RewardPayload::Product { .. } => None,
        }
    }

    pub fn product_id(&self) -> Option<Uuid> {
        match self {
            RewardPayload::Product { product_id, .. } => Some(*product_id),
            RewardPayload::Points { .. } => None,
        }
    }

    pub fn quantity(&self) -> Option<i32> {
        match self {
            RewardPayload::Product { quantity, .. } => Some(*quantity),
            RewardPayload::Points { .. } => None,
        }
    }

    /// Rebuilds the payload from its storage columns.
    pub fn from_columns(
        reward_type: &str,
        amount: Option<i64>,
        product_id: Option<Uuid>,
        quantity: Option<i32>,
    ) -> Result<Self, Error> {
        if reward_type == "product" {
            let product_id = product_id
                .ok_or_else(|| Error::Parse("product reward without product_id".to_string()))?;
            return Ok(RewardPayload::Product {
                product_id,
                quantity: quantity.unwrap_or(1),
            });
        }
        let point_type = PointType::from_reward_type(reward_type)
            .ok_or_else(|| Error::Parse(format!("unknown reward_type '{}'", reward_type)))?;
        let amount = amount
            .ok_or_else(|| Error::Parse(format!("{} reward without amount", reward_type)))?;
        Ok(RewardPayload::Points { point_type, amount })
    }

    pub fn validate(&self) -> Result<(), Error> {
        match self {
            RewardPayload::Points { amount, .. } if *amount <= 0 => {
                Err(Error::Validation("reward amount must be positive".to_string()))
            }
            RewardPayload::Product { quantity, .. } if *quantity <= 0 => {
                Err(Error::Validation("reward quantity must be positive".to_string()))
            }
            _ => Ok(()),
        }
    }
}

text_enum! {
    /// `cycle` pays every N streak days, `specific` pays exactly on day N.
    pub enum CycleType {
        Cycle => "cycle",
        Specific => "specific",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateReward {
    pub reward_id: Uuid,
    pub reward_date: NaiveDate,
    pub payload: RewardPayload,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateRewardInput {
    pub reward_date: NaiveDate,
    pub payload: RewardPayload,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReward {
    pub reward_id: Uuid,
    pub cycle_type: CycleType,
    pub cycle_days: i32,
    pub payload: RewardPayload,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CycleRewardInput {
    pub cycle_type: CycleType,
    pub cycle_days: i32,
    pub payload: RewardPayload,
    #[serde(default)]
    pub description: Option<String>,
}

text_enum! {
    /// Which catalog a claim draws from.
    pub enum ClaimSource {
        Streak => "streak",
        DateReward => "date_reward",
        StreakGoal => "streak_goal",
    }
}

/// Identity of one grantable occurrence of a reward.
///
/// Text forms:
/// - `date:2026-10-16`
/// - `cycle:7@2026-10-01#14` (every-7-days reward reached on day 14 of the run started 2026-10-01)
/// - `goal:30@2026-10-01` (day-30 reward of the run started 2026-10-01)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimKey {
    Date(NaiveDate),
    Cycle {
        cycle_days: i32,
        run_started: NaiveDate,
        streak_day: i32,
    },
    Goal {
        cycle_days: i32,
        run_started: NaiveDate,
    },
}

impl ClaimKey {
    /// The only source a key of this shape may be claimed under.
    pub fn source(&self) -> ClaimSource {
        match self {
            ClaimKey::Date(_) => ClaimSource::DateReward,
            ClaimKey::Cycle { .. } => ClaimSource::Streak,
            ClaimKey::Goal { .. } => ClaimSource::StreakGoal,
        }
    }
}

impl fmt::Display for ClaimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimKey::Date(date) => write!(f, "date:{}", date.format("%Y-%m-%d")),
            ClaimKey::Cycle { cycle_days, run_started, streak_day } => write!(
                f,
                "cycle:{}@{}#{}",
                cycle_days,
                run_started.format("%Y-%m-%d"),
                streak_day
            ),
            ClaimKey::Goal { cycle_days, run_started } => {
                write!(f, "goal:{}@{}", cycle_days, run_started.format("%Y-%m-%d"))
            }
        }
    }
}

impl FromStr for ClaimKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || Error::Validation(format!("malformed reward key '{}'", s));
        let parse_date = |d: &str| NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|_| bad());
        let parse_days = |n: &str| n.parse::<i32>().ok().filter(|n| *n > 0).ok_or_else(bad);

        let (kind, rest) = s.split_once(':').ok_or_else(bad)?;
        match kind {
            "date" => Ok(ClaimKey::Date(parse_date(rest)?)),
            "cycle" => {
                let (days, tail) = rest.split_once('@').ok_or_else(bad)?;
                let (started, day) = tail.split_once('#').ok_or_else(bad)?;
                Ok(ClaimKey::Cycle {
                    cycle_days: parse_days(days)?,
                    run_started: parse_date(started)?,
                    streak_day: parse_days(day)?,
                })
            }
            "goal" => {
                let (days, started) = rest.split_once('@').ok_or_else(bad)?;
                Ok(ClaimKey::Goal {
                    cycle_days: parse_days(days)?,
                    run_started: parse_date(started)?,
                })
            }
            _ => Err(bad()),
        }
    }
}

/// Marks one (user, key, source) as already paid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub claim_id: Uuid,
    pub user_id: Uuid,
    pub reward_key: String,
    pub source: ClaimSource,
    pub reward_id: Uuid,
    pub claimed_at: DateTime<Utc>,
}

/// A reward the user could claim right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimableReward {
    pub key: String,
    pub source: ClaimSource,
    pub reward_id: Uuid,
    pub payload: RewardPayload,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimableRewards {
    pub claimed_rewards: Vec<ClaimRecord>,
    pub available_rewards: Vec<ClaimableReward>,
    pub current_streak_days: i32,
}

/// What a successful claim paid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GrantedReward {
    Points {
        point_type: PointType,
        amount: i64,
        new_balance: i64,
    },
    Product {
        product_id: Uuid,
        quantity: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClaimOutcome {
    Claimed {
        record: ClaimRecord,
        granted: GrantedReward,
    },
    AlreadyClaimed,
    NotEligible {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_cycle_key_carries_run_and_day() {
        let key: ClaimKey = "cycle:7@2026-10-01#14".parse().unwrap();
        assert_eq!(
            key,
            ClaimKey::Cycle {
                cycle_days: 7,
                run_started: date("2026-10-01"),
                streak_day: 14,
            }
        );
        assert_eq!(key.source(), ClaimSource::Streak);
        assert_eq!(key.to_string(), "cycle:7@2026-10-01#14");
    }

    #[test]
    fn test_key_sources() {
        let d: ClaimKey = "date:2026-02-14".parse().unwrap();
        assert_eq!(d.source(), ClaimSource::DateReward);
        let g: ClaimKey = "goal:30@2026-10-01".parse().unwrap();
        assert_eq!(g.source(), ClaimSource::StreakGoal);
    }

    #[test]
    fn test_malformed_keys_are_rejected() {
        for bad in [
            "",
            "date:",
            "date:2026-13-01",
            "cycle:7@2026-10-01",
            "cycle:0@2026-10-01#3",
            "goal:-5@2026-10-01",
            "goal:5",
            "bonus:5@2026-10-01",
        ] {
            assert!(
                matches!(bad.parse::<ClaimKey>(), Err(Error::Validation(_))),
                "accepted {:?}",
                bad
            );
        }
    }
}
