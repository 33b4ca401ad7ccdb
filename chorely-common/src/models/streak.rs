// File: chorely-common/src/models/streak.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    /// The single label a calendar day carries for a user.
    pub enum DayLabel {
        Streak => "streak",
        Missed => "missed",
        Frozen => "frozen",
    }
}

text_enum! {
    /// Who produced a day label.
    pub enum DayRecordSource {
        Completion => "completion",
        Manual => "manual",
        Backfill => "backfill",
    }
}

text_enum! {
    pub enum LabelAction {
        Add => "add",
        Remove => "remove",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub user_id: Uuid,
    pub record_date: NaiveDate,
    pub label: DayLabel,
    pub source: DayRecordSource,
    pub created_at: DateTime<Utc>,
}

impl DayRecord {
    pub fn new(user_id: Uuid, record_date: NaiveDate, label: DayLabel, source: DayRecordSource) -> Self {
        Self {
            user_id,
            record_date,
            label,
            source,
            created_at: Utc::now(),
        }
    }
}

/// Cached streak counters for one user, rewritten in the same transaction as
/// the day record change that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub user_id: Uuid,
    pub streak_days: i32,
    pub last_streak_date: Option<NaiveDate>,
    pub consecutive_missed_days: i32,
    /// First day of the current run. Cycle reward claims are scoped to it.
    pub streak_started_on: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl StreakState {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            streak_days: 0,
            last_streak_date: None,
            consecutive_missed_days: 0,
            streak_started_on: None,
            updated_at: Utc::now(),
        }
    }

    /// Counters only; `updated_at` is ignored.
    pub fn same_counters(&self, other: &StreakState) -> bool {
        self.streak_days == other.streak_days
            && self.last_streak_date == other.last_streak_date
            && self.consecutive_missed_days == other.consecutive_missed_days
            && self.streak_started_on == other.streak_started_on
    }
}

/// Response of the streak-state read: counters plus the labelled dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakOverview {
    pub streak_days: i32,
    pub last_streak_date: Option<NaiveDate>,
    pub consecutive_missed_days: i32,
    pub streak_started_on: Option<NaiveDate>,
    pub streak_dates: Vec<NaiveDate>,
    pub missed_dates: Vec<NaiveDate>,
    pub frozen_dates: Vec<NaiveDate>,
}

/// Outcome of a missed-day reconcile run. Each day is independent, so a run can
/// partially succeed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    pub inserted: Vec<NaiveDate>,
    pub already_labeled: usize,
    pub failed: Vec<NaiveDate>,
}
