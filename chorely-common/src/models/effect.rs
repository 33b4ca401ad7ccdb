// File: chorely-common/src/models/effect.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::points::PointType;

/// A time-bounded multiplier on point awards of one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialEffect {
    pub effect_id: Uuid,
    pub user_id: Uuid,
    pub point_type: PointType,
    pub multiplier: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SpecialEffect {
    /// Both bounds are inclusive.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.start_time <= at && at <= self.end_time
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveMultiplier {
    pub multiplier: f64,
    pub expiry_time: DateTime<Utc>,
}
