// File: chorely-core/src/services/effect_service.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, DurationRound, Utc};
use tracing::info;
use uuid::Uuid;

use chorely_common::models::{ActiveMultiplier, PointType, SpecialEffect};
use chorely_common::traits::{EffectTx, SettlementStore, SettlementTx};

use crate::Error;
use crate::clock::Clock;

/// The effect in force at `at`: among those whose window contains `at`, the
/// one ending last. Ties go to the most recently recorded.
pub fn select_effective(effects: &[SpecialEffect], at: DateTime<Utc>) -> Option<&SpecialEffect> {
    effects
        .iter()
        .filter(|e| e.is_active_at(at))
        .max_by(|a, b| a.end_time.cmp(&b.end_time).then(a.created_at.cmp(&b.created_at)))
}

/// `floor(base * multiplier)`.
pub fn apply_multiplier(base: i64, multiplier: f64) -> i64 {
    (base as f64 * multiplier).floor() as i64
}

/// Multiplier for `point_type` at `at`, read inside the caller's transaction.
pub async fn effective_multiplier_in(
    tx: &mut dyn SettlementTx,
    user_id: Uuid,
    point_type: PointType,
    at: DateTime<Utc>,
) -> Result<f64, Error> {
    let effects = tx.list_effects(user_id, Some(point_type)).await?;
    Ok(select_effective(&effects, at).map(|e| e.multiplier).unwrap_or(1.0))
}

pub struct EffectService {
    store: Arc<dyn SettlementStore>,
    clock: Arc<dyn Clock>,
}

impl EffectService {
    pub fn new(store: Arc<dyn SettlementStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Starts a multiplier now, lasting `duration_hours`. Existing effects are
    /// left alone; overlaps are settled when the multiplier is read.
    pub async fn record_effect(
        &self,
        user_id: Uuid,
        point_type: PointType,
        multiplier: f64,
        duration_hours: f64,
        description: Option<String>,
    ) -> Result<SpecialEffect, Error> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(Error::Validation(format!("multiplier must be positive, got {}", multiplier)));
        }
        if !duration_hours.is_finite() || duration_hours <= 0.0 {
            return Err(Error::Validation(format!(
                "duration must be positive, got {} hours",
                duration_hours
            )));
        }

        let now = self.clock.now();
        let start_time = now
            .duration_trunc(Duration::milliseconds(1))
            .map_err(|e| Error::Validation(e.to_string()))?;
        let millis = (duration_hours * 3_600_000.0).round() as i64;
        let end_time = Duration::try_milliseconds(millis)
            .and_then(|d| start_time.checked_add_signed(d))
            .ok_or_else(|| {
                Error::Validation(format!("duration of {} hours is out of range", duration_hours))
            })?;

        let effect = SpecialEffect {
            effect_id: Uuid::new_v4(),
            user_id,
            point_type,
            multiplier,
            start_time,
            end_time,
            description,
            created_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_effect(&effect).await?;
        tx.commit().await?;

        info!(
            "Recorded {}x {} effect for user {} until {}",
            multiplier, point_type, user_id, end_time
        );
        Ok(effect)
    }

    /// 1.0 when nothing is in force.
    pub async fn get_active_multiplier(
        &self,
        user_id: Uuid,
        point_type: PointType,
        at: Option<DateTime<Utc>>,
    ) -> Result<f64, Error> {
        let at = at.unwrap_or_else(|| self.clock.now());
        let mut tx = self.store.begin().await?;
        let multiplier = effective_multiplier_in(tx.as_mut(), user_id, point_type, at).await?;
        tx.commit().await?;
        Ok(multiplier)
    }

    /// The multiplier in force right now for each point type that has one.
    pub async fn active_multipliers(&self, user_id: Uuid) -> Result<BTreeMap<PointType, ActiveMultiplier>, Error> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let effects = tx.list_effects(user_id, None).await?;
        tx.commit().await?;

        let mut out = BTreeMap::new();
        for pt in PointType::ALL {
            let of_type: Vec<SpecialEffect> = effects.iter().filter(|e| e.point_type == *pt).cloned().collect();
            if let Some(e) = select_effective(&of_type, now) {
                out.insert(
                    *pt,
                    ActiveMultiplier {
                        multiplier: e.multiplier,
                        expiry_time: e.end_time,
                    },
                );
            }
        }
        Ok(out)
    }

    /// Deletes effects that ended before `before`. Returns how many went.
    pub async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let mut tx = self.store.begin().await?;
        let removed = tx.delete_effects_ended_before(before).await?;
        tx.commit().await?;
        if removed > 0 {
            info!("Purged {} expired effects", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::FixedClock;
    use crate::repositories::MemoryStore;

    fn effect(multiplier: f64, start_h: i64, end_h: i64) -> SpecialEffect {
        let base = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        SpecialEffect {
            effect_id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            point_type: PointType::Coin,
            multiplier,
            start_time: base + Duration::hours(start_h),
            end_time: base + Duration::hours(end_h),
            description: None,
            created_at: base,
        }
    }

    #[test]
    fn test_latest_ending_effect_wins() {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 5, 0, 0).unwrap();
        let effects = vec![effect(3.0, 0, 6), effect(1.5, 4, 10), effect(9.0, 0, 2)];
        assert_eq!(select_effective(&effects, at).map(|e| e.multiplier), Some(1.5));
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let e = vec![effect(2.0, 1, 2)];
        let base = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        assert!(select_effective(&e, base + Duration::hours(1)).is_some());
        assert!(select_effective(&e, base + Duration::hours(2)).is_some());
        assert!(select_effective(&e, base + Duration::hours(2) + Duration::milliseconds(1)).is_none());
    }

    #[test]
    fn test_apply_multiplier_floors() {
        assert_eq!(apply_multiplier(50, 1.5), 75);
        assert_eq!(apply_multiplier(7, 1.5), 10);
        assert_eq!(apply_multiplier(3, 0.5), 1);
        assert_eq!(apply_multiplier(10, 1.0), 10);
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap()));
        let svc = EffectService::new(Arc::new(MemoryStore::new()), clock.clone());
        let user = Uuid::new_v4();

        let e = svc.record_effect(user, PointType::Coin, 2.0, 1.5, None).await.unwrap();
        assert_eq!(e.end_time - e.start_time, Duration::minutes(90));
        assert_eq!(svc.get_active_multiplier(user, PointType::Coin, None).await.unwrap(), 2.0);
        assert_eq!(svc.get_active_multiplier(user, PointType::Diamond, None).await.unwrap(), 1.0);

        let active = svc.active_multipliers(user).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[&PointType::Coin].expiry_time, e.end_time);

        clock.advance(Duration::hours(2));
        assert!(svc.active_multipliers(user).await.unwrap().is_empty());
        assert_eq!(svc.purge_expired(clock.now()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_input() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let svc = EffectService::new(Arc::new(MemoryStore::new()), clock);
        let user = Uuid::new_v4();
        assert!(matches!(
            svc.record_effect(user, PointType::Coin, 0.0, 1.0, None).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            svc.record_effect(user, PointType::Coin, 2.0, -1.0, None).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_duration_past_calendar_range_is_rejected() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap()));
        let svc = EffectService::new(Arc::new(MemoryStore::new()), clock);
        let user = Uuid::new_v4();
        for hours in [1e10, 1e300] {
            assert!(matches!(
                svc.record_effect(user, PointType::Coin, 2.0, hours, None).await,
                Err(Error::Validation(_))
            ));
        }
        assert!(svc.active_multipliers(user).await.unwrap().is_empty());
    }
}
