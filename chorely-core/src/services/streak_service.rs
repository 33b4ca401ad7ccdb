// File: chorely-core/src/services/streak_service.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use chorely_common::models::{
    DayLabel, DayRecord, DayRecordSource, LabelAction, Role, StreakOverview, StreakState,
};
use chorely_common::traits::{DayRecordTx, SettlementStore, SettlementTx};

use crate::Error;
use crate::clock::{BusinessCalendar, Clock};
use crate::config::SettlementConfig;
use crate::services::day_classifier::DayClassifier;

/// Recomputes the streak counters from a user's full set of day labels.
///
/// Days are walked from the earliest record through the later of the latest
/// record and yesterday. A day without a label counts as missed, except today,
/// which is still open. A `frozen` day is a neutral gap: it neither extends
/// nor breaks the chain and leaves the miss counter alone.
pub fn derive_streak_state(
    user_id: Uuid,
    records: &[DayRecord],
    today: NaiveDate,
    missed_reset_threshold: i32,
) -> StreakState {
    let mut state = StreakState::empty(user_id);
    let labels: BTreeMap<NaiveDate, DayLabel> =
        records.iter().map(|r| (r.record_date, r.label)).collect();

    let (Some(first), Some(last_labeled)) = (labels.keys().next(), labels.keys().next_back()) else {
        return state;
    };
    let yesterday = today - Days::new(1);
    let last = (*last_labeled).max(yesterday);

    // Whether the next streak day continues the current run.
    let mut chain_intact = false;

    for day in first.iter_days().take_while(|d| *d <= last) {
        match labels.get(&day) {
            Some(DayLabel::Streak) => {
                if chain_intact && state.streak_days > 0 {
                    state.streak_days += 1;
                } else {
                    state.streak_days = 1;
                    state.streak_started_on = Some(day);
                }
                state.last_streak_date = Some(day);
                state.consecutive_missed_days = 0;
                chain_intact = true;
            }
            Some(DayLabel::Frozen) => {}
            None if day >= today => {}
            Some(DayLabel::Missed) | None => {
                chain_intact = false;
                state.consecutive_missed_days += 1;
                if state.consecutive_missed_days >= missed_reset_threshold {
                    state.streak_days = 0;
                    state.streak_started_on = None;
                }
            }
        }
    }

    state
}

/// Re-derives the user's counters and stores them, inside the caller's
/// transaction.
pub async fn refresh_state_in(
    tx: &mut dyn SettlementTx,
    user_id: Uuid,
    today: NaiveDate,
    missed_reset_threshold: i32,
) -> Result<StreakState, Error> {
    let records = tx.list_day_records(user_id, None, None).await?;
    let derived = derive_streak_state(user_id, &records, today, missed_reset_threshold);

    let unchanged = tx
        .get_streak_state(user_id)
        .await?
        .map(|cached| cached.same_counters(&derived))
        .unwrap_or(false);
    if !unchanged {
        let mut state = derived.clone();
        state.updated_at = Utc::now();
        tx.save_streak_state(&state).await?;
        debug!(
            "streak state for {} => days={} missed={}",
            user_id, state.streak_days, state.consecutive_missed_days
        );
        return Ok(state);
    }
    Ok(derived)
}

pub struct StreakService {
    store: Arc<dyn SettlementStore>,
    clock: Arc<dyn Clock>,
    calendar: BusinessCalendar,
    config: SettlementConfig,
    classifier: Arc<DayClassifier>,
}

impl StreakService {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        clock: Arc<dyn Clock>,
        config: SettlementConfig,
        classifier: Arc<DayClassifier>,
    ) -> Result<Self, Error> {
        let calendar = config.calendar()?;
        Ok(Self {
            store,
            clock,
            calendar,
            config,
            classifier,
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.calendar.today(self.clock.as_ref())
    }

    /// Current counters, derived from the stored labels as of today.
    pub async fn get_streak_state(&self, user_id: Uuid) -> Result<StreakState, Error> {
        let today = self.today();
        let mut tx = self.store.begin().await?;
        let state = refresh_state_in(tx.as_mut(), user_id, today, self.config.missed_reset_threshold).await?;
        tx.commit().await?;
        Ok(state)
    }

    /// Labels today `streak`. A `missed` or `frozen` label already on today is
    /// upgraded; calling it twice on the same day changes nothing.
    pub async fn complete_day(&self, user_id: Uuid) -> Result<StreakState, Error> {
        let today = self.today();
        let mut tx = self.store.begin().await?;

        let existing = tx.get_day_record(user_id, today).await?;
        if existing.as_ref().map(|r| r.label) != Some(DayLabel::Streak) {
            let record = DayRecord::new(user_id, today, DayLabel::Streak, DayRecordSource::Completion);
            tx.upsert_day_record(&record).await?;
        }

        let state = refresh_state_in(tx.as_mut(), user_id, today, self.config.missed_reset_threshold).await?;
        tx.commit().await?;

        info!(
            "User {} completed {} => streak_days={}",
            user_id, today, state.streak_days
        );
        Ok(state)
    }

    /// Explicit label change for one day.
    ///
    /// Dates must fall inside the backfill window. Only an admin may add a
    /// `streak` label to a past day; members earn streak days through
    /// [`complete_day`](Self::complete_day).
    pub async fn label_day(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        action: LabelAction,
        label: DayLabel,
        actor: Role,
    ) -> Result<StreakState, Error> {
        let today = self.today();
        if date > today {
            return Err(Error::Validation(format!("cannot label future date {}", date)));
        }
        let window_start = today - Days::new(self.config.backfill_window_days.max(0) as u64);
        if date < window_start {
            return Err(Error::Validation(format!(
                "{} is before the labeling window starting {}",
                date, window_start
            )));
        }
        if action == LabelAction::Add && label == DayLabel::Streak && date < today && actor != Role::Admin {
            return Err(Error::Forbidden(format!(
                "only an admin may mark past day {} as streak",
                date
            )));
        }

        let mut tx = self.store.begin().await?;
        let existing = tx.get_day_record(user_id, date).await?;

        match action {
            LabelAction::Add => {
                if label == DayLabel::Frozen {
                    if let Some(current) = existing.as_ref().map(|r| r.label) {
                        if current != DayLabel::Missed && current != DayLabel::Frozen {
                            return Err(Error::Validation(format!(
                                "{} is labeled {} and cannot be frozen",
                                date, current
                            )));
                        }
                    }
                }
                if existing.as_ref().map(|r| r.label) != Some(label) {
                    let record = DayRecord::new(user_id, date, label, DayRecordSource::Manual);
                    tx.upsert_day_record(&record).await?;
                }
            }
            LabelAction::Remove => {
                match existing {
                    Some(r) if r.label == label => {
                        tx.delete_day_record(user_id, date).await?;
                    }
                    _ => {
                        return Err(Error::NotFound(format!("no {} label on {}", label, date)));
                    }
                }
            }
        }

        let state = refresh_state_in(tx.as_mut(), user_id, today, self.config.missed_reset_threshold).await?;
        tx.commit().await?;

        info!("User {} day {} {} {}", user_id, date, action, label);
        Ok(state)
    }

    /// Reconciles missed days (bounded by the backfill window) and returns the
    /// counters together with every labeled date.
    pub async fn overview(&self, user_id: Uuid) -> Result<StreakOverview, Error> {
        let today = self.today();
        let window_start = today - Days::new(self.config.backfill_window_days as u64);

        let earliest = {
            let mut tx = self.store.begin().await?;
            let earliest = tx.earliest_day_record(user_id).await?;
            tx.commit().await?;
            earliest
        };

        if let Some(first) = earliest {
            let from = first.max(window_start);
            let yesterday = today - Days::new(1);
            if from <= yesterday {
                self.classifier.reconcile(user_id, from, yesterday).await?;
            }
        }

        let mut tx = self.store.begin().await?;
        let state = refresh_state_in(tx.as_mut(), user_id, today, self.config.missed_reset_threshold).await?;
        let records = tx.list_day_records(user_id, None, Some(today)).await?;
        tx.commit().await?;

        let mut overview = StreakOverview {
            streak_days: state.streak_days,
            last_streak_date: state.last_streak_date,
            consecutive_missed_days: state.consecutive_missed_days,
            streak_started_on: state.streak_started_on,
            streak_dates: Vec::new(),
            missed_dates: Vec::new(),
            frozen_dates: Vec::new(),
        };
        for r in records {
            match r.label {
                DayLabel::Streak => overview.streak_dates.push(r.record_date),
                DayLabel::Missed if r.record_date < today => overview.missed_dates.push(r.record_date),
                DayLabel::Missed => {}
                DayLabel::Frozen => overview.frozen_dates.push(r.record_date),
            }
        }
        Ok(overview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, day).unwrap()
    }

    fn rec(user: Uuid, day: u32, label: DayLabel) -> DayRecord {
        DayRecord::new(user, d(day), label, DayRecordSource::Manual)
    }

    #[test]
    fn test_consecutive_streak_days_count_up() {
        let u = Uuid::new_v4();
        let records: Vec<_> = (1..=4).map(|day| rec(u, day, DayLabel::Streak)).collect();
        let state = derive_streak_state(u, &records, d(5), 1);
        assert_eq!(state.streak_days, 4);
        assert_eq!(state.last_streak_date, Some(d(4)));
        assert_eq!(state.streak_started_on, Some(d(1)));
        assert_eq!(state.consecutive_missed_days, 0);
    }

    #[test]
    fn test_frozen_day_preserves_chain_without_extending_it() {
        let u = Uuid::new_v4();
        let records = vec![
            rec(u, 1, DayLabel::Streak),
            rec(u, 2, DayLabel::Streak),
            rec(u, 3, DayLabel::Frozen),
        ];
        let frozen = derive_streak_state(u, &records, d(4), 1);
        assert_eq!(frozen.streak_days, 2);

        let mut resumed = records.clone();
        resumed.push(rec(u, 4, DayLabel::Streak));
        let state = derive_streak_state(u, &resumed, d(4), 1);
        assert_eq!(state.streak_days, 3);
        assert_eq!(state.streak_started_on, Some(d(1)));
    }

    #[test]
    fn test_unlabeled_past_day_breaks_the_chain() {
        let u = Uuid::new_v4();
        let records = vec![rec(u, 1, DayLabel::Streak), rec(u, 3, DayLabel::Streak)];
        let state = derive_streak_state(u, &records, d(3), 1);
        assert_eq!(state.streak_days, 1);
        assert_eq!(state.streak_started_on, Some(d(3)));
    }

    #[test]
    fn test_miss_counter_and_threshold() {
        let u = Uuid::new_v4();
        let records = vec![
            rec(u, 1, DayLabel::Streak),
            rec(u, 2, DayLabel::Streak),
            rec(u, 3, DayLabel::Missed),
            rec(u, 4, DayLabel::Frozen),
        ];

        // Threshold 2: one miss keeps the count, the frozen day doesn't add a miss.
        let lenient = derive_streak_state(u, &records, d(5), 2);
        assert_eq!(lenient.streak_days, 2);
        assert_eq!(lenient.consecutive_missed_days, 1);

        let strict = derive_streak_state(u, &records, d(5), 1);
        assert_eq!(strict.streak_days, 0);
        assert_eq!(strict.streak_started_on, None);

        // Day 5 is yesterday from day 6 and unlabeled.
        let later = derive_streak_state(u, &records, d(6), 2);
        assert_eq!(later.consecutive_missed_days, 2);
        assert_eq!(later.streak_days, 0);
    }

    #[test]
    fn test_streak_after_miss_restarts_at_one() {
        let u = Uuid::new_v4();
        let records = vec![
            rec(u, 1, DayLabel::Streak),
            rec(u, 2, DayLabel::Streak),
            rec(u, 3, DayLabel::Missed),
            rec(u, 4, DayLabel::Streak),
        ];
        let state = derive_streak_state(u, &records, d(4), 3);
        assert_eq!(state.streak_days, 1);
        assert_eq!(state.consecutive_missed_days, 0);
        assert_eq!(state.streak_started_on, Some(d(4)));
    }

    #[test]
    fn test_open_today_is_not_a_miss() {
        let u = Uuid::new_v4();
        let records = vec![rec(u, 1, DayLabel::Streak), rec(u, 2, DayLabel::Streak)];
        let state = derive_streak_state(u, &records, d(3), 1);
        assert_eq!(state.streak_days, 2);
        assert_eq!(state.consecutive_missed_days, 0);
    }

    #[test]
    fn test_no_records_is_empty_state() {
        let u = Uuid::new_v4();
        let state = derive_streak_state(u, &[], d(3), 1);
        assert!(state.same_counters(&StreakState::empty(u)));
    }
}
