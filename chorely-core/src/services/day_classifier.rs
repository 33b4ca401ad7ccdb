// File: chorely-core/src/services/day_classifier.rs

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::{debug, warn};
use uuid::Uuid;

use chorely_common::models::{BackfillReport, DayLabel, DayRecord, DayRecordSource};
use chorely_common::traits::{DayRecordTx, SettlementStore};

use crate::Error;
use crate::clock::{BusinessCalendar, Clock};
use crate::config::SettlementConfig;
use crate::services::streak_service::refresh_state_in;

/// Labels calendar days and materializes `missed` labels for past days that
/// were never labeled.
pub struct DayClassifier {
    store: Arc<dyn SettlementStore>,
    clock: Arc<dyn Clock>,
    calendar: BusinessCalendar,
    config: SettlementConfig,
}

impl DayClassifier {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        clock: Arc<dyn Clock>,
        config: SettlementConfig,
    ) -> Result<Self, Error> {
        let calendar = config.calendar()?;
        Ok(Self {
            store,
            clock,
            calendar,
            config,
        })
    }

    /// Inserts a `missed` label for every unlabeled day in `[from, to]` that is
    /// strictly before today. Every day runs in its own transaction together
    /// with the streak state rewrite; a day that fails is logged and skipped.
    pub async fn reconcile(&self, user_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<BackfillReport, Error> {
        let today = self.calendar.today(self.clock.as_ref());
        let mut report = BackfillReport::default();

        let Some(yesterday) = today.checked_sub_days(Days::new(1)) else {
            return Ok(report);
        };
        let last = to.min(yesterday);

        for day in from.iter_days().take_while(|d| *d <= last) {
            match self.backfill_day(user_id, day, today).await {
                Ok(true) => report.inserted.push(day),
                Ok(false) => report.already_labeled += 1,
                Err(e) => {
                    warn!("Backfill of {} for user {} failed: {}", day, user_id, e);
                    report.failed.push(day);
                }
            }
        }

        if !report.inserted.is_empty() || !report.failed.is_empty() {
            debug!(
                "Reconciled {}..={} for {}: inserted={} failed={}",
                from,
                last,
                user_id,
                report.inserted.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }

    async fn backfill_day(&self, user_id: Uuid, day: NaiveDate, today: NaiveDate) -> Result<bool, Error> {
        let mut tx = self.store.begin().await?;
        let record = DayRecord::new(user_id, day, DayLabel::Missed, DayRecordSource::Backfill);
        let inserted = tx.insert_day_record_if_absent(&record).await?;
        if inserted {
            refresh_state_in(tx.as_mut(), user_id, today, self.config.missed_reset_threshold).await?;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// Reconciles the range, then returns its labels in date order. A `missed`
    /// label on today or later is left out.
    pub async fn classify(&self, user_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<Vec<DayRecord>, Error> {
        if from > to {
            return Err(Error::Validation(format!("empty range {}..={}", from, to)));
        }
        self.reconcile(user_id, from, to).await?;

        let today = self.calendar.today(self.clock.as_ref());
        let mut tx = self.store.begin().await?;
        let records = tx.list_day_records(user_id, Some(from), Some(to)).await?;
        tx.commit().await?;

        Ok(records
            .into_iter()
            .filter(|r| !(r.label == DayLabel::Missed && r.record_date >= today))
            .collect())
    }
}
