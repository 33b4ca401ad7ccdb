// File: chorely-core/src/services/claim_service.rs

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use chorely_common::models::{
    ClaimKey, ClaimOutcome, ClaimRecord, ClaimSource, ClaimableReward, ClaimableRewards, CycleType, DayLabel,
    GrantedReward, LedgerReason, Provenance, RewardPayload, StreakState,
};
use chorely_common::traits::{
    BackpackTx, ClaimTx, DayRecordTx, RewardCatalogTx, SettlementStore, SettlementTx,
};

use crate::Error;
use crate::clock::{BusinessCalendar, Clock};
use crate::config::SettlementConfig;
use crate::services::ledger_service::credit_in;
use crate::services::reward_catalog_service::resolve_cycle_rewards_from;
use crate::services::streak_service::refresh_state_in;

fn ledger_reason(source: ClaimSource) -> LedgerReason {
    match source {
        ClaimSource::Streak => LedgerReason::StreakReward,
        ClaimSource::StreakGoal => LedgerReason::StreakGoalReward,
        ClaimSource::DateReward => LedgerReason::DateReward,
    }
}

fn provenance(source: ClaimSource) -> Provenance {
    match source {
        ClaimSource::DateReward => Provenance::DateReward,
        ClaimSource::Streak | ClaimSource::StreakGoal => Provenance::StreakReward,
    }
}

/// Everything the user has earned as of `today`, claimed or not.
///
/// Cycle rewards come from the current streak day and are keyed to the run
/// that reached it. Date rewards come from every `streak` day inside the
/// backfill window.
async fn candidates_in(
    tx: &mut dyn SettlementTx,
    state: &StreakState,
    today: NaiveDate,
    window_days: i64,
) -> Result<Vec<(ClaimKey, ClaimableReward)>, Error> {
    let mut out = Vec::new();

    if let Some(run_started) = state.streak_started_on {
        let cycle_rewards = tx.list_cycle_rewards().await?;
        for reward in resolve_cycle_rewards_from(&cycle_rewards, state.streak_days) {
            let key = match reward.cycle_type {
                CycleType::Cycle => ClaimKey::Cycle {
                    cycle_days: reward.cycle_days,
                    run_started,
                    streak_day: state.streak_days,
                },
                CycleType::Specific => ClaimKey::Goal {
                    cycle_days: reward.cycle_days,
                    run_started,
                },
            };
            out.push((key, candidate(key, reward.reward_id, reward.payload, reward.description)));
        }
    }

    let window_start = today - Days::new(window_days.max(0) as u64);
    let streak_dates: BTreeSet<NaiveDate> = tx
        .list_day_records(state.user_id, Some(window_start), Some(today))
        .await?
        .into_iter()
        .filter(|r| r.label == DayLabel::Streak)
        .map(|r| r.record_date)
        .collect();
    if !streak_dates.is_empty() {
        for reward in tx.list_date_rewards(Some(window_start), Some(today)).await? {
            if streak_dates.contains(&reward.reward_date) {
                let key = ClaimKey::Date(reward.reward_date);
                out.push((key, candidate(key, reward.reward_id, reward.payload, reward.description)));
            }
        }
    }

    Ok(out)
}

fn candidate(key: ClaimKey, reward_id: Uuid, payload: RewardPayload, description: Option<String>) -> ClaimableReward {
    ClaimableReward {
        key: key.to_string(),
        source: key.source(),
        reward_id,
        payload,
        description,
    }
}

pub struct ClaimService {
    store: Arc<dyn SettlementStore>,
    clock: Arc<dyn Clock>,
    calendar: BusinessCalendar,
    config: SettlementConfig,
}

impl ClaimService {
    pub fn new(store: Arc<dyn SettlementStore>, clock: Arc<dyn Clock>, config: SettlementConfig) -> Result<Self, Error> {
        let calendar = config.calendar()?;
        Ok(Self {
            store,
            clock,
            calendar,
            config,
        })
    }

    pub async fn list_claimable(&self, user_id: Uuid) -> Result<ClaimableRewards, Error> {
        let today = self.calendar.today(self.clock.as_ref());
        let mut tx = self.store.begin().await?;

        let state = refresh_state_in(tx.as_mut(), user_id, today, self.config.missed_reset_threshold).await?;
        let candidates = candidates_in(tx.as_mut(), &state, today, self.config.backfill_window_days).await?;
        let claimed = tx.list_claims(user_id).await?;
        tx.commit().await?;

        let taken: HashSet<(&str, ClaimSource)> =
            claimed.iter().map(|c| (c.reward_key.as_str(), c.source)).collect();
        let available = candidates
            .into_iter()
            .map(|(_, c)| c)
            .filter(|c| !taken.contains(&(c.key.as_str(), c.source)))
            .collect();

        Ok(ClaimableRewards {
            claimed_rewards: claimed,
            available_rewards: available,
            current_streak_days: state.streak_days,
        })
    }

    /// Claims one reward. The claim record and the grant commit together; a
    /// second claim of the same key returns `AlreadyClaimed` and grants
    /// nothing.
    pub async fn claim(&self, user_id: Uuid, key: &str, source: ClaimSource) -> Result<ClaimOutcome, Error> {
        let parsed: ClaimKey = key.parse()?;
        if parsed.source() != source {
            return Err(Error::Validation(format!(
                "reward key '{}' cannot be claimed as {}",
                key, source
            )));
        }

        let today = self.calendar.today(self.clock.as_ref());
        let mut tx = self.store.begin().await?;

        let state = refresh_state_in(tx.as_mut(), user_id, today, self.config.missed_reset_threshold).await?;
        let candidates = candidates_in(tx.as_mut(), &state, today, self.config.backfill_window_days).await?;
        let Some((_, reward)) = candidates.into_iter().find(|(k, _)| *k == parsed) else {
            debug!("User {} is not eligible for {}", user_id, key);
            return Ok(ClaimOutcome::NotEligible {
                reason: format!("reward '{}' is not currently earned", key),
            });
        };

        let record = ClaimRecord {
            claim_id: Uuid::new_v4(),
            user_id,
            reward_key: parsed.to_string(),
            source,
            reward_id: reward.reward_id,
            claimed_at: Utc::now(),
        };
        if !tx.try_insert_claim(&record).await? {
            debug!("User {} already claimed {}", user_id, key);
            return Ok(ClaimOutcome::AlreadyClaimed);
        }

        let granted = match reward.payload {
            RewardPayload::Points { point_type, amount } => {
                let entry = credit_in(
                    tx.as_mut(),
                    user_id,
                    point_type,
                    amount,
                    ledger_reason(source),
                    Some(record.claim_id),
                )
                .await?;
                GrantedReward::Points {
                    point_type,
                    amount,
                    new_balance: entry.balance_after,
                }
            }
            RewardPayload::Product { product_id, quantity } => {
                tx.add_backpack_quantity(user_id, product_id, provenance(source), quantity)
                    .await?;
                GrantedReward::Product { product_id, quantity }
            }
        };
        tx.commit().await?;

        info!("User {} claimed {} ({})", user_id, record.reward_key, source);
        Ok(ClaimOutcome::Claimed { record, granted })
    }
}
