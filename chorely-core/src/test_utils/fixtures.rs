// File: chorely-core/src/test_utils/fixtures.rs
//
// Every service wired over the in-memory store, a pinned clock and a scripted
// random source.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;

use crate::clock::FixedClock;
use crate::config::SettlementConfig;
use crate::repositories::{MemoryDirectory, MemoryStore};
use crate::services::lucky_box_service::{RandomSource, ThreadRngSource};
use crate::services::{
    BackpackService, ClaimService, DayClassifier, EffectService, LedgerService, LuckyBoxService,
    RewardCatalogService, StreakService,
};
use crate::Error;

/// Returns queued values in order, then falls back to the thread RNG.
#[derive(Default)]
pub struct ScriptedRandom {
    queue: Mutex<VecDeque<f64>>,
}

impl ScriptedRandom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: f64) {
        self.queue.lock().push_back(value);
    }
}

impl RandomSource for ScriptedRandom {
    fn next_below(&self, upper: f64) -> f64 {
        match self.queue.lock().pop_front() {
            Some(v) => v.min(upper),
            None => ThreadRngSource.next_below(upper),
        }
    }
}

pub struct SettlementHarness {
    pub store: MemoryStore,
    pub directory: MemoryDirectory,
    pub clock: Arc<FixedClock>,
    pub rng: Arc<ScriptedRandom>,
    pub config: SettlementConfig,
    pub ledger: Arc<LedgerService>,
    pub classifier: Arc<DayClassifier>,
    pub streaks: Arc<StreakService>,
    pub catalog: Arc<RewardCatalogService>,
    pub claims: Arc<ClaimService>,
    pub lucky_boxes: Arc<LuckyBoxService>,
    pub effects: Arc<EffectService>,
    pub backpack: Arc<BackpackService>,
}

impl SettlementHarness {
    /// Clock pinned to noon, business time, on `today`.
    pub fn new(today: NaiveDate) -> Result<Self, Error> {
        Self::with_config(today, SettlementConfig::default())
    }

    pub fn with_config(today: NaiveDate, config: SettlementConfig) -> Result<Self, Error> {
        let calendar = config.calendar()?;
        let noon = today
            .and_hms_opt(12, 0, 0)
            .and_then(|dt| calendar.timezone().from_local_datetime(&dt).single())
            .ok_or_else(|| Error::Validation(format!("no local noon on {}", today)))?
            .with_timezone(&Utc);

        let store = MemoryStore::new();
        let directory = MemoryDirectory::new();
        let clock = Arc::new(FixedClock::new(noon));
        let rng = Arc::new(ScriptedRandom::new());

        let shared_store: Arc<MemoryStore> = Arc::new(store.clone());
        let shared_dir: Arc<MemoryDirectory> = Arc::new(directory.clone());

        let classifier = Arc::new(DayClassifier::new(shared_store.clone(), clock.clone(), config.clone())?);
        let streaks = Arc::new(StreakService::new(
            shared_store.clone(),
            clock.clone(),
            config.clone(),
            classifier.clone(),
        )?);

        Ok(Self {
            ledger: Arc::new(LedgerService::new(shared_store.clone(), shared_dir.clone())),
            catalog: Arc::new(RewardCatalogService::new(shared_store.clone(), shared_dir.clone())),
            claims: Arc::new(ClaimService::new(shared_store.clone(), clock.clone(), config.clone())?),
            lucky_boxes: Arc::new(LuckyBoxService::new(
                shared_store.clone(),
                shared_dir.clone(),
                clock.clone(),
                rng.clone(),
            )),
            effects: Arc::new(EffectService::new(shared_store.clone(), clock.clone())),
            backpack: Arc::new(BackpackService::new(shared_store.clone(), shared_dir.clone(), shared_dir)),
            classifier,
            streaks,
            store,
            directory,
            clock,
            rng,
            config,
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        use crate::clock::Clock;
        self.clock.now()
    }

    /// Moves the clock forward by whole days.
    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }

    pub fn today(&self) -> NaiveDate {
        self.streaks.today()
    }
}
