//! chorely-server/src/context.rs
//!
//! Every settlement service, wired once at startup and shared by the handlers.

use std::sync::Arc;

use tracing::info;

use chorely_common::traits::{ProductCatalog, SettlementStore, UserDirectory};
use chorely_core::config::SettlementConfig;
use chorely_core::repositories::{PostgresProductCatalog, PostgresSettlementStore, PostgresUserDirectory};
use chorely_core::services::{
    BackpackService, ClaimService, DayClassifier, EffectService, LedgerService, LuckyBoxService, RandomSource,
    RewardCatalogService, StreakService, ThreadRngSource,
};
use chorely_core::{Clock, Database, Error, SystemClock};

pub struct AppContext {
    pub config: SettlementConfig,
    pub ledger: Arc<LedgerService>,
    pub streaks: Arc<StreakService>,
    pub catalog: Arc<RewardCatalogService>,
    pub claims: Arc<ClaimService>,
    pub lucky_boxes: Arc<LuckyBoxService>,
    pub effects: Arc<EffectService>,
    pub backpack: Arc<BackpackService>,
}

impl AppContext {
    /// Production wiring: Postgres for storage and collaborators, wall clock,
    /// thread RNG.
    pub fn postgres(db: &Database, config: SettlementConfig) -> Result<Self, Error> {
        info!("Wiring settlement services on Postgres (timezone={})", config.timezone);
        Self::from_parts(
            Arc::new(PostgresSettlementStore::new(db.pool().clone())),
            Arc::new(PostgresUserDirectory::new(db.pool().clone())),
            Arc::new(PostgresProductCatalog::new(db.pool().clone())),
            Arc::new(SystemClock),
            Arc::new(ThreadRngSource),
            config,
        )
    }

    pub fn from_parts(
        store: Arc<dyn SettlementStore>,
        users: Arc<dyn UserDirectory>,
        products: Arc<dyn ProductCatalog>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
        config: SettlementConfig,
    ) -> Result<Self, Error> {
        config.validate()?;

        let classifier = Arc::new(DayClassifier::new(store.clone(), clock.clone(), config.clone())?);
        let streaks = StreakService::new(store.clone(), clock.clone(), config.clone(), classifier)?;
        let claims = ClaimService::new(store.clone(), clock.clone(), config.clone())?;

        Ok(Self {
            ledger: Arc::new(LedgerService::new(store.clone(), users.clone())),
            streaks: Arc::new(streaks),
            catalog: Arc::new(RewardCatalogService::new(store.clone(), products.clone())),
            claims: Arc::new(claims),
            lucky_boxes: Arc::new(LuckyBoxService::new(store.clone(), products.clone(), clock.clone(), rng)),
            effects: Arc::new(EffectService::new(store.clone(), clock)),
            backpack: Arc::new(BackpackService::new(store, products, users)),
            config,
        })
    }
}
