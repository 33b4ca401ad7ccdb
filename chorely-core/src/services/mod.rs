// File: src/services/mod.rs

pub mod ledger_service;
pub mod day_classifier;
pub mod streak_service;
pub mod reward_catalog_service;
pub mod claim_service;
pub mod lucky_box_service;
pub mod effect_service;
pub mod backpack_service;

pub use ledger_service::{LedgerService, TransferReceipt};
pub use day_classifier::DayClassifier;
pub use streak_service::StreakService;
pub use reward_catalog_service::RewardCatalogService;
pub use claim_service::ClaimService;
pub use lucky_box_service::{LuckyBoxService, RandomSource, ThreadRngSource};
pub use effect_service::EffectService;
pub use backpack_service::BackpackService;
