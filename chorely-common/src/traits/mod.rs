pub mod repository_traits;
pub mod directory_traits;

pub use repository_traits::{
    BackpackTx, ClaimTx, DayRecordTx, EffectTx, LedgerTx, LuckyBoxTx, RewardCatalogTx, SettlementStore,
    SettlementTx,
};
pub use directory_traits::{ProductCatalog, UserDirectory};
