// File: chorely-common/src/models/mod.rs

/// Declares a fieldless enum that is stored as TEXT and travels over the wire
/// as the same lowercase string.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(crate::error::Error::Parse(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

pub mod points;
pub mod streak;
pub mod reward;
pub mod lucky_box;
pub mod effect;
pub mod backpack;
pub mod user;

pub use points::{LedgerReason, PointBalance, PointLedgerEntry, PointType};
pub use streak::{BackfillReport, DayLabel, DayRecord, DayRecordSource, LabelAction, StreakOverview, StreakState};
pub use reward::{
    ClaimKey, ClaimOutcome, ClaimRecord, ClaimSource, ClaimableReward, ClaimableRewards, CycleReward,
    CycleRewardInput, CycleType, DateReward, DateRewardInput, GrantedReward, RewardPayload,
};
pub use lucky_box::{
    DrawResult, DrawReward, LuckyBox, LuckyBoxInput, LuckyBoxItem, LuckyBoxItemInput, LuckyBoxPrize,
    LuckyBoxRedemption, LuckyBoxWithItems,
};
pub use effect::{ActiveMultiplier, SpecialEffect};
pub use backpack::{BackpackEntry, BackpackItem, Provenance};
pub use user::{ProductInfo, Role};
