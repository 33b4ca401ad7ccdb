// File: chorely-common/src/models/lucky_box.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::models::points::PointType;
use crate::models::user::ProductInfo;

/// The prize behind one lucky box entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "item_type", rename_all = "snake_case")]
pub enum LuckyBoxPrize {
    Points { point_type: PointType, amount: i64 },
    Product { product_id: Uuid },
}

impl LuckyBoxPrize {
    /// Value of the `item_type` column.
    pub fn item_type(&self) -> &'static str {
        match self {
            LuckyBoxPrize::Points { .. } => "points",
            LuckyBoxPrize::Product { .. } => "product",
        }
    }

    pub fn from_columns(
        item_type: &str,
        point_type: Option<&str>,
        amount: Option<i64>,
        product_id: Option<Uuid>,
    ) -> Result<Self, Error> {
        match item_type {
            "points" => {
                let point_type = point_type
                    .ok_or_else(|| Error::Parse("points item without point_type".to_string()))?
                    .parse::<PointType>()?;
                let amount = amount
                    .ok_or_else(|| Error::Parse("points item without amount".to_string()))?;
                Ok(LuckyBoxPrize::Points { point_type, amount })
            }
            "product" => {
                let product_id = product_id
                    .ok_or_else(|| Error::Parse("product item without product_id".to_string()))?;
                Ok(LuckyBoxPrize::Product { product_id })
            }
            other => Err(Error::Parse(format!("unknown item_type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuckyBox {
    pub box_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub cost_point_type: PointType,
    pub cost_amount: i64,
    pub is_active: bool,
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuckyBoxItem {
    pub item_id: Uuid,
    pub box_id: Uuid,
    /// Draw order. Items are always walked by (position, item_id).
    pub position: i32,
    pub prize: LuckyBoxPrize,
    /// Relative weight. Weights need not sum to 100.
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LuckyBoxWithItems {
    #[serde(flatten)]
    pub lucky_box: LuckyBox,
    pub items: Vec<LuckyBoxItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LuckyBoxItemInput {
    pub prize: LuckyBoxPrize,
    pub probability: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LuckyBoxInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub cost_point_type: PointType,
    pub cost_amount: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_hidden: bool,
    pub items: Vec<LuckyBoxItemInput>,
}

fn default_true() -> bool {
    true
}

/// Immutable record of one draw. `prize` is the raw entry that was drawn,
/// before any multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuckyBoxRedemption {
    pub redemption_id: Uuid,
    pub user_id: Uuid,
    pub box_id: Uuid,
    pub item_id: Uuid,
    pub prize: LuckyBoxPrize,
    pub cost_point_type: PointType,
    pub cost_amount: i64,
    pub credited_amount: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reward_type", rename_all = "snake_case")]
pub enum DrawReward {
    Points {
        point_type: PointType,
        base_amount: i64,
        multiplier: f64,
        reward_amount: i64,
        balance_after: i64,
    },
    Product {
        product: ProductInfo,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawResult {
    pub redemption_id: Uuid,
    pub box_id: Uuid,
    pub item_id: Uuid,
    #[serde(flatten)]
    pub reward: DrawReward,
    pub cost_point_type: PointType,
    /// Balance of the cost currency once the draw has settled.
    pub new_balance: i64,
}
