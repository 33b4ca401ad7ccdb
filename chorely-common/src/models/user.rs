use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    pub enum Role {
        Admin => "admin",
        Member => "member",
    }
}

/// Display metadata from the product catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_id: Uuid,
    pub name: String,
    pub icon: Option<String>,
    pub description: Option<String>,
}
