// File: chorely-common/src/traits/directory_traits.rs
//
// Collaborators owned by the user/catalog CRUD layer. The settlement core only
// reads through these.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{ProductInfo, Role};

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, product_id: Uuid) -> Result<Option<ProductInfo>, Error>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, Error>;

    /// `None` when the user is unknown.
    async fn role(&self, user_id: Uuid) -> Result<Option<Role>, Error>;
}
