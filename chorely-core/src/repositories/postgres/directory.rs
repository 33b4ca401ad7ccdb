// File: chorely-core/src/repositories/postgres/directory.rs
//
// Read-only views onto the collaborator-owned `users` and `products` tables.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use chorely_common::error::Error;
use chorely_common::models::{ProductInfo, Role};
use chorely_common::traits::{ProductCatalog, UserDirectory};

#[derive(Clone)]
pub struct PostgresUserDirectory {
    pub pool: Pool<Postgres>,
}

impl PostgresUserDirectory {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, Error> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = $1) AS present")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("present")?)
    }

    async fn role(&self, user_id: Uuid) -> Result<Option<Role>, Error> {
        let row = sqlx::query("SELECT role FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let role: String = r.try_get("role")?;
                Ok(Some(role.parse()?))
            }
            None => Ok(None),
        }
    }
}

#[derive(Clone)]
pub struct PostgresProductCatalog {
    pub pool: Pool<Postgres>,
}

impl PostgresProductCatalog {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PostgresProductCatalog {
    async fn get_product(&self, product_id: Uuid) -> Result<Option<ProductInfo>, Error> {
        let row = sqlx::query(
            r#"
            SELECT product_id, name, icon, description
            FROM products
            WHERE product_id = $1
            "#,
        )
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(r) = row {
            Ok(Some(ProductInfo {
                product_id: r.try_get("product_id")?,
                name: r.try_get("name")?,
                icon: r.try_get("icon")?,
                description: r.try_get("description")?,
            }))
        } else {
            Ok(None)
        }
    }
}
