// File: chorely-core/src/test_utils/helpers.rs

use sqlx::{Connection, PgConnection, Pool, Postgres};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use chorely_common::models::Role;

use crate::Error;
use crate::db::Database;

/// Create the test database if it does not exist yet.
pub async fn ensure_test_database_exists() -> Result<(), Error> {
    let admin_url = std::env::var("DATABASE_ADMIN_URL")
        .unwrap_or_else(|_| "postgres://chorely@localhost/postgres".to_string());
    let mut conn = PgConnection::connect(&admin_url).await?;

    let test_db = "chorely_test";
    let create_db_sql = format!("CREATE DATABASE {test_db};");
    match sqlx::query(&create_db_sql).execute(&mut conn).await {
        Ok(_) => println!("Created test DB '{test_db}'."),
        // 42P04 => duplicate_database
        Err(e) if e.as_database_error().and_then(|d| d.code()).as_deref() == Some("42P04") => {}
        Err(e) => return Err(Error::Database(e)),
    }
    Ok(())
}

/// Pool on `TEST_DATABASE_URL`, else `postgres://chorely@localhost/chorely_test`.
pub async fn create_test_db_pool() -> Result<Pool<Postgres>, Error> {
    let url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgres://chorely@localhost/chorely_test".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;
    Ok(pool)
}

/// Wipes out test data so each test can start fresh.
pub async fn clean_database(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query(
        r#"
        TRUNCATE TABLE
            backpack_items,
            special_effects,
            lucky_box_redemptions,
            lucky_box_items,
            lucky_boxes,
            reward_claims,
            cycle_rewards,
            date_rewards,
            streak_states,
            day_records,
            point_ledger,
            point_balances,
            products,
            users
        RESTART IDENTITY CASCADE;
        "#,
    )
        .execute(pool)
        .await?;
    Ok(())
}

/// Returns a migrated, empty test DB handle.
pub async fn setup_test_database() -> Result<Database, Error> {
    ensure_test_database_exists().await?;

    let pool = create_test_db_pool().await?;
    let db = Database::from_pool(pool);
    db.migrate().await?;
    clean_database(db.pool()).await?;
    Ok(db)
}

/// Inserts a row into the collaborator-owned `users` table.
pub async fn seed_user(pool: &Pool<Postgres>, username: &str, role: Role) -> Result<Uuid, Error> {
    let user_id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (user_id, username, role) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(username)
        .bind(role.as_str())
        .execute(pool)
        .await?;
    Ok(user_id)
}

pub async fn seed_product(pool: &Pool<Postgres>, name: &str) -> Result<Uuid, Error> {
    let product_id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (product_id, name) VALUES ($1, $2)")
        .bind(product_id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(product_id)
}
