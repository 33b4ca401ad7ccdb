// File: chorely-core/tests/integration.rs
//
// Postgres-backed tests. They need a reachable server (see TEST_DATABASE_URL)
// and share one database, so run them with:
//
//     cargo test -p chorely-core --test integration -- --ignored --test-threads=1

mod integration {
    pub mod postgres_store_tests;
}
