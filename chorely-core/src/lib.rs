// src/lib.rs

pub mod db;
pub mod clock;
pub mod config;
pub mod repositories;
pub mod services;
pub mod test_utils;

pub use db::Database;
pub use chorely_common::error::Error;
pub use chorely_common::models;
pub use clock::{BusinessCalendar, Clock, FixedClock, SystemClock};
pub use config::SettlementConfig;
