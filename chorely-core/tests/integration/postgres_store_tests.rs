// File: chorely-core/tests/integration/postgres_store_tests.rs

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use chorely_core::clock::FixedClock;
use chorely_core::config::SettlementConfig;
use chorely_core::models::{
    ClaimOutcome, ClaimSource, DateRewardInput, DayLabel, LabelAction, LedgerReason, LuckyBoxInput,
    LuckyBoxItemInput, LuckyBoxPrize, PointType, Provenance, RewardPayload, Role,
};
use chorely_core::repositories::{PostgresProductCatalog, PostgresSettlementStore, PostgresUserDirectory};
use chorely_core::services::{
    BackpackService, ClaimService, DayClassifier, LedgerService, LuckyBoxService, RewardCatalogService,
    StreakService,
};
use chorely_core::test_utils::ScriptedRandom;
use chorely_core::test_utils::helpers::*;
use chorely_core::{Database, Error};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, day).unwrap()
}

struct PgServices {
    db: Database,
    clock: Arc<FixedClock>,
    ledger: LedgerService,
    streaks: StreakService,
    catalog: RewardCatalogService,
    claims: ClaimService,
    lucky_boxes: LuckyBoxService,
    backpack: BackpackService,
}

async fn services() -> Result<PgServices, Error> {
    let db = setup_test_database().await?;
    let config = SettlementConfig::default();
    // Noon UTC is afternoon in the default business zone, so the date holds.
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()));

    let store = Arc::new(PostgresSettlementStore::new(db.pool().clone()));
    let users = Arc::new(PostgresUserDirectory::new(db.pool().clone()));
    let products = Arc::new(PostgresProductCatalog::new(db.pool().clone()));

    let classifier = Arc::new(DayClassifier::new(store.clone(), clock.clone(), config.clone())?);
    Ok(PgServices {
        ledger: LedgerService::new(store.clone(), users.clone()),
        streaks: StreakService::new(store.clone(), clock.clone(), config.clone(), classifier)?,
        catalog: RewardCatalogService::new(store.clone(), products.clone()),
        claims: ClaimService::new(store.clone(), clock.clone(), config)?,
        lucky_boxes: LuckyBoxService::new(
            store.clone(),
            products.clone(),
            clock.clone(),
            Arc::new(ScriptedRandom::new()),
        ),
        backpack: BackpackService::new(store, products, users),
        clock,
        db,
    })
}

#[tokio::test]
#[ignore]
async fn test_ledger_round_trip() -> Result<(), Error> {
    let s = services().await?;
    let kid = seed_user(s.db.pool(), "kid", Role::Member).await?;
    let sibling = seed_user(s.db.pool(), "sibling", Role::Member).await?;
    let parent = seed_user(s.db.pool(), "parent", Role::Admin).await?;

    s.ledger.credit(kid, PointType::Coin, 120, LedgerReason::Adjustment, None).await?;
    let receipt = s.ledger.transfer(kid, sibling, PointType::Coin, 20).await?;
    assert_eq!(receipt.from_balance, 100);
    assert_eq!(receipt.to_balance, 20);

    assert!(matches!(
        s.ledger.transfer(kid, parent, PointType::Coin, 1).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        s.ledger.debit(kid, PointType::Coin, 500, LedgerReason::Adjustment, None).await,
        Err(Error::InsufficientFunds { .. })
    ));

    let history = s.ledger.history(kid, Some(PointType::Coin), 10).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].reason, LedgerReason::TransferOut);
    assert_eq!(history[0].counterparty_id, Some(sibling));
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_streak_and_claim_on_postgres() -> Result<(), Error> {
    let s = services().await?;
    let kid = seed_user(s.db.pool(), "kid", Role::Member).await?;

    s.catalog
        .create_date_reward(DateRewardInput {
            reward_date: d(3),
            payload: RewardPayload::Points { point_type: PointType::Coin, amount: 15 },
            description: None,
        })
        .await?;
    let dup = s
        .catalog
        .create_date_reward(DateRewardInput {
            reward_date: d(3),
            payload: RewardPayload::Points { point_type: PointType::Coin, amount: 99 },
            description: None,
        })
        .await;
    assert!(matches!(dup, Err(Error::Conflict(_))));

    s.streaks.complete_day(kid).await?;
    s.clock.advance(chrono::Duration::days(2));
    s.streaks.label_day(kid, d(2), LabelAction::Add, DayLabel::Frozen, Role::Member).await?;
    let state = s.streaks.complete_day(kid).await?;
    assert_eq!(state.streak_days, 2);

    let first = s.claims.claim(kid, "date:2026-05-03", ClaimSource::DateReward).await?;
    assert!(matches!(first, ClaimOutcome::Claimed { .. }));
    let again = s.claims.claim(kid, "date:2026-05-03", ClaimSource::DateReward).await?;
    assert_eq!(again, ClaimOutcome::AlreadyClaimed);
    assert_eq!(s.ledger.balance(kid, PointType::Coin).await?, 15);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_lucky_box_product_draw_on_postgres() -> Result<(), Error> {
    let s = services().await?;
    let kid = seed_user(s.db.pool(), "kid", Role::Member).await?;
    let sibling = seed_user(s.db.pool(), "sibling", Role::Member).await?;
    let yoyo = seed_product(s.db.pool(), "Yo-yo").await?;

    s.ledger.credit(kid, PointType::Coin, 30, LedgerReason::Adjustment, None).await?;
    let chest = s
        .lucky_boxes
        .create_box(LuckyBoxInput {
            name: "Toy chest".to_string(),
            description: None,
            cost_point_type: PointType::Coin,
            cost_amount: 10,
            is_active: true,
            is_hidden: false,
            items: vec![LuckyBoxItemInput { prize: LuckyBoxPrize::Product { product_id: yoyo }, probability: 1.0 }],
        })
        .await?;

    let result = s.lucky_boxes.redeem(kid, chest.lucky_box.box_id).await?;
    assert_eq!(result.new_balance, 20);
    assert_eq!(s.lucky_boxes.history(kid, 5).await?.len(), 1);

    s.backpack.transfer(kid, sibling, yoyo, 1).await?;
    assert!(s.backpack.list(kid).await?.is_empty());
    let theirs = s.backpack.list(sibling).await?;
    assert_eq!(theirs[0].provenances, vec![Provenance::Transfer]);

    let missing = s.backpack.consume(sibling, Uuid::new_v4(), 1).await;
    assert!(missing.is_err());
    Ok(())
}
