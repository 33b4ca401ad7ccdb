//! chorely-server/src/routes.rs
//!
//! HTTP surface of the settlement engine. Handlers check the caller, call one
//! service operation and serialize the result.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use chorely_core::models::{
    ActiveMultiplier, BackpackEntry, ClaimOutcome, ClaimSource, ClaimableRewards, CycleReward, CycleRewardInput,
    DateReward, DateRewardInput, DayLabel, DrawResult, LabelAction, LedgerReason, LuckyBoxInput,
    LuckyBoxRedemption, LuckyBoxWithItems, PointBalance, PointLedgerEntry, PointType, Provenance,
    SpecialEffect, StreakOverview, StreakState,
};
use chorely_core::Error;
use chorely_core::services::TransferReceipt;

use crate::context::AppContext;
use crate::error::ApiError;
use crate::identity::Caller;

type Ctx = State<Arc<AppContext>>;
type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(ctx: Arc<AppContext>) -> Router {
    let member = Router::new()
        .route("/users/{user_id}/streak-state", get(streak_state))
        .route("/users/{user_id}/day-labels", post(label_day))
        .route("/users/{user_id}/complete-today", post(complete_today))
        .route("/users/{user_id}/claimable-rewards", get(claimable_rewards))
        .route("/users/{user_id}/claims", post(claim_reward))
        .route("/users/{user_id}/lucky-boxes/{box_id}/redeem", post(redeem_box))
        .route("/users/{user_id}/lucky-box-redemptions", get(redemption_history))
        .route("/users/{user_id}/multipliers", get(multipliers))
        .route("/users/{user_id}/balances", get(balances))
        .route("/users/{user_id}/ledger", get(ledger_history))
        .route("/users/{user_id}/backpack", get(backpack))
        .route("/users/{user_id}/backpack/consume", post(consume_item))
        .route("/lucky-boxes", get(visible_boxes))
        .route("/transfers", post(transfer_points))
        .route("/backpack/transfers", post(transfer_items));

    let admin = Router::new()
        .route("/admin/date-rewards", get(list_date_rewards).post(create_date_reward))
        .route("/admin/date-rewards/{reward_id}", put(update_date_reward).delete(delete_date_reward))
        .route("/admin/cycle-rewards", get(list_cycle_rewards).post(create_cycle_reward))
        .route("/admin/cycle-rewards/{reward_id}", put(update_cycle_reward).delete(delete_cycle_reward))
        .route("/admin/lucky-boxes", get(list_all_boxes).post(create_box))
        .route("/admin/lucky-boxes/{box_id}", get(get_box).put(update_box).delete(delete_box))
        .route("/admin/users/{user_id}/effects", post(record_effect))
        .route("/admin/users/{user_id}/points", post(adjust_points))
        .route("/admin/users/{user_id}/backpack", post(grant_item))
        .route("/admin/effects/purge", post(purge_effects));

    Router::new()
        .route("/health", get(health))
        .merge(member)
        .merge(admin)
        .with_state(ctx)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ------------------------------------------------------------------
// Streaks
// ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LabelRequest {
    pub date: NaiveDate,
    pub action: LabelAction,
    #[serde(rename = "type")]
    pub label: DayLabel,
}

async fn streak_state(State(ctx): Ctx, caller: Caller, Path(user_id): Path<Uuid>) -> ApiResult<StreakOverview> {
    caller.require_self_or_admin(user_id)?;
    Ok(Json(ctx.streaks.overview(user_id).await?))
}

async fn label_day(
    State(ctx): Ctx,
    caller: Caller,
    Path(user_id): Path<Uuid>,
    Json(req): Json<LabelRequest>,
) -> ApiResult<StreakState> {
    caller.require_self_or_admin(user_id)?;
    Ok(Json(ctx.streaks.label_day(user_id, req.date, req.action, req.label, caller.role).await?))
}

async fn complete_today(State(ctx): Ctx, caller: Caller, Path(user_id): Path<Uuid>) -> ApiResult<StreakState> {
    caller.require_self_or_admin(user_id)?;
    Ok(Json(ctx.streaks.complete_day(user_id).await?))
}

// ------------------------------------------------------------------
// Claims
// ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub key: String,
    pub source: ClaimSource,
}

async fn claimable_rewards(
    State(ctx): Ctx,
    caller: Caller,
    Path(user_id): Path<Uuid>,
) -> ApiResult<ClaimableRewards> {
    caller.require_self_or_admin(user_id)?;
    Ok(Json(ctx.claims.list_claimable(user_id).await?))
}

async fn claim_reward(
    State(ctx): Ctx,
    caller: Caller,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ClaimRequest>,
) -> ApiResult<ClaimOutcome> {
    caller.require_self(user_id)?;
    Ok(Json(ctx.claims.claim(user_id, &req.key, req.source).await?))
}

// ------------------------------------------------------------------
// Lucky boxes
// ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
    pub point_type: Option<PointType>,
}

async fn redeem_box(
    State(ctx): Ctx,
    caller: Caller,
    Path((user_id, box_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<DrawResult> {
    caller.require_self(user_id)?;
    Ok(Json(ctx.lucky_boxes.redeem(user_id, box_id).await?))
}

async fn redemption_history(
    State(ctx): Ctx,
    caller: Caller,
    Path(user_id): Path<Uuid>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<LuckyBoxRedemption>> {
    caller.require_self_or_admin(user_id)?;
    Ok(Json(ctx.lucky_boxes.history(user_id, q.limit.unwrap_or(50)).await?))
}

async fn visible_boxes(State(ctx): Ctx, caller: Caller) -> ApiResult<Vec<LuckyBoxWithItems>> {
    let boxes = if caller.is_admin() {
        ctx.lucky_boxes.list_all_boxes().await?
    } else {
        ctx.lucky_boxes.list_visible_boxes().await?
    };
    Ok(Json(boxes))
}

async fn list_all_boxes(State(ctx): Ctx, caller: Caller) -> ApiResult<Vec<LuckyBoxWithItems>> {
    caller.require_admin()?;
    Ok(Json(ctx.lucky_boxes.list_all_boxes().await?))
}

async fn get_box(State(ctx): Ctx, caller: Caller, Path(box_id): Path<Uuid>) -> ApiResult<LuckyBoxWithItems> {
    caller.require_admin()?;
    Ok(Json(ctx.lucky_boxes.get_box(box_id).await?))
}

async fn create_box(
    State(ctx): Ctx,
    caller: Caller,
    Json(input): Json<LuckyBoxInput>,
) -> Result<(StatusCode, Json<LuckyBoxWithItems>), ApiError> {
    caller.require_admin()?;
    Ok((StatusCode::CREATED, Json(ctx.lucky_boxes.create_box(input).await?)))
}

async fn update_box(
    State(ctx): Ctx,
    caller: Caller,
    Path(box_id): Path<Uuid>,
    Json(input): Json<LuckyBoxInput>,
) -> ApiResult<LuckyBoxWithItems> {
    caller.require_admin()?;
    Ok(Json(ctx.lucky_boxes.update_box(box_id, input).await?))
}

async fn delete_box(State(ctx): Ctx, caller: Caller, Path(box_id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    caller.require_admin()?;
    ctx.lucky_boxes.delete_box(box_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ------------------------------------------------------------------
// Points and effects
// ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub point_type: PointType,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub point_type: PointType,
    /// Signed: positive credits, negative debits.
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct EffectRequest {
    pub point_type: PointType,
    pub multiplier: f64,
    pub duration_hours: f64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PurgeRequest {
    pub before: Option<DateTime<Utc>>,
}

async fn multipliers(
    State(ctx): Ctx,
    caller: Caller,
    Path(user_id): Path<Uuid>,
) -> ApiResult<BTreeMap<PointType, ActiveMultiplier>> {
    caller.require_self_or_admin(user_id)?;
    Ok(Json(ctx.effects.active_multipliers(user_id).await?))
}

async fn balances(State(ctx): Ctx, caller: Caller, Path(user_id): Path<Uuid>) -> ApiResult<Vec<PointBalance>> {
    caller.require_self_or_admin(user_id)?;
    Ok(Json(ctx.ledger.balances(user_id).await?))
}

async fn ledger_history(
    State(ctx): Ctx,
    caller: Caller,
    Path(user_id): Path<Uuid>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<PointLedgerEntry>> {
    caller.require_self_or_admin(user_id)?;
    Ok(Json(ctx.ledger.history(user_id, q.point_type, q.limit.unwrap_or(50)).await?))
}

async fn transfer_points(
    State(ctx): Ctx,
    caller: Caller,
    Json(req): Json<TransferRequest>,
) -> ApiResult<TransferReceipt> {
    caller.require_self(req.from_user_id)?;
    Ok(Json(
        ctx.ledger
            .transfer(req.from_user_id, req.to_user_id, req.point_type, req.amount)
            .await?,
    ))
}

async fn adjust_points(
    State(ctx): Ctx,
    caller: Caller,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AdjustRequest>,
) -> ApiResult<Value> {
    caller.require_admin()?;
    let balance = if req.amount >= 0 {
        ctx.ledger
            .credit(user_id, req.point_type, req.amount, LedgerReason::Adjustment, None)
            .await?
    } else {
        let amount = req
            .amount
            .checked_neg()
            .ok_or_else(|| Error::Validation(format!("adjustment {} is out of range", req.amount)))?;
        ctx.ledger
            .debit(user_id, req.point_type, amount, LedgerReason::Adjustment, None)
            .await?
    };
    Ok(Json(json!({ "point_type": req.point_type, "balance": balance })))
}

async fn record_effect(
    State(ctx): Ctx,
    caller: Caller,
    Path(user_id): Path<Uuid>,
    Json(req): Json<EffectRequest>,
) -> Result<(StatusCode, Json<SpecialEffect>), ApiError> {
    caller.require_admin()?;
    let effect = ctx
        .effects
        .record_effect(user_id, req.point_type, req.multiplier, req.duration_hours, req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(effect)))
}

async fn purge_effects(State(ctx): Ctx, caller: Caller, Json(req): Json<PurgeRequest>) -> ApiResult<Value> {
    caller.require_admin()?;
    let removed = ctx.effects.purge_expired(req.before.unwrap_or_else(Utc::now)).await?;
    Ok(Json(json!({ "removed": removed })))
}

// ------------------------------------------------------------------
// Backpack
// ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct ItemTransferRequest {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

async fn backpack(State(ctx): Ctx, caller: Caller, Path(user_id): Path<Uuid>) -> ApiResult<Vec<BackpackEntry>> {
    caller.require_self_or_admin(user_id)?;
    Ok(Json(ctx.backpack.list(user_id).await?))
}

async fn consume_item(
    State(ctx): Ctx,
    caller: Caller,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ItemRequest>,
) -> ApiResult<Value> {
    caller.require_self_or_admin(user_id)?;
    let remaining = ctx.backpack.consume(user_id, req.product_id, req.quantity).await?;
    Ok(Json(json!({ "product_id": req.product_id, "remaining": remaining })))
}

async fn transfer_items(
    State(ctx): Ctx,
    caller: Caller,
    Json(req): Json<ItemTransferRequest>,
) -> Result<StatusCode, ApiError> {
    caller.require_self(req.from_user_id)?;
    ctx.backpack
        .transfer(req.from_user_id, req.to_user_id, req.product_id, req.quantity)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn grant_item(
    State(ctx): Ctx,
    caller: Caller,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ItemRequest>,
) -> ApiResult<Value> {
    caller.require_admin()?;
    let quantity = ctx
        .backpack
        .grant(user_id, req.product_id, req.quantity, Provenance::Manual)
        .await?;
    Ok(Json(json!({ "product_id": req.product_id, "quantity": quantity })))
}

// ------------------------------------------------------------------
// Reward catalog
// ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

async fn list_date_rewards(
    State(ctx): Ctx,
    caller: Caller,
    Query(q): Query<DateRangeQuery>,
) -> ApiResult<Vec<DateReward>> {
    caller.require_admin()?;
    Ok(Json(ctx.catalog.list_date_rewards(q.from, q.to).await?))
}

async fn create_date_reward(
    State(ctx): Ctx,
    caller: Caller,
    Json(input): Json<DateRewardInput>,
) -> Result<(StatusCode, Json<DateReward>), ApiError> {
    caller.require_admin()?;
    Ok((StatusCode::CREATED, Json(ctx.catalog.create_date_reward(input).await?)))
}

async fn update_date_reward(
    State(ctx): Ctx,
    caller: Caller,
    Path(reward_id): Path<Uuid>,
    Json(input): Json<DateRewardInput>,
) -> ApiResult<DateReward> {
    caller.require_admin()?;
    Ok(Json(ctx.catalog.update_date_reward(reward_id, input).await?))
}

async fn delete_date_reward(
    State(ctx): Ctx,
    caller: Caller,
    Path(reward_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    caller.require_admin()?;
    ctx.catalog.delete_date_reward(reward_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_cycle_rewards(State(ctx): Ctx, caller: Caller) -> ApiResult<Vec<CycleReward>> {
    caller.require_admin()?;
    Ok(Json(ctx.catalog.list_cycle_rewards().await?))
}

async fn create_cycle_reward(
    State(ctx): Ctx,
    caller: Caller,
    Json(input): Json<CycleRewardInput>,
) -> Result<(StatusCode, Json<CycleReward>), ApiError> {
    caller.require_admin()?;
    Ok((StatusCode::CREATED, Json(ctx.catalog.create_cycle_reward(input).await?)))
}

async fn update_cycle_reward(
    State(ctx): Ctx,
    caller: Caller,
    Path(reward_id): Path<Uuid>,
    Json(input): Json<CycleRewardInput>,
) -> ApiResult<CycleReward> {
    caller.require_admin()?;
    Ok(Json(ctx.catalog.update_cycle_reward(reward_id, input).await?))
}

async fn delete_cycle_reward(
    State(ctx): Ctx,
    caller: Caller,
    Path(reward_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    caller.require_admin()?;
    ctx.catalog.delete_cycle_reward(reward_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use chorely_common::traits::SettlementStore;
    use chorely_core::FixedClock;
    use chorely_core::config::SettlementConfig;
    use chorely_core::models::Role;
    use chorely_core::repositories::{MemoryDirectory, MemoryStore};
    use chorely_core::services::ThreadRngSource;

    use crate::identity::{USER_ID_HEADER, USER_ROLE_HEADER};

    fn app() -> (Router, MemoryDirectory) {
        let store: Arc<dyn SettlementStore> = Arc::new(MemoryStore::new());
        let directory = MemoryDirectory::new();
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 5, 1, 4, 0, 0).unwrap();
        let ctx = AppContext::from_parts(
            store,
            Arc::new(directory.clone()),
            Arc::new(directory.clone()),
            Arc::new(FixedClock::new(now)),
            Arc::new(ThreadRngSource),
            SettlementConfig::default(),
        )
        .unwrap();
        (router(Arc::new(ctx)), directory)
    }

    fn request(method: &str, uri: &str, caller: Option<(Uuid, &str)>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((id, role)) = caller {
            builder = builder
                .header(USER_ID_HEADER, id.to_string())
                .header(USER_ROLE_HEADER, role);
        }
        match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    #[tokio::test]
    async fn test_missing_identity_is_forbidden() {
        let (app, _) = app();
        let uri = format!("/users/{}/balances", Uuid::new_v4());
        let (status, _) = call(&app, request("GET", &uri, None, None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_member_cannot_read_someone_else() {
        let (app, directory) = app();
        let kid = directory.add_user(Role::Member);
        let other = directory.add_user(Role::Member);
        let uri = format!("/users/{}/streak-state", other);
        let (status, _) = call(&app, request("GET", &uri, Some((kid, "member")), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_complete_then_claim_date_reward() {
        let (app, directory) = app();
        let parent = directory.add_user(Role::Admin);
        let kid = directory.add_user(Role::Member);

        let (status, _) = call(
            &app,
            request(
                "POST",
                "/admin/date-rewards",
                Some((parent, "admin")),
                Some(json!({
                    "reward_date": "2026-05-01",
                    "payload": { "type": "points", "point_type": "coin", "amount": 25 }
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let uri = format!("/users/{}/complete-today", kid);
        let (status, body) = call(&app, request("POST", &uri, Some((kid, "member")), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["streak_days"], 1);

        let uri = format!("/users/{}/claims", kid);
        let claim = json!({ "key": "date:2026-05-01", "source": "date_reward" });
        let (status, body) = call(&app, request("POST", &uri, Some((kid, "member")), Some(claim.clone()))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "claimed");

        let (_, body) = call(&app, request("POST", &uri, Some((kid, "member")), Some(claim))).await;
        assert_eq!(body["status"], "already_claimed");
    }

    #[tokio::test]
    async fn test_admin_routes_reject_members() {
        let (app, directory) = app();
        let kid = directory.add_user(Role::Member);
        let (status, _) = call(&app, request("GET", "/admin/cycle-rewards", Some((kid, "member")), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_insufficient_funds_maps_to_402() {
        let (app, directory) = app();
        let parent = directory.add_user(Role::Admin);
        let kid = directory.add_user(Role::Member);

        let (status, created) = call(
            &app,
            request(
                "POST",
                "/admin/lucky-boxes",
                Some((parent, "admin")),
                Some(json!({
                    "name": "Chest",
                    "cost_point_type": "coin",
                    "cost_amount": 10,
                    "items": [{ "prize": { "item_type": "points", "point_type": "coin", "amount": 5 }, "probability": 1.0 }]
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let box_id = created["box_id"].as_str().unwrap().to_string();
        let uri = format!("/users/{}/lucky-boxes/{}/redeem", kid, box_id);
        let (status, body) = call(&app, request("POST", &uri, Some((kid, "member")), None)).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["required"], 10);
    }

    #[tokio::test]
    async fn test_member_backdated_streak_label_is_forbidden() {
        let (app, directory) = app();
        let parent = directory.add_user(Role::Admin);
        let kid = directory.add_user(Role::Member);
        let uri = format!("/users/{}/day-labels", kid);
        let body = json!({ "date": "2026-04-28", "action": "add", "type": "streak" });

        let (status, _) = call(&app, request("POST", &uri, Some((kid, "member")), Some(body.clone()))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, state) = call(&app, request("POST", &uri, Some((parent, "admin")), Some(body))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state["last_streak_date"], "2026-04-28");
    }

    #[tokio::test]
    async fn test_adjustment_at_i64_min_is_rejected() {
        let (app, directory) = app();
        let parent = directory.add_user(Role::Admin);
        let kid = directory.add_user(Role::Member);
        let uri = format!("/admin/users/{}/points", kid);
        let body = json!({ "point_type": "coin", "amount": i64::MIN });
        let (status, _) = call(&app, request("POST", &uri, Some((parent, "admin")), Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
