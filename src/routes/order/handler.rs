use axum::{
    Extension,
    extract::{
        Json, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};

use crate::{
    AppState, middleware::AuthUser, models::Order, routes::ApiResult,
    utils::success_to_api_response,
};

use super::model::{RecentQuery, RecordOrderRequest};

pub async fn record_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<RecordOrderRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let Json(req) = payload?;
    let user_id = auth.resolve_target(req.user_id)?;

    let order = state
        .ledger
        .record_order(user_id, req.duration_months, req.amount, &req.payment_method)
        .await?;
    Ok(success_to_api_response(order))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    user_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Vec<Order>> {
    let Path(user_id) = user_id?;
    auth.ensure_can_access(user_id)?;

    let orders = state.ledger.list_orders(user_id).await?;
    Ok(success_to_api_response(orders))
}

pub async fn latest_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    user_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Order> {
    let Path(user_id) = user_id?;
    auth.ensure_can_access(user_id)?;

    let order = state.ledger.latest_order(user_id).await?;
    Ok(success_to_api_response(order))
}

pub async fn recent_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    user_id: Result<Path<i64>, PathRejection>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> ApiResult<Vec<Order>> {
    let Path(user_id) = user_id?;
    let Query(query) = query?;
    // 范围检查在进入账本之前完成
    let n = query.limit()?;
    auth.ensure_can_access(user_id)?;

    let orders = state.ledger.recent_orders(user_id, n).await?;
    Ok(success_to_api_response(orders))
}
