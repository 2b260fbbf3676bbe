use axum::{
    Extension,
    extract::{Json, Path, State, rejection::JsonRejection, rejection::PathRejection},
};
use chrono::Utc;

use crate::{
    AppState,
    middleware::AuthUser,
    models::Membership,
    routes::ApiResult,
    services::CreateMembership,
    utils::success_to_api_response,
};

use super::model::{CreateMembershipRequest, ExpireResponse, UpdateMembershipRequest};

/// 读取会员记录并确认调用方是其所有者或管理员
async fn owned_membership(
    state: &AppState,
    auth: &AuthUser,
    membership_id: i64,
) -> Result<Membership, crate::error::AppError> {
    let membership = state.memberships.find(membership_id).await?;
    auth.ensure_can_access(membership.user_id)?;
    Ok(membership)
}

pub async fn list_memberships(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<Membership>> {
    auth.ensure_admin()?;
    let memberships = state.memberships.list().await?;
    Ok(success_to_api_response(memberships))
}

pub async fn create_membership(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<CreateMembershipRequest>, JsonRejection>,
) -> ApiResult<Membership> {
    let Json(req) = payload?;
    let user_id = auth.resolve_target(req.user_id)?;
    // 自定义起止日期或状态只对管理员开放
    if req.start_date.is_some() || req.end_date.is_some() || req.status.is_some() {
        auth.ensure_admin()?;
    }

    let membership = state
        .memberships
        .create(CreateMembership {
            user_id,
            membership_type: req.membership_type,
            start_date: req.start_date,
            end_date: req.end_date,
            status: req.status,
        })
        .await?;
    Ok(success_to_api_response(membership))
}

pub async fn expire_overdue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<ExpireResponse> {
    auth.ensure_admin()?;
    let expired = state.memberships.expire_overdue(Utc::now()).await?;
    Ok(success_to_api_response(ExpireResponse { expired }))
}

pub async fn active_membership(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    user_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Membership> {
    let Path(user_id) = user_id?;
    auth.ensure_can_access(user_id)?;

    let membership = state.memberships.get_active(user_id).await?;
    Ok(success_to_api_response(membership))
}

pub async fn update_membership(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    membership_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateMembershipRequest>, JsonRejection>,
) -> ApiResult<Membership> {
    let Path(membership_id) = membership_id?;
    let Json(req) = payload?;
    auth.ensure_admin()?;

    let membership = state.memberships.update(membership_id, req.into()).await?;
    Ok(success_to_api_response(membership))
}

pub async fn cancel_membership(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    membership_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Membership> {
    let Path(membership_id) = membership_id?;
    owned_membership(&state, &auth, membership_id).await?;

    let membership = state.memberships.cancel(membership_id).await?;
    Ok(success_to_api_response(membership))
}

pub async fn delete_membership(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    membership_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    let Path(membership_id) = membership_id?;
    owned_membership(&state, &auth, membership_id).await?;

    state.memberships.delete(membership_id).await?;
    Ok(success_to_api_response(()))
}
