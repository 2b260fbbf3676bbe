use axum::{
    Extension,
    extract::{Json, Path, State, rejection::JsonRejection, rejection::PathRejection},
};

use crate::{
    AppState,
    middleware::AuthUser,
    routes::ApiResult,
    services::{LoginOutcome, ResetTicket, UserProfile},
    utils::success_to_api_response,
};

use super::model::{
    LoginRequest, RegisterRequest, RegisterResponse, ResetPasswordRequest, UpdateProfileRequest,
    VerifySecurityRequest,
};

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<RegisterResponse> {
    let Json(req) = payload?;
    let user = state.accounts.register(req.into()).await?;

    Ok(success_to_api_response(RegisterResponse {
        user_id: user.user_id,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginOutcome> {
    let Json(req) = payload?;
    let outcome = state.accounts.login(&req.username, &req.password).await?;
    Ok(success_to_api_response(outcome))
}

pub async fn verify_security(
    State(state): State<AppState>,
    payload: Result<Json<VerifySecurityRequest>, JsonRejection>,
) -> ApiResult<ResetTicket> {
    let Json(req) = payload?;
    let ticket = state
        .accounts
        .verify_security(&req.username, &req.answer1, &req.answer2)
        .await?;
    Ok(success_to_api_response(ticket))
}

pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> ApiResult<()> {
    let Json(req) = payload?;
    state
        .accounts
        .reset_password(&req.reset_token, &req.new_password)
        .await?;
    Ok(success_to_api_response(()))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<UserProfile> {
    let profile = state.accounts.get_profile(auth.user_id).await?;
    Ok(success_to_api_response(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    user_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<UserProfile> {
    let Path(user_id) = user_id?;
    auth.ensure_can_access(user_id)?;
    let Json(req) = payload?;

    let profile = state.accounts.update_profile(user_id, req.into()).await?;
    Ok(success_to_api_response(profile))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    user_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    let Path(user_id) = user_id?;
    auth.ensure_can_access(user_id)?;

    state.accounts.delete_user(user_id).await?;
    Ok(success_to_api_response(()))
}
