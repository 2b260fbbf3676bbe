use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    AppState,
    error::AppError,
    middleware::{auth_middleware, log_errors},
    utils::{ApiResponse, success_to_api_response},
};

pub mod membership;
pub mod order;
pub mod user;

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

pub async fn healthz(State(state): State<AppState>) -> ApiResult<&'static str> {
    state.store.ping().await?;
    Ok(success_to_api_response("ok"))
}

/// 组装全部路由；限流依赖 Redis，由 main 在外层挂载
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/register", post(user::register))
        .route("/auth/login", post(user::login))
        .route("/auth/verify-security", post(user::verify_security))
        .route("/auth/reset-password", post(user::reset_password));

    let protected_routes = Router::new()
        .route("/auth/me", get(user::me))
        .route(
            "/users/{user_id}",
            put(user::update_profile).delete(user::delete_user),
        )
        .route(
            "/membership",
            get(membership::list_memberships).post(membership::create_membership),
        )
        .route("/membership/expire", post(membership::expire_overdue))
        .route(
            "/membership/user/{user_id}",
            get(membership::active_membership),
        )
        .route(
            "/membership/{membership_id}",
            put(membership::update_membership).delete(membership::delete_membership),
        )
        .route(
            "/membership/{membership_id}/cancel",
            post(membership::cancel_membership),
        )
        .route("/membership/orders", post(order::record_order))
        .route("/membership/orders/{user_id}", get(order::list_orders))
        .route(
            "/membership/orders/{user_id}/latest",
            get(order::latest_order),
        )
        .route(
            "/membership/orders/{user_id}/recent",
            get(order::recent_orders),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new().merge(public_routes).merge(protected_routes);
    let router = if state.config.api_base_uri.is_empty() || state.config.api_base_uri == "/" {
        api
    } else {
        Router::new().nest(&state.config.api_base_uri, api)
    };

    router
        .layer(axum::middleware::from_fn(log_errors))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
