use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use membership_backend::{
    AppState, auth::MemoryResetTokenStore, config::Config, routes::build_router,
    store::MemoryStore,
};
use serde_json::{Value, json};
use tower::ServiceExt;

fn test_config(admin_user_ids: Vec<i64>) -> Config {
    Config {
        database_url: "postgres://unused".into(),
        redis_url: "redis://unused".into(),
        jwt_secret: "integration-test-secret".into(),
        bcrypt_cost: 4,
        reset_token_expiration_secs: 900,
        rate_limit_window_secs: 60,
        rate_limit_requests: 100,
        request_timeout_secs: 30,
        db_max_connections: 1,
        server_host: "127.0.0.1".into(),
        server_port: 0,
        api_base_uri: "/api".into(),
        admin_user_ids,
    }
}

fn app_with_admins(admin_user_ids: Vec<i64>) -> Router {
    let state = AppState::new(
        Arc::new(test_config(admin_user_ids)),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryResetTokenStore::new()),
    )
    .unwrap();
    build_router(state)
}

fn app() -> Router {
    app_with_admins(Vec::new())
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(app: &Router, username: &str, phone: &str) -> i64 {
    let (status, body) = call(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "password": "pa55word",
            "full_name": "Test User",
            "email": format!("{}@example.com", username),
            "phone_number": phone,
            "security_question1": "first pet",
            "security_answer1": "Dinah",
            "security_question2": "home town",
            "security_answer2": "Oxford",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["resp_data"]["user_id"].as_i64().unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["resp_data"]["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn alice_membership_lifecycle() {
    let app = app();
    let alice = register(&app, "alice", "13800000001").await;
    let token = login(&app, "alice", "pa55word").await;

    let (status, vip) = call(
        &app,
        "POST",
        "/api/membership",
        Some(&token),
        Some(json!({ "membership_type": "vip" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{vip}");
    assert_eq!(vip["resp_data"]["membership_type"], "vip");
    assert_eq!(vip["resp_data"]["status"], "active");
    let vip_id = vip["resp_data"]["membership_id"].as_i64().unwrap();

    let (status, body) = call(
        &app,
        "POST",
        "/api/membership",
        Some(&token),
        Some(json!({ "membership_type": "basic" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 1001);

    let (status, cancelled) = call(
        &app,
        "POST",
        &format!("/api/membership/{}/cancel", vip_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["resp_data"]["status"], "cancelled");

    let (status, basic) = call(
        &app,
        "POST",
        "/api/membership",
        Some(&token),
        Some(json!({ "membership_type": "basic" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, active) = call(
        &app,
        "GET",
        &format!("/api/membership/user/{}", alice),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        active["resp_data"]["membership_id"],
        basic["resp_data"]["membership_id"]
    );
}

#[tokio::test]
async fn bob_latest_order_is_the_wechat_one() {
    let app = app();
    let bob = register(&app, "bob", "13900000002").await;
    let token = login(&app, "bob", "pa55word").await;

    for (months, amount, method) in [(1, 9.99, "alipay"), (12, 99.0, "wechat")] {
        let (status, body) = call(
            &app,
            "POST",
            "/api/membership/orders",
            Some(&token),
            Some(json!({
                "duration_months": months,
                "amount": amount,
                "payment_method": method,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (status, latest) = call(
        &app,
        "GET",
        &format!("/api/membership/orders/{}/latest", bob),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["resp_data"]["payment_method"], "wechat");
    assert_eq!(latest["resp_data"]["duration_months"], 12);

    let (status, all) = call(
        &app,
        "GET",
        &format!("/api/membership/orders/{}", bob),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["resp_data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn recent_orders_rejects_out_of_range_n() {
    let app = app();
    let carol = register(&app, "carol", "13700000003").await;
    let token = login(&app, "carol", "pa55word").await;

    for n in ["0", "101", "-1", "abc"] {
        let (status, body) = call(
            &app,
            "GET",
            &format!("/api/membership/orders/{}/recent?n={}", carol, n),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "n={n}");
        assert_eq!(body["code"], 1000);
    }

    let (status, body) = call(
        &app,
        "GET",
        &format!("/api/membership/orders/{}/recent", carol),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["resp_data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn missing_or_bad_tokens_are_unauthenticated() {
    let app = app();

    let (status, body) = call(&app, "GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1002);

    let (status, _) = call(&app, "GET", "/api/auth/me", Some("not.a.token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    register(&app, "dave", "13600000004").await;
    let token = login(&app, "dave", "pa55word").await;
    let (status, me) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["resp_data"]["username"], "dave");
    assert!(me["resp_data"].get("password_hash").is_none());
}

#[tokio::test]
async fn login_failures_share_one_response() {
    let app = app();
    register(&app, "erin", "13500000005").await;

    let wrong = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "erin", "password": "nope" })),
    )
    .await;
    let unknown = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "nobody", "password": "nope" })),
    )
    .await;
    assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);
}

#[tokio::test]
async fn users_cannot_touch_each_others_records() {
    let app = app();
    let frank = register(&app, "frank", "13400000006").await;
    register(&app, "grace", "13300000007").await;
    let grace_token = login(&app, "grace", "pa55word").await;

    let (status, body) = call(
        &app,
        "GET",
        &format!("/api/membership/orders/{}", frank),
        Some(&grace_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 1003);

    let (status, _) = call(&app, "GET", "/api/membership", Some(&grace_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_can_manage_other_users() {
    let app = app_with_admins(vec![1]);
    let admin = register(&app, "root", "13000000000").await;
    assert_eq!(admin, 1);
    let heidi = register(&app, "heidi", "13200000008").await;
    let admin_token = login(&app, "root", "pa55word").await;

    let (status, created) = call(
        &app,
        "POST",
        "/api/membership",
        Some(&admin_token),
        Some(json!({ "user_id": heidi, "membership_type": "premium" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{created}");
    assert_eq!(created["resp_data"]["user_id"], heidi);

    let (status, list) = call(&app, "GET", "/api/membership", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["resp_data"].as_array().unwrap().len(), 1);

    let (status, expired) = call(
        &app,
        "POST",
        "/api/membership/expire",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(expired["resp_data"]["expired"], 0);

    let (status, updated) = call(
        &app,
        "PUT",
        &format!("/api/membership/{}", created["resp_data"]["membership_id"]),
        Some(&admin_token),
        Some(json!({ "end_date": "2099-01-01T00:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert!(
        updated["resp_data"]["end_date"]
            .as_str()
            .unwrap()
            .starts_with("2099-01-01")
    );
}

#[tokio::test]
async fn owners_cannot_set_membership_dates_or_status() {
    let app = app();
    register(&app, "judy", "12900000010").await;
    let token = login(&app, "judy", "pa55word").await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/membership",
        Some(&token),
        Some(json!({ "membership_type": "vip", "end_date": "2099-01-01T00:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 1003);

    let (status, created) = call(
        &app,
        "POST",
        "/api/membership",
        Some(&token),
        Some(json!({ "membership_type": "basic" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let membership_id = created["resp_data"]["membership_id"].as_i64().unwrap();

    for body in [
        json!({ "end_date": "2099-01-01T00:00:00Z" }),
        json!({ "status": "expired" }),
    ] {
        let (status, resp) = call(
            &app,
            "PUT",
            &format!("/api/membership/{}", membership_id),
            Some(&token),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(resp["code"], 1003);
    }

    let (status, cancelled) = call(
        &app,
        "POST",
        &format!("/api/membership/{}/cancel", membership_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["resp_data"]["status"], "cancelled");
    assert_eq!(cancelled["resp_data"]["end_date"], created["resp_data"]["end_date"]);
}

#[tokio::test]
async fn sub_cent_order_amounts_are_validation_errors() {
    let app = app();
    let kim = register(&app, "kim", "12800000011").await;
    let token = login(&app, "kim", "pa55word").await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/membership/orders",
        Some(&token),
        Some(json!({ "duration_months": 1, "amount": 0.004, "payment_method": "card" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1000);

    let (status, orders) = call(
        &app,
        "GET",
        &format!("/api/membership/orders/{}", kim),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(orders["resp_data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn password_reset_via_security_questions() {
    let app = app();
    register(&app, "ivan", "13100000009").await;

    let (status, wrong) = call(
        &app,
        "POST",
        "/api/auth/verify-security",
        None,
        Some(json!({ "username": "ivan", "answer1": "dinah", "answer2": "paris" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{wrong}");

    let (status, ticket) = call(
        &app,
        "POST",
        "/api/auth/verify-security",
        None,
        Some(json!({ "username": "ivan", "answer1": " DINAH", "answer2": "oxford" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reset_token = ticket["resp_data"]["reset_token"].as_str().unwrap().to_string();

    let reset = json!({ "reset_token": reset_token, "new_password": "fresh-pass" });
    let (status, _) = call(
        &app,
        "POST",
        "/api/auth/reset-password",
        None,
        Some(reset.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, "POST", "/api/auth/reset-password", None, Some(reset)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    login(&app, "ivan", "fresh-pass").await;
}

#[tokio::test]
async fn deleting_a_user_removes_their_records() {
    let app = app();
    let judy = register(&app, "judy", "13000000010").await;
    let token = login(&app, "judy", "pa55word").await;

    call(
        &app,
        "POST",
        "/api/membership",
        Some(&token),
        Some(json!({ "membership_type": "basic" })),
    )
    .await;

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/api/users/{}", judy),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        "GET",
        &format!("/api/membership/user/{}", judy),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_bodies_are_validation_errors() {
    let app = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1000);
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = app();
    let (status, body) = call(&app, "GET", "/api/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"], "ok");
}
