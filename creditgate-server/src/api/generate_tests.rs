#![allow(clippy::unwrap_used, clippy::indexing_slicing, reason = "test assertions")]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use creditgate_types::{CallerIdentity, PlanTier};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::generate::GenerateBody;
use crate::router::build_router;
use crate::test_helpers::{
    guest_token, seed_user, test_app_state, test_app_state_with, test_config, StubInvoker,
};

struct Reply {
    status: StatusCode,
    set_cookie: Option<String>,
    retry_after: Option<String>,
    body: Value,
}

async fn post(app: Router, uri: &str, headers: &[(&str, String)], body: Value) -> Reply {
    let mut builder =
        Request::builder().method("POST").uri(uri).header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, value.as_str());
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let header_text = |name| {
        response.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
    };
    let set_cookie = header_text(header::SET_COOKIE);
    let retry_after = header_text(header::RETRY_AFTER);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };

    Reply { status, set_cookie, retry_after, body }
}

#[tokio::test]
async fn test_guest_first_request_succeeds_and_sets_cookie() {
    let app = test_app_state(StubInvoker::outputs(1));
    let router = build_router(app.state.clone());

    let reply = post(router, "/api/generate/banner", &[], json!({ "keyword": "summer sale" })).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["outputs"].as_array().unwrap().len(), 1);
    assert_eq!(reply.body["usage"], json!({ "limit": 5, "used": 1, "remaining": 4 }));
    assert!(reply.body["modelUsed"].is_string());
    assert!(reply.body.get("warning").is_none());

    let cookie = reply.set_cookie.unwrap();
    assert!(cookie.starts_with("cg_usage_banner="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_guest_over_quota_gets_429_with_usage() {
    let app = test_app_state(StubInvoker::outputs(3));
    let router = build_router(app.state.clone());
    let cookie = format!("cg_usage_banner={}", guest_token(4));

    let reply = post(
        router,
        "/api/generate/banner",
        &[("cookie", cookie)],
        json!({ "keyword": "summer sale", "requestedUnits": 3 }),
    )
    .await;

    assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(reply.body["code"], "MONTHLY_LIMIT_REACHED");
    assert_eq!(reply.body["usage"]["remaining"], 1);
    assert_eq!(app.invoker.calls(), 0);
}

#[tokio::test]
async fn test_pro_partial_delivery_warns_and_charges_delivered() {
    let app = test_app_state(StubInvoker::outputs(2));
    seed_user(&app.repo, "pro-1", "banner", PlanTier::Pro, 98);
    let router = build_router(app.state.clone());

    let reply = post(
        router,
        "/api/generate/banner",
        &[("x-user-id", "pro-1".to_string())],
        json!({ "prompt": "launch banner", "requestedUnits": 5 }),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["outputs"].as_array().unwrap().len(), 2);
    assert_eq!(reply.body["usage"], json!({ "limit": 100, "used": 100, "remaining": 0 }));
    assert_eq!(
        reply.body["warning"],
        json!({ "code": "PARTIAL_DELIVERY", "requested": 5, "delivered": 2 })
    );
    assert!(reply.set_cookie.is_none());

    let stored = app.repo.get(&CallerIdentity::user_key("pro-1"), "banner").unwrap();
    assert_eq!(stored.monthly_usage, 100);
}

#[tokio::test]
async fn test_generation_failure_is_500_and_charges_nothing() {
    let app = test_app_state(StubInvoker::failing());
    seed_user(&app.repo, "free-1", "copy", PlanTier::Free, 3);
    let router = build_router(app.state.clone());

    let reply = post(
        router,
        "/api/generate/copy",
        &[("x-user-id", "free-1".to_string())],
        json!({ "keyword": "shoes" }),
    )
    .await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(reply.body["error"].is_string());
    assert!(reply.set_cookie.is_none());
    let stored = app.repo.get(&CallerIdentity::user_key("free-1"), "copy").unwrap();
    assert_eq!(stored.monthly_usage, 3);
}

#[tokio::test]
async fn test_rate_limited_second_request() {
    let mut config = test_config();
    config.rate_limit.guest_max_requests = 1;
    let app = test_app_state_with(config, StubInvoker::outputs(1));
    let router = build_router(app.state.clone());
    let ip = vec![("x-forwarded-for", "198.51.100.20".to_string())];

    let first = post(router.clone(), "/api/generate/chat", &ip, json!({ "prompt": "hi" })).await;
    let second = post(router, "/api/generate/chat", &ip, json!({ "prompt": "hi" })).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.body["code"], "RATE_LIMITED");
    assert!(second.retry_after.is_some());
    assert_eq!(app.invoker.calls(), 1);
}

#[tokio::test]
async fn test_malformed_body_spends_rate_limit_slot() {
    let mut config = test_config();
    config.rate_limit.guest_max_requests = 1;
    let app = test_app_state_with(config, StubInvoker::outputs(1));
    let router = build_router(app.state.clone());
    let ip = vec![("x-forwarded-for", "198.51.100.30".to_string())];

    let bad = post(router.clone(), "/api/generate/chat", &ip, json!({ "size": "1x1" })).await;
    let good = post(router, "/api/generate/chat", &ip, json!({ "prompt": "hi" })).await;

    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(good.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(good.body["code"], "RATE_LIMITED");
    assert_eq!(app.invoker.calls(), 0);
}

#[tokio::test]
async fn test_unknown_service_is_404() {
    let app = test_app_state(StubInvoker::outputs(1));
    let router = build_router(app.state.clone());

    let reply = post(router, "/api/generate/video", &[], json!({ "prompt": "x" })).await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["code"], "UNKNOWN_SERVICE");
}

#[tokio::test]
async fn test_missing_prompt_is_400() {
    let app = test_app_state(StubInvoker::outputs(1));
    let router = build_router(app.state.clone());

    let reply = post(router, "/api/generate/banner", &[], json!({ "size": "1200x628" })).await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "INVALID_REQUEST");
    assert_eq!(app.invoker.calls(), 0);
}

#[test]
fn test_body_maps_to_payload() {
    let body: GenerateBody = serde_json::from_value(json!({
        "category": "social",
        "keyword": " autumn ",
        "size": "1080x1080",
        "units": 2,
        "tone": "bold"
    }))
    .unwrap();

    let (requested, payload) = body.into_payload().unwrap();

    assert_eq!(requested, 2);
    assert_eq!(payload.prompt, "autumn");
    assert_eq!(payload.category.as_deref(), Some("social"));
    assert_eq!(payload.extra["tone"], "bold");
}
