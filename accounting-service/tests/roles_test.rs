mod common;

use std::sync::Arc;

use accounting_service::services::InMemoryStore;
use accounting_service::startup::{build_router, AppState};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{test_settings, token_for, ADMIN_EMAIL, MANAGER_EMAIL};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

fn router() -> Router {
    let settings = test_settings("http://127.0.0.1:9", Some("unused"));
    build_router(AppState::new(&settings, Arc::new(InMemoryStore::new())))
}

async fn get(router: Router, uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let response = router
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let (status, _) = get(router(), "/api/sales", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(router(), "/api/sales", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn manager_reaches_sales_but_not_admin_sections() {
    let token = token_for(Uuid::new_v4(), Some(MANAGER_EMAIL));

    let (status, _) = get(router(), "/api/sales", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(router(), "/api/customers", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    for uri in ["/api/expenses", "/api/vendors", "/api/categories", "/api/reports"] {
        let (status, _) = get(router(), uri, Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[tokio::test]
async fn admin_reaches_every_section() {
    let token = token_for(Uuid::new_v4(), Some(ADMIN_EMAIL));

    for uri in [
        "/api/sales",
        "/api/customers",
        "/api/expenses",
        "/api/vendors",
        "/api/categories",
        "/api/reports",
    ] {
        let (status, _) = get(router(), uri, Some(&token)).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
    }
}

#[tokio::test]
async fn admin_email_is_matched_case_insensitively() {
    let token = token_for(Uuid::new_v4(), Some("OWNER@Agency.com"));
    let (status, body) = get(router(), "/api/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
}

#[tokio::test]
async fn me_lists_the_sections_a_manager_may_open() {
    let token = token_for(Uuid::new_v4(), Some(MANAGER_EMAIL));
    let (status, body) = get(router(), "/api/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "manager");
    assert_eq!(body["sections"], serde_json::json!(["sales", "customers"]));
}

#[tokio::test]
async fn health_is_public() {
    let (status, body) = get(router(), "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
