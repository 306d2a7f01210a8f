//! Test helpers for accounting-service integration tests.
//!
//! Spawns the service on a random port with the in-memory store, pointed at a
//! fake CDN that runs in the same process.

#![allow(dead_code)]

use accounting_service::config::{
    AuthSettings, CdnSettings, DatabaseSettings, Settings, TelemetrySettings,
};
use accounting_service::services::{AccessTokenClaims, API_KEY_HEADER};
use accounting_service::startup::Application;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use secrecy::Secret;
use serde_json::json;
use service_core::config::ServerConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const TEST_API_KEY: &str = "test-cdn-key";
pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const ADMIN_EMAIL: &str = "owner@agency.com";
pub const MANAGER_EMAIL: &str = "clerk@agency.com";
pub const MAX_FILE_SIZE: usize = 1024;

#[derive(Clone)]
struct StoredObject {
    content_type: String,
    data: Bytes,
}

#[derive(Clone, Default)]
struct FakeCdnState {
    files: Arc<Mutex<HashMap<String, StoredObject>>>,
    requests: Arc<AtomicUsize>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == TEST_API_KEY)
}

async fn cdn_upload(
    State(state): State<FakeCdnState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let original = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let Ok(data) = field.bytes().await else {
            return StatusCode::BAD_REQUEST.into_response();
        };
        if data.len() > MAX_FILE_SIZE * 4 {
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }

        let filename = format!("{}-{}", Uuid::new_v4().simple(), original);
        state
            .files
            .lock()
            .await
            .insert(filename.clone(), StoredObject { content_type, data });

        return Json(json!({
            "url": format!("https://cdn.test/files/{}", filename),
            "filename": filename,
        }))
        .into_response();
    }

    StatusCode::BAD_REQUEST.into_response()
}

async fn cdn_get(
    State(state): State<FakeCdnState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match state.files.lock().await.get(&name) {
        Some(object) => (
            [(header::CONTENT_TYPE, object.content_type.clone())],
            object.data.clone(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn cdn_delete(
    State(state): State<FakeCdnState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match state.files.lock().await.remove(&name) {
        Some(_) => Json(json!({ "deleted": name })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// In-process stand-in for the attachment CDN.
pub struct FakeCdn {
    pub base_url: String,
    state: FakeCdnState,
}

impl FakeCdn {
    pub async fn spawn() -> Self {
        let state = FakeCdnState::default();
        let app = Router::new()
            .route("/upload", post(cdn_upload))
            .route("/files/:name", get(cdn_get).delete(cdn_delete))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake CDN");
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    /// Number of requests the CDN has received.
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, filename: &str) -> bool {
        self.state.files.lock().await.contains_key(filename)
    }

    pub async fn put(&self, filename: &str, content_type: &str, data: &[u8]) {
        self.state.files.lock().await.insert(
            filename.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                data: Bytes::copy_from_slice(data),
            },
        );
    }
}

pub fn test_settings(cdn_base_url: &str, api_key: Option<&str>) -> Settings {
    Settings {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseSettings {
            url: None,
            max_connections: 1,
            min_connections: 1,
        },
        cdn: CdnSettings {
            base_url: cdn_base_url.to_string(),
            api_key: api_key.map(|k| Secret::new(k.to_string())),
            max_file_size: MAX_FILE_SIZE,
        },
        auth: AuthSettings {
            jwt_secret: Secret::new(TEST_JWT_SECRET.to_string()),
            admin_email: Some(ADMIN_EMAIL.to_string()),
        },
        telemetry: TelemetrySettings {
            log_level: "warn".to_string(),
            otlp_endpoint: None,
        },
    }
}

pub struct TestApp {
    pub address: String,
    pub cdn: FakeCdn,
    pub client: reqwest::Client,
    pub user_id: Uuid,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_key(Some(TEST_API_KEY)).await
    }

    pub async fn spawn_with_key(api_key: Option<&str>) -> Self {
        let cdn = FakeCdn::spawn().await;
        let app = Application::build(test_settings(&cdn.base_url, api_key))
            .await
            .expect("Failed to build test application");
        let address = format!("http://127.0.0.1:{}", app.port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        Self {
            address,
            cdn,
            client: reqwest::Client::new(),
            user_id: Uuid::new_v4(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn admin_token(&self) -> String {
        token_for(self.user_id, Some(ADMIN_EMAIL))
    }

    pub fn manager_token(&self) -> String {
        token_for(self.user_id, Some(MANAGER_EMAIL))
    }
}

/// Access token as the hosted auth provider would issue it.
pub fn token_for(user_id: Uuid, email: Option<&str>) -> String {
    let claims = AccessTokenClaims {
        sub: user_id.to_string(),
        email: email.map(str::to_string),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}
