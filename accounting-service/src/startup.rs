use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware,
};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::handlers;
use crate::middleware::{auth_middleware, require_section};
use crate::services::{
    AccessPolicy, AttachmentManager, InMemoryStore, JwtVerifier, PgStore, RecordManager,
    RecordStore, Section, ShipPricingTable,
};

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub records: Arc<RecordManager>,
    pub attachments: Arc<AttachmentManager>,
    pub auth: Arc<JwtVerifier>,
}

impl AppState {
    pub fn new(settings: &Settings, store: Arc<dyn RecordStore>) -> Self {
        let policy = AccessPolicy::new(settings.auth.admin_email.clone());
        Self {
            records: Arc::new(RecordManager::new(
                store,
                Arc::new(ShipPricingTable::standard()),
            )),
            attachments: Arc::new(AttachmentManager::new(&settings.cdn)),
            auth: Arc::new(JwtVerifier::new(&settings.auth.jwt_secret, policy)),
        }
    }
}

fn gated(routes: Router<AppState>, section: Section) -> Router<AppState> {
    routes.route_layer(from_fn_with_state(section, require_section))
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.attachments.max_file_size() + MULTIPART_OVERHEAD;

    let sales_routes = gated(
        Router::new()
            .route(
                "/api/sales",
                get(handlers::list_sales).post(handlers::create_sale),
            )
            .route("/api/sales/quote", post(handlers::quote_sale))
            .route(
                "/api/sales/:id",
                get(handlers::get_sale)
                    .put(handlers::update_sale)
                    .delete(handlers::delete_sale),
            ),
        Section::Sales,
    );

    let customer_routes = gated(
        Router::new().route("/api/customers", get(handlers::list_customers)),
        Section::Customers,
    );

    let expense_routes = gated(
        Router::new()
            .route(
                "/api/expenses",
                get(handlers::list_expenses).post(handlers::create_expense),
            )
            .route(
                "/api/expenses/:id",
                get(handlers::get_expense)
                    .put(handlers::update_expense)
                    .delete(handlers::delete_expense),
            ),
        Section::Expenses,
    );

    let vendor_routes = gated(
        Router::new()
            .route(
                "/api/vendors",
                get(handlers::list_vendors).post(handlers::create_vendor),
            )
            .route(
                "/api/vendors/:id",
                axum::routing::delete(handlers::delete_vendor),
            ),
        Section::Vendors,
    );

    let category_routes = gated(
        Router::new()
            .route(
                "/api/categories",
                get(handlers::list_categories).post(handlers::create_category),
            )
            .route(
                "/api/categories/:id",
                axum::routing::delete(handlers::delete_category),
            ),
        Section::Categories,
    );

    let report_routes = gated(
        Router::new().route("/api/reports", get(handlers::get_report)),
        Section::Reports,
    );

    let authenticated = Router::new()
        .route("/api/me", get(handlers::get_me))
        .merge(sales_routes)
        .merge(customer_routes)
        .merge(expense_routes)
        .merge(vendor_routes)
        .merge(category_routes)
        .merge(report_routes)
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let upload_routes = Router::new()
        .route(
            "/api/upload",
            get(handlers::view_file)
                .post(handlers::upload_file)
                .delete(handlers::delete_file),
        )
        .layer(DefaultBodyLimit::max(upload_limit));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .merge(upload_routes)
        .merge(authenticated)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    user_id = tracing::field::Empty,
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build(settings: Settings) -> Result<Self, AppError> {
        let store: Arc<dyn RecordStore> = match &settings.database.url {
            Some(url) => Arc::new(
                PgStore::new(
                    url.expose_secret(),
                    settings.database.max_connections,
                    settings.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to PostgreSQL: {}", e);
                    e
                })?,
            ),
            None => {
                tracing::warn!("No database URL configured, records are kept in memory");
                Arc::new(InMemoryStore::new())
            }
        };

        if settings.auth.jwt_secret.expose_secret().is_empty() {
            tracing::warn!("No JWT secret configured, every authenticated request will be rejected");
        }

        let app = build_router(AppState::new(&settings, store));

        let address = settings.server.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port, "Listening");

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
