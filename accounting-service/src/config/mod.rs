use secrecy::Secret;
use serde::Deserialize;
use service_core::config::{layered, ServerConfig};

use crate::services::attachments::DEFAULT_MAX_FILE_SIZE;

pub const DEFAULT_CDN_BASE_URL: &str = "https://cdn.tripbooking.ai";

#[derive(Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub cdn: CdnSettings,
    pub auth: AuthSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    /// Postgres URL of the hosted database. Unset runs on the in-memory store.
    pub url: Option<Secret<String>>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone)]
pub struct CdnSettings {
    pub base_url: String,
    /// Server-held key sent as `X-API-Key`. Never exposed to browsers.
    pub api_key: Option<Secret<String>>,
    pub max_file_size: usize,
}

#[derive(Deserialize, Clone)]
pub struct AuthSettings {
    /// HS256 secret the auth provider signs access tokens with.
    pub jwt_secret: Secret<String>,
    pub admin_email: Option<String>,
}

#[derive(Deserialize, Clone)]
pub struct TelemetrySettings {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Defaults, then `configuration.{yaml,toml}`, then `APP__*` variables, then
/// the deployment's plain variable names.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let admin_email = env_var("ADMIN_EMAIL").or_else(|| env_var("NEXT_PUBLIC_ADMIN_EMAIL"));

    let settings = layered("configuration")
        .set_default("database.max_connections", 10)?
        .set_default("database.min_connections", 1)?
        .set_default("cdn.base_url", DEFAULT_CDN_BASE_URL)?
        .set_default("cdn.max_file_size", DEFAULT_MAX_FILE_SIZE as i64)?
        .set_default("auth.jwt_secret", "")?
        .set_default("telemetry.log_level", "info")?
        .set_override_option("cdn.base_url", env_var("NEXT_PUBLIC_CDN_BASE_URL"))?
        .set_override_option("cdn.api_key", env_var("CDN_API_KEY"))?
        .set_override_option(
            "cdn.max_file_size",
            env_var("MAX_FILE_SIZE").and_then(|v| v.trim().parse::<i64>().ok()),
        )?
        .set_override_option("auth.admin_email", admin_email)?
        .set_override_option("auth.jwt_secret", env_var("BAAS_JWT_SECRET"))?
        .set_override_option("database.url", env_var("DATABASE_URL"))?
        .set_override_option("telemetry.otlp_endpoint", env_var("OTEL_EXPORTER_OTLP_ENDPOINT"))?
        .build()?;

    settings.try_deserialize::<Settings>()
}
