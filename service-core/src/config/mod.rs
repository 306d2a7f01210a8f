use config::{Config as Cfg, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;

/// Listener settings shared by every HTTP service.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Start a layered configuration: optional `<file_stem>.{yaml,toml,json}` file,
/// then `APP__SECTION__KEY` environment variables on top.
///
/// Loads `.env` first so local runs pick up the same variables as containers.
/// Callers add defaults and service-specific overrides before `build()`.
pub fn layered(file_stem: &str) -> ConfigBuilder<DefaultState> {
    dotenvy::dotenv().ok();

    Cfg::builder()
        .add_source(File::with_name(file_stem).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_defaults_bind_all_interfaces() {
        let server = ServerConfig::default();
        assert_eq!(server.address(), "0.0.0.0:8080");
    }

    #[test]
    fn layered_builder_accepts_defaults_without_a_file() {
        let cfg = layered("does-not-exist")
            .set_default("server.port", 9100)
            .unwrap()
            .build()
            .unwrap();

        let port: u16 = cfg.get("server.port").unwrap();
        assert_eq!(port, 9100);
    }
}
