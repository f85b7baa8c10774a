use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of issued bearer tokens.
    pub token_ttl_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory for uploaded entry files and event uploads.
    pub data_dir: PathBuf,
    /// Hard upper bound for any single uploaded file, in bytes.
    /// Compo-specific limits can only be lower.
    pub max_blob_size: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Shortest ticket key prefix accepted when claiming voting rights.
    pub ticket_key_min_length: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ticket_key_min_length: 8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("auth.token_ttl_hours", 24 * 7)?
            .set_default("storage.data_dir", "./data/files")?
            .set_default("storage.max_blob_size", 512 * 1024 * 1024_i64)?
            .set_default("store.ticket_key_min_length", 8)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., INSTANSSI__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("INSTANSSI").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
