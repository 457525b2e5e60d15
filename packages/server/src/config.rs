use common::config::StorageAppConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// Allowed origins. Empty means any origin.
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

/// Chunk upload limits.
#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Largest accepted chunk body in bytes. Default: 25 MiB.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    /// Seconds per chunk when the request does not say. Default: 5.
    #[serde(default = "default_chunk_duration")]
    pub default_chunk_duration: u32,
}

fn default_max_chunk_size() -> usize {
    25 * 1024 * 1024
}
fn default_chunk_duration() -> u32 {
    common::session::paths::DEFAULT_CHUNK_DURATION
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            default_chunk_duration: default_chunk_duration(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageAppConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SESSIONS_CONFIG").unwrap_or_else(|_| "config/config".into());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            // Load from config/config.toml
            .add_source(File::with_name(path).required(false))
            // Override from environment (e.g., SESSIONS__STORAGE__BACKEND=s3)
            .add_source(Environment::with_prefix("SESSIONS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
