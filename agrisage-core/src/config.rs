use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AgrisageConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub generation: GenerationSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Generation-service settings. The API key may be omitted from the file
/// and supplied via `GEMINI_API_KEY` instead; it is resolved at client
/// construction, before any network call.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationSettings {
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl GenerationSettings {
    pub fn resolved_api_key(&self) -> String {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .unwrap_or_default()
    }
}

/// Blob-store settings. `service_key` falls back to `STORAGE_SERVICE_KEY`.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub base_url: String,
    pub bucket: String,
    #[serde(default)]
    pub service_key: Option<String>,
}

impl StorageSettings {
    pub fn resolved_service_key(&self) -> String {
        self.service_key
            .clone()
            .or_else(|| std::env::var("STORAGE_SERVICE_KEY").ok())
            .unwrap_or_default()
    }
}

impl AgrisageConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}
