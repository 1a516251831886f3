use crate::error::VisearchError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Visual search application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server bind address
    pub server_host: String,

    /// Server port
    pub server_port: u16,

    /// Log directory
    pub log_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Embedding API endpoint
    pub embedding_api_url: String,

    /// Bearer token for the embedding API
    #[serde(skip_serializing)]
    pub embedding_api_key: Option<String>,

    /// Embedding model name
    pub embedding_model: String,

    /// Embedding dimension shared by queries and catalog items
    pub embedding_dimension: usize,

    /// Embedding request timeout in seconds
    pub embedding_timeout_secs: u64,

    /// Attempts per embedding request
    pub embedding_max_retries: u32,

    /// Catalog source: JSON file path or http(s) URL
    pub catalog_source: String,

    /// Catalog freshness window in seconds
    pub catalog_ttl_secs: u64,

    /// Serve the previous snapshot when a refresh fails
    pub catalog_fallback_to_stale: bool,

    /// Catalog fetch timeout in seconds
    pub catalog_fetch_timeout_secs: u64,

    /// Result count when a request does not ask for one
    pub default_top_k: usize,

    /// Upper bound on requested result count
    pub max_top_k: usize,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            log_dir: PathBuf::from("./data/log"),
            log_level: "info".to_string(),
            embedding_api_url: "https://api.jina.ai/v1/embeddings".to_string(),
            embedding_api_key: None,
            embedding_model: "jina-clip-v2".to_string(),
            embedding_dimension: 512,
            embedding_timeout_secs: 60,
            embedding_max_retries: 3,
            catalog_source: "./data/catalog.json".to_string(),
            catalog_ttl_secs: 300,
            catalog_fallback_to_stale: true,
            catalog_fetch_timeout_secs: 30,
            default_top_k: 5,
            max_top_k: 100,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self, VisearchError> {
        // Load .env file (ignore if not exists)
        let _ = dotenv::dotenv();

        let defaults = Self::default();
        let config = Self {
            server_host: std::env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: Self::get_env_parsed("SERVER_PORT")?.unwrap_or(defaults.server_port),
            log_dir: Self::get_env_path("LOG_DIR").unwrap_or(defaults.log_dir),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            embedding_api_url: std::env::var("EMBEDDING_API_URL")
                .unwrap_or(defaults.embedding_api_url),
            embedding_api_key: std::env::var("EMBEDDING_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            embedding_model: std::env::var("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_dimension: Self::get_env_parsed("EMBEDDING_DIMENSION")?
                .unwrap_or(defaults.embedding_dimension),
            embedding_timeout_secs: Self::get_env_parsed("EMBEDDING_TIMEOUT_SECS")?
                .unwrap_or(defaults.embedding_timeout_secs),
            embedding_max_retries: Self::get_env_parsed("EMBEDDING_MAX_RETRIES")?
                .unwrap_or(defaults.embedding_max_retries),
            catalog_source: std::env::var("CATALOG_SOURCE").unwrap_or(defaults.catalog_source),
            catalog_ttl_secs: Self::get_env_parsed("CATALOG_TTL_SECS")?
                .unwrap_or(defaults.catalog_ttl_secs),
            catalog_fallback_to_stale: match std::env::var("CATALOG_FALLBACK_TO_STALE") {
                Ok(raw) => parse_bool(&raw).ok_or_else(|| {
                    VisearchError::config(format!(
                        "CATALOG_FALLBACK_TO_STALE must be a boolean, got '{}'",
                        raw
                    ))
                })?,
                Err(_) => defaults.catalog_fallback_to_stale,
            },
            catalog_fetch_timeout_secs: Self::get_env_parsed("CATALOG_FETCH_TIMEOUT_SECS")?
                .unwrap_or(defaults.catalog_fetch_timeout_secs),
            default_top_k: Self::get_env_parsed("DEFAULT_TOP_K")?
                .unwrap_or(defaults.default_top_k),
            max_top_k: Self::get_env_parsed("MAX_TOP_K")?.unwrap_or(defaults.max_top_k),
            max_upload_bytes: Self::get_env_parsed("MAX_UPLOAD_BYTES")?
                .unwrap_or(defaults.max_upload_bytes),
        };

        config.validate()?;

        // Ensure required directories exist
        config.ensure_directories()?;

        Ok(config)
    }

    /// Get PathBuf from environment variable
    fn get_env_path(key: &str) -> Option<PathBuf> {
        std::env::var(key).ok().map(PathBuf::from)
    }

    /// Parse an optional numeric environment variable
    fn get_env_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, VisearchError> {
        match std::env::var(key) {
            Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
                VisearchError::config(format!("{} has an invalid value: '{}'", key, raw))
            }),
            Err(_) => Ok(None),
        }
    }

    /// Ensure required directories exist, create if not
    pub fn ensure_directories(&self) -> Result<(), VisearchError> {
        if !self.log_dir.exists() {
            std::fs::create_dir_all(&self.log_dir).map_err(|e| {
                VisearchError::config(format!(
                    "Failed to create directory {}: {}",
                    self.log_dir.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }

    /// Get log file path
    pub fn get_log_path(&self, filename: &str) -> PathBuf {
        self.log_dir.join(filename)
    }

    /// Get server bind address (host:port)
    pub fn server_bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }

    pub fn catalog_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_fetch_timeout_secs)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), VisearchError> {
        if !self.embedding_api_url.starts_with("http://")
            && !self.embedding_api_url.starts_with("https://")
        {
            return Err(VisearchError::config(
                "Embedding API URL must start with http:// or https://",
            ));
        }

        if self.embedding_model.is_empty() {
            return Err(VisearchError::config("Embedding model name cannot be empty"));
        }

        if self.embedding_dimension == 0 {
            return Err(VisearchError::config("Embedding dimension cannot be 0"));
        }

        if self.embedding_max_retries == 0 {
            return Err(VisearchError::config("Embedding retries must be at least 1"));
        }

        if self.catalog_source.trim().is_empty() {
            return Err(VisearchError::config("Catalog source cannot be empty"));
        }

        if self.default_top_k == 0 || self.default_top_k > self.max_top_k {
            return Err(VisearchError::config(format!(
                "Default top_k must be between 1 and {}",
                self.max_top_k
            )));
        }

        // Validate port range
        if self.server_port == 0 {
            return Err(VisearchError::config("Server port cannot be 0"));
        }

        Ok(())
    }
}

/// Parse common boolean spellings used in env files
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
