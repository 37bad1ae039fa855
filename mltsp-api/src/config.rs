//! API Configuration Module
//!
//! Server, CORS and record-store settings. Everything is loaded from
//! environment variables with defaults suitable for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use mltsp_core::{ConfigError, MltspResult};
use mltsp_storage::{InMemoryRecordStore, LmdbRecordStore, RecordStore};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Server and CORS configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Interface to bind.
    pub bind_host: String,

    /// Port to listen on.
    pub port: u16,

    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Deployment environment name (development, staging, production).
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `MLTSP_API_BIND`: bind address (default: 0.0.0.0)
    /// - `PORT` or `MLTSP_API_PORT`: listen port (default: 3000)
    /// - `MLTSP_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `MLTSP_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `MLTSP_CORS_MAX_AGE_SECS`: preflight cache duration (default: 86400)
    /// - `MLTSP_ENVIRONMENT`: deployment environment (default: development)
    pub fn from_env() -> MltspResult<Self> {
        let defaults = Self::default();

        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("MLTSP_API_PORT").ok())
        {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                field: "MLTSP_API_PORT".to_string(),
                value: raw.clone(),
                reason: "expected a port number".to_string(),
            })?,
            None => defaults.port,
        };

        let cors_origins = std::env::var("MLTSP_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_host: std::env::var("MLTSP_API_BIND").unwrap_or(defaults.bind_host),
            port,
            cors_origins,
            cors_allow_credentials: std::env::var("MLTSP_CORS_ALLOW_CREDENTIALS")
                .ok()
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(false),
            cors_max_age_secs: std::env::var("MLTSP_CORS_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cors_max_age_secs),
            environment: std::env::var("MLTSP_ENVIRONMENT")
                .unwrap_or(defaults.environment)
                .to_lowercase(),
        })
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> MltspResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue {
                field: "MLTSP_API_BIND".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

// ============================================================================
// STORE CONFIGURATION
// ============================================================================

/// Record store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Process-local maps; contents are lost on restart.
    #[default]
    Memory,
    /// LMDB environment on disk.
    Lmdb,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" | "mem" => Ok(StoreBackend::Memory),
            "lmdb" => Ok(StoreBackend::Lmdb),
            _ => Err(ConfigError::InvalidValue {
                field: "MLTSP_STORE_BACKEND".to_string(),
                value: s.to_string(),
                reason: "expected memory or lmdb".to_string(),
            }),
        }
    }
}

/// Which record store to open, and where.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// LMDB directory (ignored by the memory backend).
    pub path: PathBuf,

    /// LMDB map size in megabytes.
    pub map_size_mb: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from("./data/mltsp"),
            map_size_mb: 1024,
        }
    }
}

impl StoreConfig {
    /// Environment variables:
    /// - `MLTSP_STORE_BACKEND`: `memory` or `lmdb` (default: memory)
    /// - `MLTSP_STORE_PATH`: LMDB directory (default: ./data/mltsp)
    /// - `MLTSP_STORE_MAP_SIZE_MB`: LMDB map size (default: 1024)
    pub fn from_env() -> MltspResult<Self> {
        let defaults = Self::default();
        let backend = match std::env::var("MLTSP_STORE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.backend,
        };

        Ok(Self {
            backend,
            path: std::env::var("MLTSP_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            map_size_mb: std::env::var("MLTSP_STORE_MAP_SIZE_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|mb| *mb > 0)
                .unwrap_or(defaults.map_size_mb),
        })
    }

    /// Open the configured store.
    pub fn open(&self) -> MltspResult<Arc<dyn RecordStore>> {
        match self.backend {
            StoreBackend::Memory => {
                tracing::info!("Using in-memory record store");
                Ok(Arc::new(InMemoryRecordStore::new()))
            }
            StoreBackend::Lmdb => {
                let store = LmdbRecordStore::open(&self.path, self.map_size_mb)?;
                Ok(Arc::new(store))
            }
        }
    }
}
