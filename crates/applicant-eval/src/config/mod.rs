use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::screening::{FallbackPolicy, ScoreRatio};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scoring: ScoringConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let scoring = ScoringConfig::from_env()?;
        let criteria_dir = env::var("APP_CRITERIA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploaded_criteria"));

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scoring,
            storage: StorageConfig { criteria_dir },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Scoring defaults shared by the HTTP surface, the batch CLI and the review coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub default_ratio: ScoreRatio,
    pub fallback: FallbackPolicy,
    pub batch_concurrency: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_ratio: ScoreRatio::DEFAULT,
            fallback: FallbackPolicy::FirstCatalogEntry,
            batch_concurrency: 4,
        }
    }
}

impl ScoringConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let default_ratio = match env::var("APP_DEFAULT_SKILL_RATIO") {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|skill| ScoreRatio::new(skill).ok())
                .ok_or(ConfigError::InvalidRatio { value: raw })?,
            Err(_) => defaults.default_ratio,
        };

        let fallback = env::var("APP_CRITERIA_FALLBACK")
            .map(|raw| FallbackPolicy::parse(&raw))
            .unwrap_or(defaults.fallback);

        let batch_concurrency = match env::var("APP_BATCH_CONCURRENCY") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|value| *value >= 1)
                .ok_or(ConfigError::InvalidConcurrency { value: raw })?,
            Err(_) => defaults.batch_concurrency,
        };

        Ok(Self {
            default_ratio,
            fallback,
            batch_concurrency,
        })
    }
}

/// Where uploaded criteria documents live.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub criteria_dir: PathBuf,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidRatio { value: String },
    InvalidConcurrency { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidRatio { value } => write!(
                f,
                "APP_DEFAULT_SKILL_RATIO must be a number in [0, 1], got '{}'",
                value
            ),
            ConfigError::InvalidConcurrency { value } => write!(
                f,
                "APP_BATCH_CONCURRENCY must be a positive integer, got '{}'",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidRatio { .. }
            | ConfigError::InvalidConcurrency { .. } => None,
        }
    }
}
