use eegview_core::PipelineConfig;
use std::env;
use std::str::FromStr;

const DEFAULT_MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;
const DEFAULT_MAX_JSON_BODY_SIZE: usize = 50 * 1024 * 1024;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address (0.0.0.0 for LAN, 127.0.0.1 for localhost)
    pub bind_addr: String,
    /// CORS allowed origins (comma-separated in env var, `*` allows any)
    pub cors_origins: Vec<String>,
    /// Maximum multipart upload size in bytes
    pub max_upload_size: usize,
    /// Maximum JSON request body size in bytes
    pub max_json_body_size: usize,
    /// Pipeline constants shared by every request
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_addr: "0.0.0.0".to_string(),
            cors_origins: vec!["*".to_string()],
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            max_json_body_size: DEFAULT_MAX_JSON_BODY_SIZE,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Unset keys fall back to defaults; set keys that fail to parse are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut pipeline = defaults.pipeline.clone();

        let port = match lookup("PORT") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidPort)?,
            None => defaults.port,
        };

        pipeline.binary_channel_count =
            parse_or(&lookup, "BINARY_CHANNELS", pipeline.binary_channel_count)?;
        pipeline.min_topomap_channels =
            parse_or(&lookup, "MIN_TOPOMAP_CHANNELS", pipeline.min_topomap_channels)?;
        pipeline.welch_window_cap = parse_or(&lookup, "WELCH_WINDOW_CAP", pipeline.welch_window_cap)?;
        pipeline.default_sample_rate =
            parse_or(&lookup, "DEFAULT_SAMPLE_RATE", pipeline.default_sample_rate)?;

        if pipeline.binary_channel_count == 0 {
            return Err(ConfigError::InvalidValue(
                "BINARY_CHANNELS must be at least 1".to_string(),
            ));
        }
        if pipeline.welch_window_cap < 2 {
            return Err(ConfigError::InvalidValue(
                "WELCH_WINDOW_CAP must be at least 2".to_string(),
            ));
        }
        if pipeline.default_sample_rate == 0 {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_SAMPLE_RATE must be positive".to_string(),
            ));
        }

        Ok(Self {
            port,
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            cors_origins: lookup("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            max_upload_size: parse_or(&lookup, "MAX_UPLOAD_SIZE", defaults.max_upload_size)?,
            max_json_body_size: parse_or(
                &lookup,
                "MAX_JSON_BODY_SIZE",
                defaults.max_json_body_size,
            )?,
            pipeline,
        })
    }

    /// Get the full bind address (addr:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Whether any origin may call the API
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{}={}", key, raw))),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
