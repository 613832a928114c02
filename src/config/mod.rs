use serde::Deserialize;

use crate::services::review_queue::ReviewSettings;

const FALLBACK_ANIMAL_TYPE: &str = "other";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// How many worker results are requested per submitted photo.
    #[serde(default = "default_results_per_image")]
    pub results_per_image: u32,

    /// Number of confirmed jobs kept in the display carousel.
    #[serde(default = "default_carousel_size")]
    pub carousel_size: usize,

    /// Accepted animal types (comma-separated).
    #[serde(default)]
    pub animal_types: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "default_upload_limit_bytes")]
    pub upload_limit_bytes: usize,

    /// Fixed seed for compositing noise. Random when unset.
    #[serde(default)]
    pub noise_seed: Option<u64>,

    /// R2 bucket name
    pub r2_bucket: Option<String>,

    /// R2 endpoint URL
    pub r2_endpoint: Option<String>,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: Option<String>,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: Option<String>,

    /// Review server base URL (worker process only).
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Worker idle poll interval in milliseconds.
    #[serde(default = "default_worker_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,
}

/// Connection settings for the R2 archive.
#[derive(Debug, Clone)]
pub struct R2Settings {
    pub bucket: String,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_results_per_image() -> u32 {
    1
}

fn default_carousel_size() -> usize {
    10
}

fn default_upload_limit_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_server_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_worker_poll_interval_ms() -> u64 {
    1000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Build from explicit `(NAME, value)` pairs instead of the process environment.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(pairs)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.results_per_image == 0 {
            return Err(ConfigError::InvalidQuota);
        }
        Ok(())
    }

    /// Configured animal types; "other" is always accepted.
    pub fn animal_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .animal_types
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if !types.iter().any(|t| t == FALLBACK_ANIMAL_TYPE) {
            types.push(FALLBACK_ANIMAL_TYPE.to_string());
        }
        types
    }

    pub fn review_settings(&self) -> ReviewSettings {
        ReviewSettings {
            results_per_image: self.results_per_image,
            carousel_size: self.carousel_size,
            noise_seed: self.noise_seed,
        }
    }

    /// R2 settings, if every R2 variable is present.
    pub fn r2_settings(&self) -> Option<R2Settings> {
        Some(R2Settings {
            bucket: self.r2_bucket.clone()?,
            endpoint: self.r2_endpoint.clone()?,
            access_key: self.r2_access_key.clone()?,
            secret_key: self.r2_secret_key.clone()?,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            results_per_image: default_results_per_image(),
            carousel_size: default_carousel_size(),
            animal_types: Vec::new(),
            upload_limit_bytes: default_upload_limit_bytes(),
            noise_seed: None,
            r2_bucket: None,
            r2_endpoint: None,
            r2_access_key: None,
            r2_secret_key: None,
            server_url: default_server_url(),
            worker_poll_interval_ms: default_worker_poll_interval_ms(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Env(#[from] envy::Error),

    #[error("RESULTS_PER_IMAGE must be at least 1")]
    InvalidQuota,
}
