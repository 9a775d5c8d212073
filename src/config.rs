use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_UPLOAD_PATH: &str = "./uploads";
const DEFAULT_UPLOAD_URI: &str = "/uploads";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_MAX_IMAGE_PIXELS: u64 = 40_000_000;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Which storage backend holds uploaded media.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    Filesystem {
        upload_path: PathBuf,
        upload_uri: String,
    },
    S3(S3Config),
}

#[derive(Debug, Clone, PartialEq)]
pub struct S3Config {
    pub bucket_name: String,
    pub aws_region: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub s3_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: String,
    pub provider: ProviderConfig,
    pub max_upload_bytes: usize,
    pub max_image_pixels: u64,
    pub upstream_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let listen_addr = var("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());

        let provider = match var("MEDIA_PROVIDER").as_deref().unwrap_or("filesystem") {
            "filesystem" => ProviderConfig::Filesystem {
                upload_path: var("MEDIA_UPLOAD_PATH")
                    .unwrap_or_else(|| DEFAULT_UPLOAD_PATH.to_string())
                    .into(),
                upload_uri: var("MEDIA_UPLOAD_URI")
                    .unwrap_or_else(|| DEFAULT_UPLOAD_URI.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
            "s3" => ProviderConfig::S3(S3Config {
                bucket_name: var("S3_BUCKET_NAME").ok_or(ConfigError::Missing("S3_BUCKET_NAME"))?,
                aws_region: var("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                aws_access_key_id: var("AWS_ACCESS_KEY_ID"),
                aws_secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
                s3_endpoint: var("S3_ENDPOINT"),
            }),
            other => {
                return Err(ConfigError::Invalid {
                    name: "MEDIA_PROVIDER",
                    value: other.to_string(),
                })
            }
        };

        let max_upload_bytes = parse_or("MAX_UPLOAD_BYTES", var("MAX_UPLOAD_BYTES"), DEFAULT_MAX_UPLOAD_BYTES)?;
        let max_image_pixels = parse_or("MAX_IMAGE_PIXELS", var("MAX_IMAGE_PIXELS"), DEFAULT_MAX_IMAGE_PIXELS)?;
        let timeout_secs = parse_or(
            "UPSTREAM_TIMEOUT_SECS",
            var("UPSTREAM_TIMEOUT_SECS"),
            DEFAULT_UPSTREAM_TIMEOUT_SECS,
        )?;

        Ok(Self {
            database_url,
            listen_addr,
            provider,
            max_upload_bytes,
            max_image_pixels,
            upstream_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
