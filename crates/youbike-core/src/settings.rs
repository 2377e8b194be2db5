//! Process configuration, read once from the environment at start-up.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use youbike_bucket::{S3Config, DEFAULT_CACHE_MAX_AGE_SECS};

use crate::partition::{Layout, DEFAULT_CHUNK_SIZE};

pub const DEFAULT_SOURCE_URL: &str =
    "https://gcs-youbike2-linebot.taichunmin.idv.tw/latest-data/youbike-station.csv";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "https://storage-taichunmin.taichunmin.idv.tw";
pub const DEFAULT_KEY_PREFIX: &str = "youbike-kml";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

const BUCKET_VARS: [&str; 2] = ["YOUBIKE_BUCKET", "GCS_BUCKET"];

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("YOUBIKE_BUCKET (or GCS_BUCKET) must be set")]
    MissingBucket,

    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub source_url: String,
    pub public_base_url: String,
    pub key_prefix: String,
    pub layout: Layout,
    pub chunk_size: usize,
    pub cache_max_age_secs: u32,
    pub fetch_timeout: Duration,
    pub upload_timeout: Duration,
    pub allow_partial_index: bool,
    pub bucket: S3Config,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from any variable lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let bucket_name = BUCKET_VARS
            .iter()
            .find_map(|&name| get(name))
            .ok_or(SettingsError::MissingBucket)?;

        let mut bucket = S3Config::new(bucket_name.trim());
        if let Some(region) = get("YOUBIKE_S3_REGION") {
            bucket.region = region;
        }
        bucket.endpoint = get("YOUBIKE_S3_ENDPOINT");
        bucket.access_key_id = get("YOUBIKE_S3_ACCESS_KEY_ID");
        bucket.secret_access_key = get("YOUBIKE_S3_SECRET_ACCESS_KEY");
        bucket.force_path_style = parse_or(
            "YOUBIKE_S3_FORCE_PATH_STYLE",
            get("YOUBIKE_S3_FORCE_PATH_STYLE"),
            false,
            parse_flag,
        )?;

        let chunk_size = parse_or(
            "YOUBIKE_CHUNK_SIZE",
            get("YOUBIKE_CHUNK_SIZE"),
            DEFAULT_CHUNK_SIZE,
            |value| match value.parse::<usize>() {
                Ok(0) => Err("must be greater than zero".to_string()),
                Ok(size) => Ok(size),
                Err(err) => Err(err.to_string()),
            },
        )?;

        Ok(Self {
            source_url: get("YOUBIKE_SOURCE_URL")
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            public_base_url: get("YOUBIKE_PUBLIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string()),
            key_prefix: get("YOUBIKE_KEY_PREFIX")
                .map(|prefix| prefix.trim_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            layout: parse_or(
                "YOUBIKE_LAYOUT",
                get("YOUBIKE_LAYOUT"),
                Layout::default(),
                |value| value.parse::<Layout>(),
            )?,
            chunk_size,
            cache_max_age_secs: parse_or(
                "YOUBIKE_CACHE_MAX_AGE_SECS",
                get("YOUBIKE_CACHE_MAX_AGE_SECS"),
                DEFAULT_CACHE_MAX_AGE_SECS,
                parse_number,
            )?,
            fetch_timeout: parse_or(
                "YOUBIKE_FETCH_TIMEOUT_SECS",
                get("YOUBIKE_FETCH_TIMEOUT_SECS"),
                DEFAULT_FETCH_TIMEOUT,
                parse_seconds,
            )?,
            upload_timeout: parse_or(
                "YOUBIKE_UPLOAD_TIMEOUT_SECS",
                get("YOUBIKE_UPLOAD_TIMEOUT_SECS"),
                DEFAULT_UPLOAD_TIMEOUT,
                parse_seconds,
            )?,
            allow_partial_index: parse_or(
                "YOUBIKE_ALLOW_PARTIAL_INDEX",
                get("YOUBIKE_ALLOW_PARTIAL_INDEX"),
                false,
                parse_flag,
            )?,
            bucket,
        })
    }
}

fn parse_or<T>(
    name: &'static str,
    value: Option<String>,
    default: T,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<T, SettingsError> {
    match value {
        None => Ok(default),
        Some(value) => parse(value.trim()).map_err(|reason| SettingsError::Invalid {
            name,
            value,
            reason,
        }),
    }
}

fn parse_number<T>(value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err: T::Err| err.to_string())
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    match parse_number::<u64>(value)? {
        0 => Err("must be greater than zero".to_string()),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}
