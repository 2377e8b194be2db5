//! Object-store backends the station documents are published to.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ChecksumAlgorithm;
use aws_sdk_s3::Client;
use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

pub const DEFAULT_CACHE_MAX_AGE_SECS: u32 = 30;
pub const DEFAULT_CONTENT_LANGUAGE: &str = "zh";

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

impl S3Config {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: "auto".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
    #[error("sdk error: {0}")]
    Sdk(String),
    #[error("object store unavailable for {key}: {reason}")]
    Unavailable { key: String, reason: String },
}

impl BucketError {
    fn from_sdk(err: impl fmt::Display) -> Self {
        Self::Sdk(err.to_string())
    }
}

/// Headers attached to every uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub cache_max_age_secs: u32,
    pub content_language: String,
    /// Store the body gzip-compressed with `Content-Encoding: gzip`.
    pub gzip: bool,
}

impl ObjectMetadata {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            cache_max_age_secs: DEFAULT_CACHE_MAX_AGE_SECS,
            content_language: DEFAULT_CONTENT_LANGUAGE.to_string(),
            gzip: true,
        }
    }

    pub fn with_cache_max_age(mut self, secs: u32) -> Self {
        self.cache_max_age_secs = secs;
        self
    }

    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.cache_max_age_secs)
    }

    pub fn content_encoding(&self) -> Option<&'static str> {
        self.gzip.then_some("gzip")
    }
}

pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>, BucketError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>, BucketError> {
    let mut decoded = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut decoded)?;
    Ok(decoded)
}

#[async_trait]
pub trait BucketStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Writes `bytes` under `key`, replacing any existing object.
    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), BucketError>;
}

#[derive(Clone)]
pub struct S3BucketStore {
    client: Client,
    bucket: String,
}

impl S3BucketStore {
    pub async fn new(config: S3Config) -> Result<Self, BucketError> {
        if config.bucket.trim().is_empty() {
            return Err(BucketError::Configuration(
                "bucket name cannot be empty".into(),
            ));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(access_key, secret_key, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(credentials));
        }

        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }
}

#[async_trait]
impl BucketStore for S3BucketStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), BucketError> {
        let body = if metadata.gzip {
            gzip(&bytes)?
        } else {
            bytes.to_vec()
        };

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(&metadata.content_type)
            .cache_control(metadata.cache_control())
            .content_language(&metadata.content_language)
            .checksum_algorithm(ChecksumAlgorithm::Crc32C);

        if let Some(encoding) = metadata.content_encoding() {
            request = request.content_encoding(encoding);
        }

        request.send().await.map_err(BucketError::from_sdk)?;
        Ok(())
    }
}

/// An object as the store holds it: the body is still gzip-encoded when the
/// metadata asked for compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub metadata: ObjectMetadata,
}

impl StoredObject {
    pub fn decoded(&self) -> Result<Vec<u8>, BucketError> {
        if self.metadata.gzip {
            gunzip(&self.body)
        } else {
            Ok(self.body.to_vec())
        }
    }
}

/// Process-local store used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryBucketStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    puts: Mutex<Vec<String>>,
    failing_keys: HashSet<String>,
}

impl MemoryBucketStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Every put to `key` fails with [`BucketError::Unavailable`].
    pub fn failing_on(mut self, key: impl Into<String>) -> Self {
        self.failing_keys.insert(key.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.lock_objects().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock_objects().keys().cloned().collect()
    }

    /// Keys in the order puts were attempted, failed ones included.
    pub fn put_log(&self) -> Vec<String> {
        self.puts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), BucketError> {
        self.puts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(key.to_string());

        if self.failing_keys.contains(key) {
            return Err(BucketError::Unavailable {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let body = if metadata.gzip {
            Bytes::from(gzip(&bytes)?)
        } else {
            bytes
        };

        self.lock_objects().insert(
            key.to_string(),
            StoredObject {
                body,
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }
}
