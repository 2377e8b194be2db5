use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use youbike_bucket::{BucketStore, ObjectMetadata, DEFAULT_CACHE_MAX_AGE_SECS};

use crate::error::{PipelineError, Result};
use crate::settings::DEFAULT_UPLOAD_TIMEOUT;

pub const KML_CONTENT_TYPE: &str = "application/vnd.google-earth.kml+xml; charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Record of one completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub key: String,
    pub url: String,
    pub content: Bytes,
    pub content_type: String,
    pub cache_max_age_secs: u32,
    /// blake3 digest of `content`, hex encoded.
    pub content_hash: String,
}

/// Uploads documents to one bucket and maps destination keys to public URLs.
pub struct Publisher {
    store: Arc<dyn BucketStore>,
    public_base_url: String,
    cache_max_age_secs: u32,
    upload_timeout: Duration,
}

impl Publisher {
    pub fn new(store: Arc<dyn BucketStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            cache_max_age_secs: DEFAULT_CACHE_MAX_AGE_SECS,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    pub fn with_cache_max_age(mut self, secs: u32) -> Self {
        self.cache_max_age_secs = secs;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    pub async fn publish(
        &self,
        key: &str,
        payload: impl Into<Bytes>,
        content_type: &str,
    ) -> Result<PublishedArtifact> {
        self.publish_with_max_age(key, payload, content_type, self.cache_max_age_secs)
            .await
    }

    /// Gzip-encoded upload with `Cache-Control: public, max-age=<n>`; fails
    /// with [`PipelineError::Timeout`] when the store does not answer in time.
    pub async fn publish_with_max_age(
        &self,
        key: &str,
        payload: impl Into<Bytes>,
        content_type: &str,
        cache_max_age_secs: u32,
    ) -> Result<PublishedArtifact> {
        let content: Bytes = payload.into();
        let metadata = ObjectMetadata::new(content_type).with_cache_max_age(cache_max_age_secs);

        tokio::time::timeout(
            self.upload_timeout,
            self.store.put_object(key, content.clone(), &metadata),
        )
        .await
        .map_err(|_| PipelineError::Timeout {
            operation: "upload",
            target: key.to_string(),
            seconds: self.upload_timeout.as_secs(),
        })?
        .map_err(|source| PipelineError::Upload {
            key: key.to_string(),
            source,
        })?;

        Ok(PublishedArtifact {
            key: key.to_string(),
            url: self.public_url(key),
            content_hash: blake3::hash(&content).to_hex().to_string(),
            content,
            content_type: content_type.to_string(),
            cache_max_age_secs,
        })
    }
}
