use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use youbike_parser::{parse_station_csv, ParsedStations};

use crate::error::{PipelineError, Result};

pub const CACHE_BUST_PARAM: &str = "cachebust";

/// Where the station CSV comes from.
#[async_trait]
pub trait CsvSource: Send + Sync {
    /// Human readable origin, used in logs and errors.
    fn describe(&self) -> String;

    async fn fetch_csv(&self) -> Result<String>;
}

/// Downloads the CSV over HTTP, appending `cachebust=<epoch millis>` so
/// intermediate caches are skipped.
#[derive(Debug, Clone)]
pub struct HttpCsvSource {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpCsvSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).map_err(|err| PipelineError::Fetch {
            url: url.to_string(),
            status: None,
            reason: format!("invalid URL: {err}"),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| PipelineError::Fetch {
                url: url.to_string(),
                status: None,
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    pub fn request_url(&self, cache_bust: i64) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair(CACHE_BUST_PARAM, &cache_bust.to_string());
        url
    }

    fn request_error(&self, err: reqwest::Error) -> PipelineError {
        if err.is_timeout() {
            return PipelineError::Timeout {
                operation: "fetch",
                target: self.url.to_string(),
                seconds: self.timeout.as_secs(),
            };
        }
        PipelineError::Fetch {
            url: self.url.to_string(),
            status: err.status().map(|status| status.as_u16()),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl CsvSource for HttpCsvSource {
    fn describe(&self) -> String {
        self.url.to_string()
    }

    async fn fetch_csv(&self) -> Result<String> {
        let url = self.request_url(Utc::now().timestamp_millis());
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| self.request_error(err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Fetch {
                url: self.url.to_string(),
                status: Some(status.as_u16()),
                reason: format!("unexpected status {status}"),
            });
        }

        response.text().await.map_err(|err| self.request_error(err))
    }
}

/// Reads the CSV from a local file; used for offline rendering.
#[derive(Debug, Clone)]
pub struct FileCsvSource {
    path: PathBuf,
}

impl FileCsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CsvSource for FileCsvSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch_csv(&self) -> Result<String> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }
}

/// Fetches the CSV and parses it into stations; whitespace around the body
/// is ignored and an empty body yields no stations.
pub async fn fetch_stations(source: &dyn CsvSource) -> Result<ParsedStations> {
    let text = source.fetch_csv().await?;
    Ok(parse_station_csv(text.trim())?)
}
