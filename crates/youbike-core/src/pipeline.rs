//! Orchestration of one run: fetch, partition, convert and publish every
//! chunk concurrently, then publish the index.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Asia::Taipei;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;
use youbike_bucket::S3BucketStore;
use youbike_parser::StationRecord;

use crate::error::{PipelineError, Result};
use crate::fetch::{fetch_stations, CsvSource, HttpCsvSource};
use crate::kml::{network_links_to_kml, stations_to_kml, StyleMode};
use crate::logging::log_failure;
use crate::partition::{partition_for, ChunkId, Layout, DEFAULT_CHUNK_SIZE};
use crate::publish::{PublishedArtifact, Publisher, JSON_CONTENT_TYPE, KML_CONTENT_TYPE};
use crate::settings::{Settings, DEFAULT_KEY_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub layout: Layout,
    pub chunk_size: usize,
    pub key_prefix: String,
    /// Publish an index of the successful chunks even when some failed.
    pub allow_partial_index: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            allow_partial_index: false,
        }
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            layout: settings.layout,
            chunk_size: settings.chunk_size,
            key_prefix: settings.key_prefix.clone(),
            allow_partial_index: settings.allow_partial_index,
        }
    }

    /// `<prefix>/1.kml` or `<prefix>/yb2-1.kml`.
    pub fn chunk_key(&self, id: &ChunkId) -> String {
        format!("{}/{}.kml", self.key_prefix, id.discriminator())
    }

    pub fn index_json_key(&self) -> String {
        format!("{}/index.json", self.key_prefix)
    }

    pub fn index_kml_key(&self) -> String {
        format!("{}/index.kml", self.key_prefix)
    }

    fn style_mode(&self) -> StyleMode {
        match self.layout {
            Layout::ByPart => StyleMode::Icons,
            Layout::ByType => StyleMode::Plain,
        }
    }
}

/// Outcome of a run that reached the index step.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub station_count: usize,
    pub skipped_rows: usize,
    /// Chunk documents in chunk order.
    pub published: Vec<PublishedArtifact>,
    /// Chunks whose upload failed; only non-empty with a partial index.
    pub failed: Vec<(ChunkId, String)>,
    /// `index.json`, followed by `index.kml` for the by-part layout.
    pub index: Vec<PublishedArtifact>,
}

impl RunReport {
    pub fn urls(&self) -> Vec<&str> {
        self.published.iter().map(|artifact| artifact.url.as_str()).collect()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            date: self.date,
            station_count: self.station_count,
            skipped_rows: self.skipped_rows,
            chunks: self
                .published
                .iter()
                .map(ArtifactSummary::from)
                .collect(),
            failed: self
                .failed
                .iter()
                .map(|(id, _)| id.discriminator())
                .collect(),
            index: self.index.iter().map(ArtifactSummary::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub station_count: usize,
    pub skipped_rows: usize,
    pub chunks: Vec<ArtifactSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
    pub index: Vec<ArtifactSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub key: String,
    pub url: String,
    pub bytes: usize,
    pub content_hash: String,
}

impl From<&PublishedArtifact> for ArtifactSummary {
    fn from(artifact: &PublishedArtifact) -> Self {
        Self {
            key: artifact.key.clone(),
            url: artifact.url.clone(),
            bytes: artifact.content.len(),
            content_hash: artifact.content_hash.clone(),
        }
    }
}

pub struct Pipeline {
    source: Arc<dyn CsvSource>,
    publisher: Arc<Publisher>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn CsvSource>,
        publisher: Arc<Publisher>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            source,
            publisher,
            options,
        }
    }

    /// Wires the HTTP source and the S3 store described by `settings`.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let store = S3BucketStore::new(settings.bucket.clone()).await?;
        let publisher = Publisher::new(Arc::new(store), settings.public_base_url.as_str())
            .with_cache_max_age(settings.cache_max_age_secs)
            .with_upload_timeout(settings.upload_timeout);
        let source = HttpCsvSource::new(&settings.source_url, settings.fetch_timeout)?;

        Ok(Self::new(
            Arc::new(source),
            Arc::new(publisher),
            PipelineOptions::from_settings(settings),
        ))
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub async fn run(&self) -> Result<RunReport> {
        self.run_on(today_in_taipei()).await
    }

    /// Runs the pipeline with `date` in the chunk titles.
    pub async fn run_on(&self, date: NaiveDate) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let layout = self.options.layout;
        info!(
            %run_id,
            source = %self.source.describe(),
            bucket = self.publisher.bucket(),
            %layout,
            "Starting station export"
        );

        let parsed = fetch_stations(self.source.as_ref()).await?;
        for issue in &parsed.skipped {
            warn!(
                %run_id,
                line = issue.line,
                field = issue.field,
                value = %issue.value,
                "Skipped station row: {}",
                issue.reason
            );
        }

        let station_count = parsed.stations.len();
        let skipped_rows = parsed.skipped.len();
        let chunks = partition_for(layout, parsed.stations, self.options.chunk_size)?;
        let total = chunks.len();
        info!(%run_id, stations = station_count, chunks = total, "Partitioned stations");

        let styles = self.options.style_mode();
        let mut tasks = JoinSet::new();
        for chunk in chunks {
            let publisher = Arc::clone(&self.publisher);
            let key = self.options.chunk_key(&chunk.id);
            let title = chunk.title(date);
            tasks.spawn(async move {
                let outcome = publish_chunk(&publisher, &key, &title, &chunk.stations, styles).await;
                (chunk.id, outcome)
            });
        }

        let mut outcomes: BTreeMap<ChunkId, Result<PublishedArtifact>> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (id, outcome) = joined?;
            outcomes.insert(id, outcome);
        }

        let mut published = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(artifact) => {
                    info!(
                        %run_id,
                        key = %artifact.key,
                        url = %artifact.url,
                        content_hash = %artifact.content_hash,
                        "Published chunk"
                    );
                    published.push(artifact);
                }
                Err(err) => {
                    warn!(%run_id, chunk = %id, error = %err, "Chunk upload failed");
                    failed.push((id, err.to_string()));
                }
            }
        }

        if !failed.is_empty() && !self.options.allow_partial_index {
            return Err(PipelineError::ChunkUploads {
                failed: failed
                    .iter()
                    .map(|(id, _)| self.options.chunk_key(id))
                    .collect(),
                total,
            });
        }

        let urls: Vec<String> = published.iter().map(|artifact| artifact.url.clone()).collect();
        let mut index = Vec::with_capacity(2);

        let listing = serde_json::to_vec(&urls)?;
        index.push(
            self.publisher
                .publish(&self.options.index_json_key(), listing, JSON_CONTENT_TYPE)
                .await?,
        );
        if layout == Layout::ByPart {
            let overview = network_links_to_kml(&urls)?;
            index.push(
                self.publisher
                    .publish(&self.options.index_kml_key(), overview, KML_CONTENT_TYPE)
                    .await?,
            );
        }

        for artifact in &index {
            info!(
                %run_id,
                key = %artifact.key,
                url = %artifact.url,
                content_hash = %artifact.content_hash,
                entries = urls.len(),
                "Published index"
            );
        }

        Ok(RunReport {
            run_id,
            date,
            station_count,
            skipped_rows,
            published,
            failed,
            index,
        })
    }

    /// Runs once and logs any failure instead of returning it.
    pub async fn cron(&self) -> Option<RunReport> {
        match self.run().await {
            Ok(report) => Some(report),
            Err(err) => {
                log_failure(&err);
                None
            }
        }
    }
}

/// Scheduler entry point reading configuration from the process environment.
pub async fn cron() -> Option<RunReport> {
    cron_with(|name| std::env::var(name).ok()).await
}

/// Builds settings from `lookup`, wires the pipeline and runs it once.
/// Configuration and construction failures are logged like run failures.
pub async fn cron_with<F>(lookup: F) -> Option<RunReport>
where
    F: Fn(&str) -> Option<String>,
{
    let settings = match Settings::from_lookup(lookup) {
        Ok(settings) => settings,
        Err(err) => {
            log_failure(&PipelineError::from(err));
            return None;
        }
    };

    match Pipeline::from_settings(&settings).await {
        Ok(pipeline) => pipeline.cron().await,
        Err(err) => {
            log_failure(&err);
            None
        }
    }
}

pub fn today_in_taipei() -> NaiveDate {
    Utc::now().with_timezone(&Taipei).date_naive()
}

async fn publish_chunk(
    publisher: &Publisher,
    key: &str,
    title: &str,
    stations: &[StationRecord],
    styles: StyleMode,
) -> Result<PublishedArtifact> {
    let document = stations_to_kml(title, stations, styles)?;
    publisher.publish(key, document, KML_CONTENT_TYPE).await
}
