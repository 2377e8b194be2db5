// crates/youbike-core/src/error.rs

use std::error::Error as StdError;

use thiserror::Error;
use youbike_bucket::BucketError;
use youbike_parser::ParserError;

use crate::settings::SettingsError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to fetch {url}: {reason}")]
    Fetch {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Station CSV parsing failed: {0}")]
    Parse(#[from] ParserError),

    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("KML serialization failed: {0}")]
    Convert(String),

    #[error("Object store setup failed: {0}")]
    Bucket(#[from] BucketError),

    #[error("Upload of {key} failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: BucketError,
    },

    #[error("{operation} of {target} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        target: String,
        seconds: u64,
    },

    #[error("Chunk task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{} of {total} chunk uploads failed: {}", failed.len(), failed.join(", "))]
    ChunkUploads { failed: Vec<String>, total: usize },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// The fields of an error that are safe to put in a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub name: &'static str,
    pub code: &'static str,
    pub message: String,
    pub status: Option<u16>,
    pub url: Option<String>,
    pub path: Option<String>,
    pub reason: Option<String>,
    /// `source()` chain below the top-level message, outermost first.
    pub stack: Option<String>,
}

impl PipelineError {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineError::Settings(_) => "SettingsError",
            PipelineError::Fetch { .. } => "FetchError",
            PipelineError::Parse(_) => "ParseError",
            PipelineError::InvalidChunkSize => "PartitionError",
            PipelineError::Convert(_) => "ConvertError",
            PipelineError::Bucket(_) => "BucketError",
            PipelineError::Upload { .. } => "UploadError",
            PipelineError::Timeout { .. } => "TimeoutError",
            PipelineError::Task(_) => "TaskError",
            PipelineError::ChunkUploads { .. } => "ChunkUploadError",
            PipelineError::Json(_) => "JsonError",
            PipelineError::Io(_) => "IoError",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Settings(SettingsError::MissingBucket) => "missing_bucket",
            PipelineError::Settings(_) => "invalid_setting",
            PipelineError::Fetch { status: Some(_), .. } => "fetch_status",
            PipelineError::Fetch { .. } => "fetch_failed",
            PipelineError::Parse(_) => "parse_failed",
            PipelineError::InvalidChunkSize => "invalid_chunk_size",
            PipelineError::Convert(_) => "convert_failed",
            PipelineError::Bucket(_) => "bucket_unavailable",
            PipelineError::Upload { .. } => "upload_failed",
            PipelineError::Timeout { .. } => "timeout",
            PipelineError::Task(_) => "task_failed",
            PipelineError::ChunkUploads { .. } => "chunk_uploads_failed",
            PipelineError::Json(_) => "json_failed",
            PipelineError::Io(_) => "io_failed",
        }
    }

    pub fn to_record(&self) -> ErrorRecord {
        let (status, url, path, reason) = match self {
            PipelineError::Fetch {
                url,
                status,
                reason,
            } => (*status, Some(url.clone()), None, Some(reason.clone())),
            PipelineError::Upload { key, .. } => (None, None, Some(key.clone()), None),
            PipelineError::Timeout { target, .. } => (None, None, Some(target.clone()), None),
            PipelineError::ChunkUploads { failed, .. } => {
                (None, None, None, Some(failed.join(", ")))
            }
            _ => (None, None, None, None),
        };

        let mut chain = Vec::new();
        let mut source = self.source();
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        ErrorRecord {
            name: self.name(),
            code: self.code(),
            message: self.to_string(),
            status,
            url,
            path,
            reason,
            stack: (!chain.is_empty()).then(|| chain.join("\n")),
        }
    }
}
