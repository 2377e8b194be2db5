pub mod error;
pub mod fetch;
pub mod kml;
pub mod logging;
pub mod partition;
pub mod pipeline;
pub mod publish;
pub mod settings;

pub use error::{ErrorRecord, PipelineError, Result};
pub use pipeline::{cron, cron_with, Pipeline, PipelineOptions, RunReport};
