#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;
use youbike_bucket::{BucketStore, MemoryBucketStore};
use youbike_core::fetch::CsvSource;
use youbike_core::logging::json_subscriber;
use youbike_core::publish::Publisher;
use youbike_core::{Pipeline, PipelineError, PipelineOptions};

pub const PUBLIC_BASE_URL: &str = "https://cdn.example.test";
pub const HEADER: &str = "name,city,area,address,space,type,lat,lng";

pub fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date")
}

/// CSV with `count` stations of each `(type code, count)` group, in order.
pub fn station_csv(groups: &[(u8, usize)]) -> String {
    let mut csv = String::from(HEADER);
    let mut index = 0;
    for &(station_type, count) in groups {
        for _ in 0..count {
            index += 1;
            csv.push_str(&format!(
                "\n站點 {index},臺北市,信義區,市府路{index}號,{},{station_type},25.{:06},121.{:06}",
                index % 50,
                index,
                index
            ));
        }
    }
    csv
}

pub struct StaticCsv(pub String);

#[async_trait]
impl CsvSource for StaticCsv {
    fn describe(&self) -> String {
        "static fixture".to_string()
    }

    async fn fetch_csv(&self) -> youbike_core::Result<String> {
        Ok(self.0.clone())
    }
}

pub struct UnreachableCsv;

#[async_trait]
impl CsvSource for UnreachableCsv {
    fn describe(&self) -> String {
        "http://source.invalid/stations.csv".to_string()
    }

    async fn fetch_csv(&self) -> youbike_core::Result<String> {
        Err(PipelineError::Fetch {
            url: self.describe(),
            status: None,
            reason: "connection refused".to_string(),
        })
    }
}

pub fn pipeline(
    source: impl CsvSource + 'static,
    store: &Arc<MemoryBucketStore>,
    options: PipelineOptions,
) -> Pipeline {
    let store: Arc<dyn BucketStore> = store.clone();
    let publisher = Publisher::new(store, PUBLIC_BASE_URL);
    Pipeline::new(Arc::new(source), Arc::new(publisher), options)
}

pub fn decoded_text(store: &MemoryBucketStore, key: &str) -> String {
    let object = store
        .get(key)
        .unwrap_or_else(|| panic!("{key} should be stored"));
    String::from_utf8(object.decoded().expect("gunzip")).expect("utf-8 body")
}

/// Log lines written through the severity JSON formatter.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Installs a subscriber for the current thread that writes into this
    /// buffer.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = json_subscriber(self.clone(), EnvFilter::new("debug"));
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).expect("each log line is JSON"))
            .collect()
    }

    pub fn with_severity(&self, severity: &str) -> Vec<Value> {
        self.lines()
            .into_iter()
            .filter(|line| line["severity"] == severity)
            .collect()
    }
}

pub struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter(Arc::clone(&self.0))
    }
}
