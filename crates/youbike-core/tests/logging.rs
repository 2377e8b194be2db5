mod common;

use common::CapturedLogs;
use tracing::Level;
use youbike_bucket::BucketError;
use youbike_core::logging::{log_failure, Severity};
use youbike_core::settings::SettingsError;
use youbike_core::PipelineError;

#[test]
fn levels_map_to_severities() {
    assert_eq!(Severity::from_level(&Level::TRACE), Severity::Default);
    assert_eq!(Severity::from_level(&Level::DEBUG), Severity::Debug);
    assert_eq!(Severity::from_level(&Level::INFO), Severity::Info);
    assert_eq!(Severity::from_level(&Level::WARN), Severity::Warning);
    assert_eq!(Severity::from_level(&Level::ERROR), Severity::Error);
}

#[test]
fn every_severity_round_trips_through_its_name() {
    for severity in Severity::ALL {
        assert_eq!(severity.as_str().parse::<Severity>(), Ok(severity));
    }
    assert_eq!("notice".parse::<Severity>(), Ok(Severity::Notice));
    assert!("loud".parse::<Severity>().is_err());
}

#[test]
fn events_become_one_json_object_per_line() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    tracing::info!(key = "youbike-kml/1.kml", entries = 3_u64, "Published chunk");
    tracing::warn!(line = 7_u64, "Skipped station row");

    let lines = logs.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["severity"], "INFO");
    assert_eq!(lines[0]["message"], "Published chunk");
    assert_eq!(lines[0]["key"], "youbike-kml/1.kml");
    assert_eq!(lines[0]["entries"], 3);
    assert_eq!(lines[1]["severity"], "WARNING");
    assert_eq!(lines[1]["line"], 7);
}

#[test]
fn explicit_severity_field_overrides_the_level() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    tracing::error!(severity = "CRITICAL", "Bucket unreachable");
    tracing::info!(severity = "NOTICE", "Index republished");
    tracing::warn!(severity = "shouting", "Unknown severity name");

    let lines = logs.lines();
    assert_eq!(lines[0]["severity"], "CRITICAL");
    assert_eq!(lines[1]["severity"], "NOTICE");
    assert_eq!(lines[2]["severity"], "WARNING");
}

#[test]
fn failures_are_logged_with_allow_listed_fields() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    log_failure(&PipelineError::Upload {
        key: "youbike-kml/2.kml".to_string(),
        source: BucketError::Sdk("service unavailable".to_string()),
    });

    let lines = logs.with_severity("ERROR");
    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert_eq!(line["name"], "UploadError");
    assert_eq!(line["code"], "upload_failed");
    assert_eq!(line["path"], "youbike-kml/2.kml");
    assert!(line["stack"]
        .as_str()
        .unwrap()
        .contains("service unavailable"));
    assert!(line.get("status").is_none());
    assert!(line.get("url").is_none());
}

#[test]
fn error_records_project_http_status() {
    let err = PipelineError::Fetch {
        url: "https://example.test/stations.csv".to_string(),
        status: Some(503),
        reason: "unexpected status 503 Service Unavailable".to_string(),
    };

    let record = err.to_record();

    assert_eq!(record.code, "fetch_status");
    assert_eq!(record.status, Some(503));
    assert_eq!(record.url.as_deref(), Some("https://example.test/stations.csv"));
    assert_eq!(record.stack, None);

    let missing = PipelineError::from(SettingsError::MissingBucket).to_record();
    assert_eq!(missing.code, "missing_bucket");
    assert!(missing.message.contains("YOUBIKE_BUCKET"));
}
