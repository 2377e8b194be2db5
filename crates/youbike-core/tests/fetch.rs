use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use youbike_core::fetch::{fetch_stations, CsvSource, FileCsvSource, HttpCsvSource, CACHE_BUST_PARAM};
use youbike_core::PipelineError;

const CSV: &str = "name,city,area,address,space,type,lat,lng\n\
捷運市政府站(3號出口),臺北市,信義區,忠孝東路/基隆路(東南側),60,2,25.0408578889,121.567904444\n";

async fn serve(router: Router) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{addr}"))
}

async fn stations(Query(params): Query<HashMap<String, String>>) -> (StatusCode, String) {
    match params.get(CACHE_BUST_PARAM).map(|value| value.parse::<i64>()) {
        Some(Ok(_)) => (StatusCode::OK, format!("\n\n{CSV}\n   ")),
        _ => (StatusCode::BAD_REQUEST, "missing cachebust".to_string()),
    }
}

#[tokio::test]
async fn fetches_with_a_cache_buster_and_trims_the_body() -> Result<()> {
    let base = serve(Router::new().route("/youbike-station.csv", get(stations))).await?;
    let source = HttpCsvSource::new(&format!("{base}/youbike-station.csv"), Duration::from_secs(5))?;

    let parsed = fetch_stations(&source).await?;

    assert_eq!(parsed.stations.len(), 1);
    assert_eq!(parsed.stations[0].name, "捷運市政府站(3號出口)");
    assert_eq!(parsed.stations[0].latitude.to_string(), "25.040858");
    assert!(parsed.skipped.is_empty());
    Ok(())
}

#[tokio::test]
async fn error_statuses_are_reported() -> Result<()> {
    let router = Router::new().route(
        "/youbike-station.csv",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance") }),
    );
    let base = serve(router).await?;
    let url = format!("{base}/youbike-station.csv");
    let source = HttpCsvSource::new(&url, Duration::from_secs(5))?;

    let err = source.fetch_csv().await.unwrap_err();

    match err {
        PipelineError::Fetch {
            url: reported,
            status,
            ..
        } => {
            assert_eq!(reported, url);
            assert_eq!(status, Some(503));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn slow_sources_time_out() -> Result<()> {
    let router = Router::new().route(
        "/youbike-station.csv",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            CSV
        }),
    );
    let base = serve(router).await?;
    let source = HttpCsvSource::new(&format!("{base}/youbike-station.csv"), Duration::from_secs(1))?;

    let err = source.fetch_csv().await.unwrap_err();

    assert!(
        matches!(err, PipelineError::Timeout { operation: "fetch", seconds: 1, .. }),
        "unexpected error: {err}"
    );
    Ok(())
}

#[test]
fn cache_buster_is_appended_to_existing_queries() -> Result<()> {
    let source = HttpCsvSource::new(
        "https://example.test/latest-data/youbike-station.csv?lang=zh",
        Duration::from_secs(5),
    )?;

    let url = source.request_url(1_714_521_600_000);

    assert_eq!(
        url.as_str(),
        "https://example.test/latest-data/youbike-station.csv?lang=zh&cachebust=1714521600000"
    );
    Ok(())
}

#[test]
fn invalid_source_urls_are_rejected() {
    let err = HttpCsvSource::new("not a url", Duration::from_secs(5)).unwrap_err();
    assert!(matches!(err, PipelineError::Fetch { status: None, .. }));
}

#[tokio::test]
async fn missing_local_file_is_an_io_error() {
    let source = FileCsvSource::new("/nonexistent/youbike-station.csv");
    let err = source.fetch_csv().await.unwrap_err();
    assert!(matches!(err, PipelineError::Io(_)));
}
