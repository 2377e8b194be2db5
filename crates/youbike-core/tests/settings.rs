use std::collections::HashMap;
use std::time::Duration;

use youbike_core::partition::Layout;
use youbike_core::settings::{
    Settings, SettingsError, DEFAULT_KEY_PREFIX, DEFAULT_PUBLIC_BASE_URL, DEFAULT_SOURCE_URL,
};
use youbike_core::PipelineOptions;

fn settings_from(vars: &[(&str, &str)]) -> Result<Settings, SettingsError> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    Settings::from_lookup(|name| vars.get(name).cloned())
}

#[test]
fn missing_bucket_fails_fast() {
    assert!(matches!(settings_from(&[]), Err(SettingsError::MissingBucket)));
    assert!(matches!(
        settings_from(&[("YOUBIKE_BUCKET", "   ")]),
        Err(SettingsError::MissingBucket)
    ));
}

#[test]
fn defaults_apply_when_only_the_bucket_is_set() {
    let settings = settings_from(&[("GCS_BUCKET", "taichunmin-storage")]).unwrap();

    assert_eq!(settings.bucket.bucket, "taichunmin-storage");
    assert_eq!(settings.bucket.region, "auto");
    assert_eq!(settings.source_url, DEFAULT_SOURCE_URL);
    assert_eq!(settings.public_base_url, DEFAULT_PUBLIC_BASE_URL);
    assert_eq!(settings.key_prefix, DEFAULT_KEY_PREFIX);
    assert_eq!(settings.layout, Layout::ByPart);
    assert_eq!(settings.chunk_size, 2000);
    assert_eq!(settings.cache_max_age_secs, 30);
    assert_eq!(settings.fetch_timeout, Duration::from_secs(30));
    assert_eq!(settings.upload_timeout, Duration::from_secs(60));
    assert!(!settings.allow_partial_index);

    assert_eq!(PipelineOptions::from_settings(&settings), PipelineOptions::default());
}

#[test]
fn overrides_are_parsed() {
    let settings = settings_from(&[
        ("YOUBIKE_BUCKET", "primary"),
        ("GCS_BUCKET", "fallback"),
        ("YOUBIKE_LAYOUT", "by-type"),
        ("YOUBIKE_CHUNK_SIZE", "500"),
        ("YOUBIKE_KEY_PREFIX", "/maps/youbike/"),
        ("YOUBIKE_CACHE_MAX_AGE_SECS", "120"),
        ("YOUBIKE_UPLOAD_TIMEOUT_SECS", "5"),
        ("YOUBIKE_ALLOW_PARTIAL_INDEX", "yes"),
        ("YOUBIKE_S3_ENDPOINT", "https://storage.googleapis.com"),
        ("YOUBIKE_S3_FORCE_PATH_STYLE", "true"),
    ])
    .unwrap();

    assert_eq!(settings.bucket.bucket, "primary");
    assert_eq!(
        settings.bucket.endpoint.as_deref(),
        Some("https://storage.googleapis.com")
    );
    assert!(settings.bucket.force_path_style);
    assert_eq!(settings.layout, Layout::ByType);
    assert_eq!(settings.chunk_size, 500);
    assert_eq!(settings.key_prefix, "maps/youbike");
    assert_eq!(settings.cache_max_age_secs, 120);
    assert_eq!(settings.upload_timeout, Duration::from_secs(5));
    assert!(settings.allow_partial_index);
}

#[test]
fn malformed_values_name_the_variable() {
    for (name, value) in [
        ("YOUBIKE_CHUNK_SIZE", "0"),
        ("YOUBIKE_CHUNK_SIZE", "lots"),
        ("YOUBIKE_LAYOUT", "grid"),
        ("YOUBIKE_FETCH_TIMEOUT_SECS", "0"),
        ("YOUBIKE_ALLOW_PARTIAL_INDEX", "maybe"),
    ] {
        let err = settings_from(&[("YOUBIKE_BUCKET", "stations"), (name, value)]).unwrap_err();
        match err {
            SettingsError::Invalid {
                name: reported,
                value: reported_value,
                ..
            } => {
                assert_eq!(reported, name);
                assert_eq!(reported_value, value);
            }
            other => panic!("unexpected error for {name}: {other}"),
        }
    }
}
