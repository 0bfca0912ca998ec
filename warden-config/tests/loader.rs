use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use warden_config::{ConfigLoadError, ConfigLoader};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name: &str| map.get(name).cloned()
}

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn defaults_apply_without_sources() {
    let load = ConfigLoader::new()
        .load_with(lookup(&[("WARDEN_TOKEN_STORE", "/tmp/t.json")]))
        .expect("defaults load");

    let config = load.config;
    assert_eq!(config.api.base_url, "http://localhost:8000");
    assert_eq!(config.api.refresh_path, "/auth/refresh/");
    assert_eq!(config.refresh.check_interval, Duration::from_secs(60));
    assert_eq!(config.refresh.expiry_buffer, Duration::from_secs(300));
    assert_eq!(config.refresh.max_session_lifetime, None);
    assert_eq!(config.storage.access_key, "access_token");
    assert_eq!(config.storage.refresh_key, "refresh_token");
}

#[test]
fn file_values_are_overridden_by_environment() {
    let file = write_temp(
        r#"
[api]
base_url = "https://file.example.test"
request_timeout = "10s"

[refresh]
expiry_buffer = "10m"
max_session_lifetime = "30days"

[storage]
path = "/var/lib/warden/tokens.json"
access_key = "acc"
refresh_key = "ref"
"#,
    );

    let load = ConfigLoader::new()
        .with_config_path(file.path())
        .load_with(lookup(&[
            ("WARDEN_BASE_URL", "https://env.example.test"),
            ("WARDEN_EXPIRY_BUFFER", "2m"),
        ]))
        .expect("layered load");

    let config = load.config;
    assert_eq!(config.api.base_url, "https://env.example.test");
    assert_eq!(config.api.request_timeout, Duration::from_secs(10));
    assert_eq!(config.refresh.expiry_buffer, Duration::from_secs(120));
    assert_eq!(
        config.refresh.max_session_lifetime,
        Some(Duration::from_secs(30 * 24 * 60 * 60))
    );
    assert_eq!(
        config.storage.path.as_deref(),
        Some(std::path::Path::new("/var/lib/warden/tokens.json"))
    );
    assert_eq!(config.storage.access_key, "acc");
}

#[test]
fn env_file_fills_gaps_below_real_environment() {
    let dotenv = write_temp(
        "WARDEN_BASE_URL=https://dotenv.example.test\nWARDEN_CHECK_INTERVAL=30s\n",
    );

    let load = ConfigLoader::new()
        .with_env_file(dotenv.path())
        .load_with(lookup(&[
            ("WARDEN_CHECK_INTERVAL", "45s"),
            ("WARDEN_TOKEN_STORE", "/tmp/t.json"),
        ]))
        .expect("dotenv load");

    assert_eq!(load.config.api.base_url, "https://dotenv.example.test");
    assert_eq!(
        load.config.refresh.check_interval,
        Duration::from_secs(45)
    );
}

#[test]
fn invalid_duration_names_the_field() {
    let err = ConfigLoader::new()
        .load_with(lookup(&[("WARDEN_REFRESH_TIMEOUT", "eventually")]))
        .unwrap_err();

    match err {
        ConfigLoadError::InvalidDuration { field, value, .. } => {
            assert_eq!(field, "refresh.timeout");
            assert_eq!(value, "eventually");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_base_url_is_rejected() {
    let err = ConfigLoader::new()
        .load_with(lookup(&[("WARDEN_BASE_URL", "not a url")]))
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::InvalidBaseUrl { .. }));
}

#[test]
fn missing_config_file_is_an_error() {
    let err = ConfigLoader::new()
        .with_config_path("/definitely/not/here.toml")
        .load_with(lookup(&[]))
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::FileIo { .. }));
}

#[test]
fn narrow_buffer_surfaces_a_warning() {
    let load = ConfigLoader::new()
        .load_with(lookup(&[
            ("WARDEN_EXPIRY_BUFFER", "30s"),
            ("WARDEN_TOKEN_STORE", "/tmp/t.json"),
        ]))
        .expect("load with warning");
    assert_eq!(load.warnings.items.len(), 1);
}
