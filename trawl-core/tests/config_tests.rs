// Tests for configuration loading

use std::io::Write;
use tempfile::{NamedTempFile, TempDir};
use trawl_core::{Aggregator, Config};

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[checkers]
timeout_secs = 3

[intel]
virustotal_api_key = "abc"
"#
    )
    .unwrap();

    let config = Config::load_or_default(Some(file.path())).unwrap();
    assert_eq!(config.checkers.timeout_secs, 3);
    assert_eq!(config.intel.virustotal_api_key.as_deref(), Some("abc"));
    assert_eq!(config.server.bind, "127.0.0.1:3001");
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(Config::load_or_default(Some(&path)).is_err());
}

#[test]
fn test_invalid_toml_is_an_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[checkers\ntimeout_secs = ").unwrap();
    assert!(Config::load(file.path()).is_err());
}

#[test]
fn test_aggregator_from_config_uses_registry_file() {
    let dir = TempDir::new().unwrap();
    let registry_path = dir.path().join("registry.json");
    std::fs::write(
        &registry_path,
        r#"{"entities": [{"id": "a", "name": "A", "category": "tech"}],
            "domains": [{"domain": "a.example", "entityId": "a"}]}"#,
    )
    .unwrap();

    let mut config = Config::default();
    config.registry.path = Some(registry_path.to_string_lossy().into_owned());
    assert!(Aggregator::from_config(&config).is_ok());

    config.registry.path = Some(dir.path().join("missing.json").to_string_lossy().into_owned());
    assert!(Aggregator::from_config(&config).is_err());
}
