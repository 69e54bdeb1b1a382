//! Tests for loading server configuration from disk.

use std::io::Write;
use strictly_duel::ServerConfig;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes()).expect("Failed to write config");
    file
}

#[test]
fn test_full_config_file() {
    let file = write_config("host = \"0.0.0.0\"\nport = 9000\n");
    let config = ServerConfig::from_file(file.path()).expect("Config should load");
    assert_eq!(config, ServerConfig::new("0.0.0.0", 9000));
}

#[test]
fn test_missing_keys_use_defaults() {
    let file = write_config("port = 7000\n");
    let config = ServerConfig::from_file(file.path()).expect("Config should load");
    assert_eq!(config.addr(), "127.0.0.1:7000");
}

#[test]
fn test_cli_overrides_file() {
    let file = write_config("host = \"0.0.0.0\"\nport = 9000\n");
    let config = ServerConfig::from_file(file.path())
        .expect("Config should load")
        .with_overrides(None, Some(9100));
    assert_eq!(config.addr(), "0.0.0.0:9100");
}

#[test]
fn test_bad_config_is_an_error() {
    let file = write_config("port = \"not a number\"\n");
    let err = ServerConfig::from_file(file.path()).unwrap_err();
    assert!(err.message.contains("Failed to parse config"));

    let err = ServerConfig::from_file("/definitely/not/here.toml").unwrap_err();
    assert!(err.message.contains("Failed to read config file"));
}
