//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bacnet_stack::config::{BacnetConfig, ClientConfig, LoggingConfig};
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = BacnetConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_zero_port() {
    let mut config = BacnetConfig::default();
    config.client.port = 0;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Port cannot be 0")));
}

#[test]
fn test_invalid_interface() {
    let mut config = BacnetConfig::default();
    config.client.interface = Some("eth0".to_string());

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid interface address")));
    assert!(config.client.bind_address().is_err());
}

#[test]
fn test_invalid_broadcast_address() {
    let mut config = BacnetConfig::default();
    config.client.broadcast_address = "192.168.1".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid broadcast address")));
    assert!(config.client.broadcast_target().is_err());
}

#[test]
fn test_apdu_timeout_bounds() {
    let mut config = BacnetConfig::default();
    config.client.apdu_timeout = Duration::from_millis(5);
    config.client.sweep_interval = Duration::from_millis(1);
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("APDU timeout too short")));

    config.client.apdu_timeout = Duration::from_secs(301);
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("APDU timeout too long")));
}

#[test]
fn test_sweep_interval_bounds() {
    let mut config = BacnetConfig::default();
    config.client.sweep_interval = Duration::ZERO;
    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Sweep interval must be greater than 0")));

    config.client.sweep_interval = config.client.apdu_timeout + Duration::from_millis(1);
    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("cannot be longer than the APDU timeout")));
}

#[test]
fn test_max_apdu_must_be_a_standard_size() {
    for valid in [50u16, 128, 206, 480, 1024, 1476] {
        let config = ClientConfig {
            max_apdu: valid,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_empty(), "{valid} rejected");
    }

    let config = ClientConfig {
        max_apdu: 1500,
        ..ClientConfig::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Invalid max APDU: 1500")));
}

#[test]
fn test_zero_discovery_capacity() {
    let config = ClientConfig {
        discovery_capacity: 0,
        ..ClientConfig::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Discovery capacity must be greater than 0")));
}

#[test]
fn test_addresses_derive_from_port() {
    let config = ClientConfig {
        port: 47809,
        interface: Some("192.168.1.20".to_string()),
        broadcast_address: "192.168.1.255".to_string(),
        ..ClientConfig::default()
    };
    assert_eq!(
        config.bind_address().unwrap(),
        "192.168.1.20:47809".parse().unwrap()
    );
    assert_eq!(
        config.broadcast_target().unwrap(),
        "192.168.1.255:47809".parse().unwrap()
    );
    assert_eq!(
        ClientConfig::default().bind_address().unwrap(),
        "0.0.0.0:47808".parse().unwrap()
    );
}

#[test]
fn test_empty_app_name() {
    let config = LoggingConfig {
        app_name: String::new(),
        ..LoggingConfig::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_app_name_too_long() {
    let config = LoggingConfig {
        app_name: "a".repeat(65),
        ..LoggingConfig::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Application name too long")));
}

#[test]
fn test_missing_log_directory() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope").join("client.log");
    let config = LoggingConfig {
        log_file_path: Some(missing.display().to_string()),
        ..LoggingConfig::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Log file directory does not exist")));

    let present = dir.path().join("client.log");
    let config = LoggingConfig {
        log_file_path: Some(present.display().to_string()),
        ..LoggingConfig::default()
    };
    assert!(config.validate().is_empty());
}

#[test]
fn test_multiple_errors_reported_together() {
    let mut config = BacnetConfig::default();
    config.client.port = 0;
    config.client.discovery_capacity = 0;
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors.len() >= 3, "expected three errors, got {errors:?}");
}

#[test]
fn test_validate_strict() {
    assert!(BacnetConfig::default().validate_strict().is_ok());

    let mut config = BacnetConfig::default();
    config.client.port = 0;
    let message = config.validate_strict().unwrap_err().to_string();
    assert!(message.contains("Configuration validation failed"));
    assert!(message.contains("Port cannot be 0"));
}

#[test]
fn test_from_toml_with_partial_sections() {
    let config = BacnetConfig::from_toml(
        r#"
        [client]
        port = 47809
        broadcast_address = "10.0.0.255"
        apdu_timeout = 1500
        sweep_interval = 25
        max_apdu = 480
        discovery_capacity = 16

        [logging]
        app_name = "site-survey"
        log_level = "debug"
        json_format = true
        "#,
    )
    .unwrap();

    assert_eq!(config.client.port, 47809);
    assert_eq!(config.client.interface, None);
    assert_eq!(config.client.apdu_timeout, Duration::from_millis(1500));
    assert_eq!(config.client.sweep_interval, Duration::from_millis(25));
    assert_eq!(config.client.max_apdu, 480);
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert!(config.logging.json_format);
    assert!(config.validate().is_empty());

    // missing sections fall back to defaults
    let config = BacnetConfig::from_toml("").unwrap();
    assert_eq!(config.client.port, 47808);
    assert_eq!(config.logging.app_name, "bacnet-stack");
}

#[test]
fn test_from_toml_rejects_bad_level() {
    let result = BacnetConfig::from_toml(
        r#"
        [logging]
        app_name = "x"
        log_level = "loud"
        json_format = false
        "#,
    );
    assert!(result.is_err());
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bacnet.toml");

    let config = BacnetConfig::default_with_overrides(|c| {
        c.client.port = 47810;
        c.client.apdu_timeout = Duration::from_millis(750);
        c.logging.log_level = Level::WARN;
    });
    config.save_to_file(&path).unwrap();

    let loaded = BacnetConfig::from_file(&path).unwrap();
    assert_eq!(loaded.client.port, 47810);
    assert_eq!(loaded.client.apdu_timeout, Duration::from_millis(750));
    assert_eq!(loaded.logging.log_level, Level::WARN);
}

#[test]
fn test_from_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let result = BacnetConfig::from_file(dir.path().join("absent.toml"));
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Failed to open config file"));
}

#[test]
fn test_example_config_parses() {
    let example = BacnetConfig::example_config();
    assert!(example.contains("[client]"));
    let parsed = BacnetConfig::from_toml(&example).unwrap();
    assert!(parsed.validate().is_empty());
}
