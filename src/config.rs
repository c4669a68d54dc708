//! # Configuration Management
//!
//! Centralized configuration for the BACnet client stack.
//!
//! This module provides structured configuration for the client engine and
//! for logging: the UDP port and interface to bind, the broadcast address,
//! the confirmed-request timeout and the granularity of the timeout sweeper.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! ## Defaults
//! - Port 47808 (0xBAC0) on all interfaces
//! - Broadcast to 255.255.255.255
//! - 3 second APDU timeout, swept every 50 ms

use crate::core::apdu::MAX_APDU_SIZES;
use crate::core::identity::DEFAULT_PORT;
use crate::error::{BacnetError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default timeout for confirmed requests.
pub const DEFAULT_APDU_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default interval between sweeps for expired transactions.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(50);

/// Default broadcast address for Who-Is and other unconfirmed broadcasts.
pub const DEFAULT_BROADCAST_ADDRESS: &str = "255.255.255.255";

/// Largest APDU this client accepts, reported in confirmed requests.
pub const DEFAULT_MAX_APDU: u16 = 1476;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BacnetConfig {
    /// Client engine configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BacnetConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| BacnetError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| BacnetError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| BacnetError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("BACNET_PORT") {
            config.client.port = port
                .parse::<u16>()
                .map_err(|e| BacnetError::ConfigError(format!("Invalid BACNET_PORT: {e}")))?;
        }

        if let Ok(interface) = std::env::var("BACNET_INTERFACE") {
            config.client.interface = Some(interface);
        }

        if let Ok(broadcast) = std::env::var("BACNET_BROADCAST_ADDRESS") {
            config.client.broadcast_address = broadcast;
        }

        if let Ok(timeout) = std::env::var("BACNET_APDU_TIMEOUT_MS") {
            let millis = timeout.parse::<u64>().map_err(|e| {
                BacnetError::ConfigError(format!("Invalid BACNET_APDU_TIMEOUT_MS: {e}"))
            })?;
            config.client.apdu_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BacnetError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| BacnetError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BacnetError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Client engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// UDP port to bind and to address peers on
    pub port: u16,

    /// Local interface address to bind; all interfaces when unset
    #[serde(default)]
    pub interface: Option<String>,

    /// Destination for broadcasts
    pub broadcast_address: String,

    /// Deadline for confirmed requests
    #[serde(with = "duration_serde")]
    pub apdu_timeout: Duration,

    /// How often pending transactions are checked for expiry
    #[serde(with = "duration_serde")]
    pub sweep_interval: Duration,

    /// Max APDU size announced in confirmed requests
    pub max_apdu: u16,

    /// Buffered I-Am events per discovery subscriber
    pub discovery_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            interface: None,
            broadcast_address: String::from(DEFAULT_BROADCAST_ADDRESS),
            apdu_timeout: DEFAULT_APDU_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_apdu: DEFAULT_MAX_APDU,
            discovery_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Socket address to bind.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        let ip = match &self.interface {
            Some(interface) => interface.parse::<IpAddr>().map_err(|e| {
                BacnetError::InvalidAddress(format!("interface '{interface}': {e}"))
            })?,
            None => IpAddr::from([0, 0, 0, 0]),
        };
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Broadcast destination on the configured port.
    pub fn broadcast_target(&self) -> Result<SocketAddr> {
        let ip = self.broadcast_address.parse::<IpAddr>().map_err(|e| {
            BacnetError::InvalidAddress(format!("broadcast '{}': {e}", self.broadcast_address))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if let Some(ref interface) = self.interface {
            if interface.parse::<IpAddr>().is_err() {
                errors.push(format!(
                    "Invalid interface address: '{interface}' (expected an IP address)"
                ));
            }
        }

        if self.broadcast_address.parse::<IpAddr>().is_err() {
            errors.push(format!(
                "Invalid broadcast address: '{}' (expected format: '192.168.1.255')",
                self.broadcast_address
            ));
        }

        if self.apdu_timeout.as_millis() < 10 {
            errors.push("APDU timeout too short (minimum: 10ms)".to_string());
        } else if self.apdu_timeout.as_secs() > 300 {
            errors.push("APDU timeout too long (maximum: 300s)".to_string());
        }

        if self.sweep_interval.is_zero() {
            errors.push("Sweep interval must be greater than 0".to_string());
        } else if self.sweep_interval > self.apdu_timeout {
            errors.push("Sweep interval cannot be longer than the APDU timeout".to_string());
        }

        if !MAX_APDU_SIZES.iter().any(|(size, _)| *size == self.max_apdu) {
            errors.push(format!(
                "Invalid max APDU: {} (valid: 50, 128, 206, 480, 1024, 1476)",
                self.max_apdu
            ));
        }

        if self.discovery_capacity == 0 {
            errors.push("Discovery capacity must be greater than 0".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Path to log file; logs go to stdout when unset
    #[serde(default)]
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("bacnet-stack"),
            log_level: Level::INFO,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if let Some(ref path) = self.log_file_path {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    errors.push(format!(
                        "Log file directory does not exist: {}",
                        parent.display()
                    ));
                }
            }
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
