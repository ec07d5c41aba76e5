//! Configuration management for LANDrop.
//!
//! This module handles loading, saving, and managing LANDrop configuration.
//! The core never reads it implicitly: callers turn it into a
//! [`SessionConfig`] and a [`DiscoveryConfig`] and pass those explicitly.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/landrop/config.toml` |
//! | macOS | `~/Library/Application Support/LANDrop/config.toml` |
//! | Windows | `%APPDATA%\LANDrop\config\config.toml` |
//!
//! ## Example
//!
//! ```rust,ignore
//! use landrop_core::config::Config;
//!
//! let config = Config::load()?;
//! println!("Device name: {}", config.general.device_name);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::MAX_PAYLOAD_SIZE;
use crate::discovery::DiscoveryConfig;
use crate::error::{Error, Result};
use crate::transfer::SessionConfig;

/// Main configuration struct for LANDrop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Network settings
    pub network: NetworkConfig,
    /// Transfer settings
    pub transfer: TransferConfig,
}

/// General configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Display name on the network
    pub device_name: String,
    /// Directory received files are written to
    pub download_path: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            device_name: crate::default_device_name(),
            download_path: directories::UserDirs::new()
                .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

/// Network configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Transfer listening port (TCP), `0` for any free port
    pub listen_port: u16,
    /// Discovery port (UDP)
    pub discovery_port: u16,
    /// Answer discovery requests with the listening port
    pub discoverable: bool,
    /// Limit for establishing outgoing connections
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_port: 0,
            discovery_port: crate::DISCOVERY_PORT,
            discoverable: true,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Transfer configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Plaintext bytes per file content message
    pub chunk_size: usize,
    /// Delay before a completed transfer reports its end
    #[serde(with = "humantime_serde")]
    pub completion_grace: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: crate::TRANSFER_CHUNK_SIZE,
            completion_grace: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read,
    /// parsed or validated.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// Creates the configuration directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("app", "landrop", "LANDrop")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Check values that would otherwise fail deep inside a session.
    pub fn validate(&self) -> Result<()> {
        if self.general.device_name.trim().is_empty() {
            return Err(Error::Config("general.device_name must not be empty".into()));
        }
        if !(1..=MAX_PAYLOAD_SIZE).contains(&self.transfer.chunk_size) {
            return Err(Error::Config(format!(
                "transfer.chunk_size must be between 1 and {MAX_PAYLOAD_SIZE}"
            )));
        }
        if self.network.discovery_port == 0 {
            return Err(Error::Config("network.discovery_port must not be 0".into()));
        }
        if self.network.connect_timeout.is_zero() {
            return Err(Error::Config(
                "network.connect_timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Set a single value by its dotted key, e.g. `network.discoverable`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys, unparsable values, or values that
    /// fail [`validate`](Self::validate); the configuration is unchanged then.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
        where
            T::Err: std::fmt::Display,
        {
            value
                .parse()
                .map_err(|e| Error::Config(format!("invalid value for {key}: {e}")))
        }

        let mut updated = self.clone();
        match key {
            "general.device_name" => updated.general.device_name = value.to_string(),
            "general.download_path" => updated.general.download_path = PathBuf::from(value),
            "network.listen_port" => updated.network.listen_port = parse(key, value)?,
            "network.discovery_port" => updated.network.discovery_port = parse(key, value)?,
            "network.discoverable" => updated.network.discoverable = parse(key, value)?,
            "network.connect_timeout" => {
                updated.network.connect_timeout = humantime_serde::parse(value)
                    .map_err(|e| Error::Config(format!("invalid value for {key}: {e}")))?;
            }
            "transfer.chunk_size" => updated.transfer.chunk_size = parse(key, value)?,
            "transfer.completion_grace" => {
                updated.transfer.completion_grace = humantime_serde::parse(value)
                    .map_err(|e| Error::Config(format!("invalid value for {key}: {e}")))?;
            }
            _ => return Err(Error::Config(format!("unknown configuration key: {key}"))),
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Session settings derived from this configuration.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            device_name: self.general.device_name.clone(),
            device_type: crate::device_type().to_string(),
            chunk_size: self.transfer.chunk_size,
            connect_timeout: self.network.connect_timeout,
            completion_grace: self.transfer.completion_grace,
        }
    }

    /// Discovery settings announcing `listen_port`.
    #[must_use]
    pub fn discovery_config(&self, listen_port: u16) -> DiscoveryConfig {
        DiscoveryConfig {
            port: self.network.discovery_port,
            device_name: self.general.device_name.clone(),
            device_type: crate::device_type().to_string(),
            listen_port,
            discoverable: self.network.discoverable,
        }
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    /// Parse `"500ms"`, `"5s"` or `"2m"`.
    pub fn parse(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let number = |digits: &str| digits.parse::<u64>().map_err(|e| e.to_string());

        if let Some(millis) = s.strip_suffix("ms") {
            number(millis).map(Duration::from_millis)
        } else if let Some(secs) = s.strip_suffix('s') {
            number(secs).map(Duration::from_secs)
        } else if let Some(mins) = s.strip_suffix('m') {
            number(mins)?
                .checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(|| format!("duration out of range: {s:?}"))
        } else {
            Err(format!("invalid duration format: {s:?}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.network.discovery_port, crate::DISCOVERY_PORT);
        assert_eq!(config.network.listen_port, 0);
        assert!(config.network.discoverable);
        assert_eq!(config.transfer.chunk_size, 64_000);
        assert_eq!(config.network.connect_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config").join("config.toml");

        let mut original = Config::default();
        original.general.device_name = "Test Device".to_string();
        original.network.listen_port = 12345;
        original.network.discoverable = false;
        original.transfer.completion_grace = Duration::from_millis(250);

        original.save_to(&config_path).expect("save");
        let loaded = Config::load_from(&config_path).expect("load");

        assert_eq!(loaded, original);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = Config::load_from(&temp_dir.path().join("absent.toml")).expect("load");
        assert_eq!(loaded.network, NetworkConfig::default());
    }

    #[test]
    fn test_config_deserialization_partial() {
        let partial_toml = r#"
[general]
device_name = "My Custom Device"

[network]
discovery_port = 9999
connect_timeout = "1m"
"#;

        let config: Config = toml::from_str(partial_toml).expect("parse partial config");

        assert_eq!(config.general.device_name, "My Custom Device");
        assert_eq!(config.network.discovery_port, 9999);
        assert_eq!(config.network.connect_timeout, Duration::from_secs(60));
        assert!(config.network.discoverable);
        assert_eq!(config.transfer.chunk_size, crate::TRANSFER_CHUNK_SIZE);
    }

    #[test]
    fn test_oversized_duration_rejected() {
        let toml = format!("[network]\nconnect_timeout = \"{}m\"\n", u64::MAX / 2);
        assert!(toml::from_str::<Config>(&toml).is_err());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[transfer]\nchunk_size = 70000\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_terminal());
    }

    #[test]
    fn test_set_values() {
        let mut config = Config::default();

        config.set("network.discoverable", "false").unwrap();
        config.set("network.listen_port", "4000").unwrap();
        config.set("transfer.completion_grace", "0s").unwrap();
        config.set("general.download_path", "/tmp/in").unwrap();

        assert!(!config.network.discoverable);
        assert_eq!(config.network.listen_port, 4000);
        assert_eq!(config.transfer.completion_grace, Duration::ZERO);
        assert_eq!(config.general.download_path, PathBuf::from("/tmp/in"));
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut config = Config::default();
        let before = config.clone();

        assert!(config.set("network.listen_port", "70000").is_err());
        assert!(config.set("transfer.chunk_size", "0").is_err());
        assert!(config.set("network.connect_timeout", "soon").is_err());
        assert!(config.set("general.nope", "x").is_err());
        assert_eq!(config, before);
    }

    #[test]
    fn test_derived_settings() {
        let mut config = Config::default();
        config.general.device_name = "desk".into();
        config.network.discoverable = false;

        let session = config.session_config();
        assert_eq!(session.device_name, "desk");
        assert_eq!(session.chunk_size, crate::TRANSFER_CHUNK_SIZE);

        let discovery = config.discovery_config(4321);
        assert_eq!(discovery.listen_port, 4321);
        assert!(!discovery.discoverable);
        assert_eq!(discovery.port, crate::DISCOVERY_PORT);
    }

    #[test]
    fn test_duration_format() {
        assert_eq!(humantime_serde::parse("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(humantime_serde::parse("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(humantime_serde::parse("2m"), Ok(Duration::from_secs(120)));
        assert!(humantime_serde::parse("5").is_err());
        assert!(humantime_serde::parse(&format!("{}m", u64::MAX)).is_err());

        let toml_str = toml::to_string_pretty(&Config::default()).expect("serialize");
        assert!(toml_str.contains("connect_timeout = \"5s\""));
    }
}
