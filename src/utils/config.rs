//! Configuration management for the peer chat node.
//!
//! This module provides TOML-based configuration with support for multiple
//! configuration sources (default, file-based, environment variables) and
//! validation of configuration parameters.

use crate::utils::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "peerchat.toml";

/// Environment variable prefix for configuration
pub const ENV_PREFIX: &str = "PEERCHAT";

/// Complete configuration for a chat node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Network configuration
    pub network: NetworkConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Network and transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address to bind the listening socket to
    pub listen_address: IpAddr,
    /// Port to listen on for inbound peer connections
    pub listen_port: u16,
    /// Outbound connection timeout in seconds.
    ///
    /// The protocol itself specifies no timeout for the per-message connect;
    /// this bounds how long a send may block the caller.
    pub connect_timeout_secs: u64,
}

/// Storage and persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for node data
    pub data_dir: PathBuf,
    /// Directory holding the persisted identity key files
    pub keys_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_port: crate::defaults::DEFAULT_PORT,
            connect_timeout_secs: crate::defaults::DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("peerchat");

        Self {
            keys_dir: data_dir.join("keys"),
            data_dir,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl NetworkConfig {
    /// Full socket address the listener binds to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.listen_port)
    }
}

impl ChatConfig {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with multiple sources (default, file, environment)
    ///
    /// # Arguments
    ///
    /// * `config_file` - Optional path to configuration file
    ///
    /// # Returns
    ///
    /// Configuration with values merged from multiple sources
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        // Load from file if provided
        if let Some(path) = config_file {
            if path.exists() {
                let file_config = Self::from_file(path)?;
                config = config.merge(file_config);
            }
        } else {
            // Try default config file locations
            let default_locations = [
                PathBuf::from(DEFAULT_CONFIG_FILE),
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("peerchat")
                    .join(DEFAULT_CONFIG_FILE),
            ];

            for location in &default_locations {
                if location.exists() {
                    let file_config = Self::from_file(location)?;
                    config = config.merge(file_config);
                    break;
                }
            }
        }

        // Override with environment variables
        config = config.merge_from_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path where to save the configuration
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Merge this configuration with another, preferring values from other
    ///
    /// # Arguments
    ///
    /// * `other` - Configuration to merge with
    pub fn merge(mut self, other: Self) -> Self {
        self.network = other.network;
        self.storage = other.storage;
        self.logging = other.logging;
        self
    }

    /// Merge configuration from environment variables
    fn merge_from_env(mut self) -> Result<Self> {
        if let Ok(port) = std::env::var("PEERCHAT_NETWORK_LISTEN_PORT") {
            self.network.listen_port = port.parse().map_err(|_| ConfigError::InvalidValue {
                field: "PEERCHAT_NETWORK_LISTEN_PORT".to_string(),
                value: port,
            })?;
        }

        if let Ok(level) = std::env::var("PEERCHAT_LOGGING_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(data_dir) = std::env::var("PEERCHAT_STORAGE_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }

        Ok(self)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        if self.network.listen_port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "network.listen_port".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        if self.network.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "network.connect_timeout_secs".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ConfigError::InvalidValue {
                    field: "logging.level".to_string(),
                    value: self.logging.level.clone(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        let dirs_to_create = [&self.storage.data_dir, &self.storage.keys_dir];

        for dir in &dirs_to_create {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|_| ConfigError::DirectoryCreation {
                    path: dir.display().to_string(),
                })?;
            }
        }

        Ok(())
    }

    /// Get the configuration as a pretty-printed TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::ParseError {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.network.listen_port, crate::defaults::DEFAULT_PORT);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = ChatConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("listen_port"));
        assert!(toml_str.contains("connect_timeout_secs"));
    }

    #[test]
    fn test_config_file_operations() {
        let config = ChatConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        // Save and load
        config.save(temp_file.path()).unwrap();
        let loaded_config = ChatConfig::from_file(temp_file.path()).unwrap();

        assert_eq!(config.network.listen_port, loaded_config.network.listen_port);
        assert_eq!(
            config.network.connect_timeout_secs,
            loaded_config.network.connect_timeout_secs
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = ChatConfig::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        // Invalid port should fail
        config.network.listen_port = 0;
        assert!(config.validate().is_err());

        // Reset and test invalid timeout
        config = ChatConfig::default();
        config.network.connect_timeout_secs = 0;
        assert!(config.validate().is_err());

        // Reset and test invalid log level
        config = ChatConfig::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_merge() {
        let mut config1 = ChatConfig::default();
        let mut config2 = ChatConfig::default();

        config1.network.listen_port = 9001;
        config2.network.listen_port = 9002;

        let merged = config1.merge(config2);
        assert_eq!(merged.network.listen_port, 9002);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("PEERCHAT_NETWORK_LISTEN_PORT", "9999");

        let config = ChatConfig::default().merge_from_env().unwrap();
        assert_eq!(config.network.listen_port, 9999);

        std::env::remove_var("PEERCHAT_NETWORK_LISTEN_PORT");
    }

    #[test]
    fn test_listen_addr() {
        let mut config = ChatConfig::default();
        config.network.listen_port = 9001;
        assert_eq!(config.network.listen_addr().port(), 9001);
    }

    #[test]
    fn test_directory_paths() {
        let config = ChatConfig::default();
        assert!(config.storage.keys_dir.starts_with(&config.storage.data_dir));
    }
}
