//! Configuration management for tntpool

use crate::error::ConfigError;
use crate::pool::{PoolOptions, DEFAULT_DISCOVERY_INTERVAL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main tntpool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Pool configuration
    pub pool: PoolConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Instance addresses, `host:port`
    pub addrs: Vec<String>,
    /// Role and liveness probe interval in milliseconds
    pub check_interval_ms: u64,
    /// Function returning the cluster member list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_function: Option<String>,
    /// Discovery interval in seconds, 0 means the default
    #[serde(default)]
    pub discovery_interval_sec: u64,
    /// Bound for dial and role probe calls in milliseconds
    pub probe_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        let options = PoolOptions::default();
        Self {
            addrs: vec!["127.0.0.1:3301".to_string()],
            check_interval_ms: options.check_interval.as_millis() as u64,
            discovery_function: None,
            discovery_interval_sec: options.discovery_interval.as_secs(),
            probe_timeout_ms: options.probe_timeout.as_millis() as u64,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Runtime options for [`crate::pool::ConnectionPool::connect_with_opts`]
    pub fn to_options(&self) -> PoolOptions {
        let discovery_interval = match self.discovery_interval_sec {
            0 => DEFAULT_DISCOVERY_INTERVAL,
            secs => Duration::from_secs(secs),
        };

        PoolOptions {
            check_interval: Duration::from_millis(self.check_interval_ms),
            discovery_function: self.discovery_function.clone(),
            discovery_interval,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.addrs.is_empty() {
            return Err(ConfigError::EmptyAddrs);
        }

        for addr in &self.pool.addrs {
            let valid = addr
                .rsplit_once(':')
                .map_or(false, |(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !valid {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid instance address: {}",
                    addr
                )));
            }
        }

        if self.pool.check_interval_ms == 0 {
            return Err(ConfigError::WrongCheckTimeout);
        }

        if self.pool.probe_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "probe_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if let Some(function) = &self.pool.discovery_function {
            if function.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "discovery_function cannot be blank".to_string(),
                ));
            }
        }

        // Validate logging config
        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }

    /// Create example configuration file
    pub fn create_example_config<P: AsRef<Path>>(path: P, profile: &str) -> Result<(), ConfigError> {
        let config = match profile {
            "standalone" => Config::default(),
            "cluster" => Config {
                pool: PoolConfig {
                    addrs: vec![
                        "10.0.1.10:3301".to_string(),
                        "10.0.1.11:3301".to_string(),
                        "10.0.1.12:3301".to_string(),
                    ],
                    discovery_function: Some("get_cluster_nodes".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
            _ => {
                return Err(ConfigError::ValidationError(
                    "Profile must be 'standalone' or 'cluster'".to_string(),
                ))
            }
        };

        config.save_to_file(path)
    }
}
