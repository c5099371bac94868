//! Configuration for the DB-Net/IP client
//!
//! Loads configuration from a TOML file. The connection section mirrors the
//! parameters a controller installation ships with (station address, caller
//! address, numeric password); the timing section governs how patient the
//! session is on a lossy link.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Controller connection parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Controller IP address or hostname
    pub host: String,
    /// UDP port the controller listens on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Station address of the controller (5-bit on the wire)
    #[serde(default = "default_station_addr")]
    pub station_addr: u8,
    /// Address this client identifies as (5-bit on the wire)
    #[serde(default = "default_client_addr")]
    pub client_addr: u8,
    /// Numeric station password, seeds the frame check randomization
    #[serde(default)]
    pub password: u32,
}

/// Timeouts, retry budgets and pacing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    /// How long to wait for a reply datagram, in milliseconds
    pub reply_timeout_ms: u64,
    /// Seconds between poll sweeps (consumed by the monitor daemon)
    pub scan_interval_secs: u64,
    /// Per-request retry budget inside the session
    pub request_retries: u32,
    /// Consecutive exchange failures before the session re-synchronizes its key
    pub failure_threshold: u32,
    /// Pause between successive reads in a poll or catalog sweep, in milliseconds
    pub read_pacing_ms: u64,
}

/// Logging configuration (consumed by the monitor daemon)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

fn default_port() -> u16 {
    59
}

fn default_station_addr() -> u8 {
    4
}

fn default_client_addr() -> u8 {
    31
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 2000,
            scan_interval_secs: 30,
            request_retries: 2,
            failure_threshold: 3,
            read_pacing_ms: 20,
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

impl TimingConfig {
    /// Reply timeout as a `Duration`
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// Inter-read pacing as a `Duration`
    pub fn read_pacing(&self) -> Duration {
        Duration::from_millis(self.read_pacing_ms)
    }

    /// Scan interval as a `Duration`
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for a controller at `host` with factory-default parameters
    pub fn for_host(host: &str) -> Self {
        Self {
            connection: ConnectionConfig {
                host: host.to_string(),
                port: default_port(),
                station_addr: default_station_addr(),
                client_addr: default_client_addr(),
                password: 0,
            },
            timing: TimingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject parameter combinations the wire format cannot carry
    pub fn validate(&self) -> Result<()> {
        if self.connection.host.is_empty() {
            return Err(Error::Config("connection.host must not be empty".into()));
        }
        // Addresses occupy 5 bits in the telegram header
        if self.connection.station_addr > 0x1F {
            return Err(Error::Config(format!(
                "station_addr {} exceeds the 5-bit address space",
                self.connection.station_addr
            )));
        }
        if self.connection.client_addr > 0x1F {
            return Err(Error::Config(format!(
                "client_addr {} exceeds the 5-bit address space",
                self.connection.client_addr
            )));
        }
        if self.timing.reply_timeout_ms == 0 {
            return Err(Error::Config("reply_timeout_ms must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_defaults() {
        let config = Config::for_host("10.0.0.5");
        assert_eq!(config.connection.port, 59);
        assert_eq!(config.connection.station_addr, 4);
        assert_eq!(config.connection.client_addr, 31);
        assert_eq!(config.connection.password, 0);
        assert_eq!(config.timing.reply_timeout_ms, 2000);
        assert_eq!(config.timing.scan_interval_secs, 30);
        config.validate().unwrap();
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::for_host("192.168.1.40");
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[connection]"));
        assert!(toml_string.contains("host = \"192.168.1.40\""));
        assert!(toml_string.contains("[timing]"));

        let parsed: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(parsed.connection.host, config.connection.host);
        assert_eq!(parsed.timing.read_pacing_ms, config.timing.read_pacing_ms);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let toml_content = r#"
[connection]
host = "plc.local"
"#;
        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.connection.port, 59);
        assert_eq!(config.connection.station_addr, 4);
        assert_eq!(config.connection.client_addr, 31);
        assert_eq!(config.timing.failure_threshold, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_address_validation() {
        let mut config = Config::for_host("plc.local");
        config.connection.station_addr = 32;
        assert!(config.validate().is_err());

        config.connection.station_addr = 31;
        config.connection.client_addr = 40;
        assert!(config.validate().is_err());
    }
}
