//! Configuration loading and persistence.
//!
//! Handles reading and writing the opscan configuration file. Every field
//! can be overridden through `OPSCAN_*` environment variables, which is how
//! integration tests and containers steer the daemon without a file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};

use crate::constants::{DEFAULT_LEDGER_FILENAME, DEFAULT_REPORT_FILENAME};

/// Configuration for the opscan daemon.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Path of the append-only scan transcript.
    pub report_path: PathBuf,
    /// Path of the notary hash ledger.
    pub ledger_path: PathBuf,
    /// Record a transcript hash in the ledger after every run.
    pub notary_enabled: bool,
    /// Wall-clock budget per command in seconds. `None` disables the
    /// budget, matching the base behavior where a stuck command is only
    /// bounded by the run itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
    /// Model handed to `ollama run` by the report summarizer.
    pub summarizer_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 5001,
            report_path: PathBuf::from(DEFAULT_REPORT_FILENAME),
            ledger_path: PathBuf::from(DEFAULT_LEDGER_FILENAME),
            notary_enabled: true,
            command_timeout_secs: None,
            summarizer_model: "llama3.1:8b".to_string(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `#[cfg(test)]` (unit tests): `tmp/opscan-test` under the repo
    /// 2. `OPSCAN_CONFIG_DIR` env var: explicit override
    /// 3. Default: platform config dir (Linux: ~/.config/opscan)
    pub fn config_dir() -> Result<PathBuf> {
        let dir = {
            #[cfg(test)]
            {
                PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/opscan-test")
            }

            #[cfg(not(test))]
            {
                if let Ok(test_dir) = std::env::var("OPSCAN_CONFIG_DIR") {
                    PathBuf::from(test_dir)
                } else {
                    dirs::config_dir()
                        .context("Could not determine config directory")?
                        .join("opscan")
                }
            }
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|_| Self::default());
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            anyhow::bail!("Config file not found")
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind_addr) = std::env::var("OPSCAN_BIND_ADDR") {
            self.bind_addr = bind_addr;
        }

        if let Ok(port) = std::env::var("OPSCAN_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.port = port;
            }
        }

        if let Ok(report_path) = std::env::var("OPSCAN_REPORT_PATH") {
            self.report_path = PathBuf::from(report_path);
        }

        if let Ok(ledger_path) = std::env::var("OPSCAN_LEDGER_PATH") {
            self.ledger_path = PathBuf::from(ledger_path);
        }

        if let Ok(notary) = std::env::var("OPSCAN_NOTARY_ENABLED") {
            if let Ok(enabled) = notary.parse::<bool>() {
                self.notary_enabled = enabled;
            }
        }

        if let Ok(timeout) = std::env::var("OPSCAN_COMMAND_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse::<u64>() {
                self.command_timeout_secs = if secs == 0 { None } else { Some(secs) };
            }
        }

        if let Ok(model) = std::env::var("OPSCAN_SUMMARIZER_MODEL") {
            self.summarizer_model = model;
        }
    }

    /// Persists the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Per-command wall-clock budget, if one is configured.
    pub fn command_budget(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.port, 5001);
        assert_eq!(config.report_path, PathBuf::from(DEFAULT_REPORT_FILENAME));
        assert!(config.notary_enabled);
        assert!(config.command_timeout_secs.is_none());
    }

    #[test]
    fn test_command_budget_disabled_by_default() {
        let config = Config::default();
        assert!(config.command_budget().is_none());
    }

    #[test]
    fn test_command_budget_from_secs() {
        let config = Config {
            command_timeout_secs: Some(30),
            ..Config::default()
        };
        assert_eq!(config.command_budget(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = Config {
            port: 6001,
            command_timeout_secs: Some(5),
            ..Config::default()
        };
        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: Config = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.port, 6001);
        assert_eq!(parsed.command_timeout_secs, Some(5));
    }
}
