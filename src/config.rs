//! Configuration management
//!
//! This module handles loading scheduler and transport settings from
//! TOML files.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core::constants::{retry, timeouts};
use crate::core::error::{LinkSureError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How many times a retryable response is retried
    pub retry_attempts: Option<u32>,

    /// Deadline in milliseconds within which all links must get validated,
    /// including retries
    pub overall_timeout_ms: Option<u64>,

    /// Custom User-Agent header
    pub user_agent: Option<String>,

    /// Hosts for which fragment-free links may be validated with HEAD
    /// instead of GET
    pub head_request_hosts: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry_attempts: Some(retry::DEFAULT_RETRY_ATTEMPTS),
            overall_timeout_ms: Some(timeouts::DEFAULT_OVERALL_TIMEOUT_MS),
            user_agent: None,
            head_request_hosts: None,
        }
    }
}

impl Config {
    /// Load configuration from file, validating it
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LinkSureError::Config(format!(
                "Could not read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            LinkSureError::Config(format!(
                "Invalid TOML in config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Try to find and load a config file in standard locations
    pub fn load_from_standard_locations() -> Self {
        if let Ok(config) = Self::load_from_file(".linksure.toml") {
            return config;
        }

        for i in 1..=3 {
            let path = format!("{}.linksure.toml", "../".repeat(i));
            if let Ok(config) = Self::load_from_file(&path) {
                return config;
            }
        }

        Self::default()
    }

    /// Check that loaded values are usable
    pub fn validate(&self) -> Result<()> {
        if let Some(0) = self.overall_timeout_ms {
            return Err(LinkSureError::Config(
                "overall_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if let Some(user_agent) = &self.user_agent {
            if user_agent.trim().is_empty() {
                return Err(LinkSureError::Config(
                    "user_agent cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The overall timeout as a `Duration`
    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(
            self.overall_timeout_ms
                .unwrap_or(timeouts::DEFAULT_OVERALL_TIMEOUT_MS),
        )
    }
}
