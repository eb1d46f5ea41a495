// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the reconciliation controller.

use std::path::PathBuf;
use std::time::Duration;

/// Default host of release assets.
pub const DEFAULT_RELEASE_BASE_URL: &str = "https://github.com";

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Convergence bound used when a definition declares no `timeout`.
    pub default_timeout: Duration,
    /// First delay between start-status polls.
    pub poll_interval: Duration,
    /// Upper bound of the delay between start-status polls.
    pub max_poll_interval: Duration,
    /// Parent directory of per-reconciliation staging areas (system temp when unset).
    pub staging_dir: Option<PathBuf>,
    /// Timeout of a single artifact download.
    pub download_timeout: Duration,
    /// `git` executable used for checkouts.
    pub git_binary: String,
    /// Host serving release assets.
    pub release_base_url: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
            max_poll_interval: Duration::from_secs(15),
            staging_dir: None,
            download_timeout: Duration::from_secs(300),
            git_binary: "git".to_string(),
            release_base_url: DEFAULT_RELEASE_BASE_URL.to_string(),
        }
    }
}

impl ControllerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CFAPP_DEFAULT_TIMEOUT_SECS`: convergence bound (default: 60)
    /// - `CFAPP_POLL_INTERVAL_MS`: first poll delay (default: 2000)
    /// - `CFAPP_MAX_POLL_INTERVAL_MS`: poll delay cap (default: 15000)
    /// - `CFAPP_STAGING_DIR`: staging parent directory (default: system temp)
    /// - `CFAPP_DOWNLOAD_TIMEOUT_SECS`: per-download timeout (default: 300)
    /// - `CFAPP_GIT_BINARY`: git executable (default: "git")
    /// - `CFAPP_RELEASE_BASE_URL`: release asset host (default: "https://github.com")
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let default_timeout = env_u64("CFAPP_DEFAULT_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.default_timeout);
        let poll_interval = env_u64("CFAPP_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);
        let max_poll_interval = env_u64("CFAPP_MAX_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_poll_interval);
        let download_timeout = env_u64("CFAPP_DOWNLOAD_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.download_timeout);

        let staging_dir = std::env::var("CFAPP_STAGING_DIR").ok().map(PathBuf::from);
        let git_binary = std::env::var("CFAPP_GIT_BINARY").unwrap_or(defaults.git_binary);
        let release_base_url =
            std::env::var("CFAPP_RELEASE_BASE_URL").unwrap_or(defaults.release_base_url);

        let config = Self {
            default_timeout,
            poll_interval,
            max_poll_interval,
            staging_dir,
            download_timeout,
            git_binary,
            release_base_url,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.max_poll_interval < self.poll_interval {
            return Err(ConfigError::PollIntervalOrder);
        }
        match url::Url::parse(&self.release_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::InvalidUrl {
                    var: "CFAPP_RELEASE_BASE_URL",
                    value: self.release_base_url.clone(),
                });
            }
        }
        Ok(())
    }

    /// Set the default convergence timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the poll interval bounds.
    pub fn with_poll_interval(mut self, initial: Duration, max: Duration) -> Self {
        self.poll_interval = initial;
        self.max_poll_interval = max;
        self
    }

    /// Set the staging parent directory.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Set the download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Set the git executable.
    pub fn with_git_binary(mut self, binary: impl Into<String>) -> Self {
        self.git_binary = binary.into();
        self
    }

    /// Set the release asset host.
    pub fn with_release_base_url(mut self, url: impl Into<String>) -> Self {
        self.release_base_url = url.into();
        self
    }
}

fn env_u64(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        Err(_) => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable does not hold an unsigned integer.
    #[error("{var} must be an unsigned integer, got '{value}'")]
    InvalidNumber {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
    /// The poll interval is zero.
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    /// The poll interval cap is below the initial interval.
    #[error("max poll interval must not be below the poll interval")]
    PollIntervalOrder,
    /// A variable does not hold an http(s) URL.
    #[error("{var} must be an http(s) URL, got '{value}'")]
    InvalidUrl {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}
