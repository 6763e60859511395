//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order:
//! 1. `$CMDTAG_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/cmdtag/config.toml`
//! 3. `~/.cmdtag/config.toml`
//!
//! # Validation
//!
//! Values are validated after parsing (e.g. the worker poll interval must
//! be positive).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// User configuration.
///
/// # Example
///
/// ```toml
/// interactive = true
///
/// [discovery]
/// directories = ["~/commands", "/opt/tasks"]
///
/// [workers]
/// poll_interval_ms = 10
///
/// [locks]
/// directory = "/tmp/cmdtag"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Allow interactive prompting for missing prompt-backed options
    pub interactive: Option<bool>,

    /// Where manifest discovery looks for `*.cmd.toml` files
    pub discovery: Option<DiscoveryConfig>,

    /// Worker pool settings
    pub workers: Option<WorkersConfig>,

    /// Run-lock settings
    pub locks: Option<LocksConfig>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(workers) = &self.workers {
            workers.validate()?;
        }

        if let Some(discovery) = &self.discovery {
            if discovery
                .directories
                .iter()
                .any(|d| d.as_os_str().is_empty())
            {
                return Err(ConfigError::InvalidValue(
                    "discovery directories cannot be empty paths".to_string(),
                ));
            }
        }

        if let Some(locks) = &self.locks {
            if locks
                .directory
                .as_ref()
                .is_some_and(|d| d.as_os_str().is_empty())
            {
                return Err(ConfigError::InvalidValue(
                    "lock directory cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Discovery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Directories scanned for manifests, in order
    pub directories: Vec<PathBuf>,
}

/// Worker pool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkersConfig {
    /// Back-off between non-blocking exit polls, in milliseconds
    pub poll_interval_ms: Option<u64>,
}

impl WorkersConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == Some(0) {
            return Err(ConfigError::InvalidValue(
                "workers.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run-lock settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LocksConfig {
    /// Directory holding `<command>.lock` files
    pub directory: Option<PathBuf>,
}
