//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. Environment (`CMDTAG_PATH` adds discovery directories)
//! 4. CLI flags (not handled here)
//!
//! # Locations
//!
//! Searched in order, first hit wins:
//! 1. `$CMDTAG_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/cmdtag/config.toml`
//! 3. `~/.cmdtag/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use cmdtag::core::config::Config;
//!
//! let result = Config::load().unwrap();
//! let config = result.config;
//! println!("Poll interval: {:?}", config.poll_interval());
//! println!("Interactive: {}", config.interactive());
//! ```

pub mod schema;

pub use schema::{DiscoveryConfig, FileConfig, LocksConfig, WorkersConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CMDTAG_CONFIG";

/// Environment variable listing extra discovery directories.
pub const PATH_ENV: &str = "CMDTAG_PATH";

/// Default back-off between worker exit polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Effective configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents (defaults when no file was found)
    pub file: FileConfig,
    /// Directories from `$CMDTAG_PATH`
    env_directories: Vec<PathBuf>,
    /// Path of the loaded config file, if any
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed,
    /// or if its values are invalid. A missing file is not an error.
    pub fn load() -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let mut config = match Self::locate(&mut warnings) {
            Some(path) => Self::load_from(&path)?,
            None => Config {
                file: FileConfig::default(),
                env_directories: Vec::new(),
                path: None,
            },
        };
        config.env_directories = std::env::var_os(PATH_ENV)
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default();

        Ok(ConfigLoadResult { config, warnings })
    }

    /// Load a specific file, ignoring the environment.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let file = Self::read(path)?;
        file.validate()?;
        Ok(Config {
            file,
            env_directories: Vec::new(),
            path: Some(path.to_path_buf()),
        })
    }

    fn locate(warnings: &mut Vec<ConfigWarning>) -> Option<PathBuf> {
        // 1. Check $CMDTAG_CONFIG
        if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            if path.exists() {
                return Some(path);
            }
            warnings.push(ConfigWarning {
                message: format!("${} points to a missing file; ignoring", CONFIG_ENV),
                path,
            });
        }

        // 2. Check $XDG_CONFIG_HOME/cmdtag/config.toml
        if let Some(xdg_home) = std::env::var_os("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("cmdtag/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.cmdtag/config.toml
        dirs::home_dir()
            .map(|home| home.join(".cmdtag/config.toml"))
            .filter(|path| path.exists())
    }

    fn read(path: &Path) -> Result<FileConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Path of the loaded config file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether prompting is allowed (default: true).
    pub fn interactive(&self) -> bool {
        self.file.interactive.unwrap_or(true)
    }

    /// Discovery directories: config file entries, then `$CMDTAG_PATH`.
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .file
            .discovery
            .as_ref()
            .map(|d| d.directories.clone())
            .unwrap_or_default();
        dirs.extend(self.env_directories.iter().cloned());
        dirs
    }

    /// Back-off between non-blocking worker exit polls.
    pub fn poll_interval(&self) -> Duration {
        self.file
            .workers
            .as_ref()
            .and_then(|w| w.poll_interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    /// Directory holding run locks (default: `<tmp>/cmdtag`).
    pub fn lock_dir(&self) -> PathBuf {
        self.file
            .locks
            .as_ref()
            .and_then(|l| l.directory.clone())
            .unwrap_or_else(|| std::env::temp_dir().join("cmdtag"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert!(config.interactive());
        assert!(config.directories().is_empty());
        assert_eq!(config.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert!(config.lock_dir().ends_with("cmdtag"));
        assert!(config.path().is_none());
    }

    #[test]
    fn load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "interactive = false\n[workers]\npoll_interval_ms = 50\n[locks]\ndirectory = \"/tmp/x\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.interactive());
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.lock_dir(), PathBuf::from("/tmp/x"));
        assert_eq!(config.path(), Some(path.as_path()));
    }

    #[test]
    fn parse_error_names_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "interactive = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[workers]\npoll_interval_ms = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::load_from(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
