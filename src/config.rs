use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("refresh interval must be one of 1, 2, 5 or 10 seconds (got {0})")]
    InvalidInterval(u64),

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The refresh intervals the monitor supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshInterval {
    One,
    #[default]
    Two,
    Five,
    Ten,
}

impl RefreshInterval {
    pub const ALL: [RefreshInterval; 4] = [
        RefreshInterval::One,
        RefreshInterval::Two,
        RefreshInterval::Five,
        RefreshInterval::Ten,
    ];

    pub fn secs(self) -> u64 {
        match self {
            RefreshInterval::One => 1,
            RefreshInterval::Two => 2,
            RefreshInterval::Five => 5,
            RefreshInterval::Ten => 10,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.secs())
    }
}

impl TryFrom<u64> for RefreshInterval {
    type Error = ConfigError;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        RefreshInterval::ALL
            .into_iter()
            .find(|i| i.secs() == secs)
            .ok_or(ConfigError::InvalidInterval(secs))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub refresh_interval_secs: u64,
    pub history_capacity: usize,
    /// Overrides the detected invoking user for the user/system split.
    pub user: Option<String>,
    pub include_system_processes: bool,
    pub default_sort: String,
    pub sort_ascending: bool,
    pub collect_sessions: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_interval_secs: 2,
            history_capacity: 60,
            user: None,
            include_system_processes: false,
            default_sort: "cpu".to_string(),
            sort_ascending: false,
            collect_sessions: true,
        }
    }
}

impl GeneralConfig {
    /// Unsupported values fall back to the default interval.
    pub fn refresh_interval(&self) -> RefreshInterval {
        RefreshInterval::try_from(self.refresh_interval_secs).unwrap_or_else(|err| {
            tracing::warn!(%err, "using default refresh interval");
            RefreshInterval::default()
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sysvigil").join("config.toml"))
}

pub fn load_config() -> Config {
    report_fallback(load_config_or_default(None))
}

/// Missing or malformed files yield the default config.
pub fn load_config_from_path(path: &Path) -> Config {
    report_fallback(load_config_or_default(Some(path)))
}

/// Loads `path`, or the default location when `None`, without logging.
/// The error is returned alongside the default config when loading failed,
/// so callers can report it once logging is set up. A missing file at the
/// default location is not an error.
pub fn load_config_or_default(path: Option<&Path>) -> (Config, Option<ConfigError>) {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match config_path() {
            Some(path) if path.exists() => path,
            _ => return (Config::default(), None),
        },
    };
    match try_load_config(&path) {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    }
}

fn report_fallback((config, err): (Config, Option<ConfigError>)) -> Config {
    if let Some(err) = err {
        tracing::warn!(%err, "falling back to default config");
    }
    config
}

pub fn try_load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.general.refresh_interval_secs, 2);
        assert_eq!(config.general.refresh_interval(), RefreshInterval::Two);
        assert_eq!(config.general.history_capacity, 60);
        assert_eq!(config.general.default_sort, "cpu");
        assert!(!config.general.include_system_processes);
        assert!(config.general.collect_sessions);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[general]
refresh_interval_secs = 5
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.refresh_interval(), RefreshInterval::Five);
        // Other fields should be defaults
        assert_eq!(config.general.history_capacity, 60);
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[general]
refresh_interval_secs = 10
history_capacity = 120
user = "alice"
include_system_processes = true
default_sort = "memory"
sort_ascending = true
collect_sessions = false

[logging]
level = "debug"
format = "json"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.refresh_interval(), RefreshInterval::Ten);
        assert_eq!(config.general.history_capacity, 120);
        assert_eq!(config.general.user.as_deref(), Some("alice"));
        assert!(config.general.include_system_processes);
        assert_eq!(config.general.default_sort, "memory");
        assert!(config.general.sort_ascending);
        assert!(!config.general.collect_sessions);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn unsupported_interval_falls_back() {
        let config: Config = toml::from_str("[general]\nrefresh_interval_secs = 3\n").unwrap();
        assert_eq!(config.general.refresh_interval(), RefreshInterval::Two);
    }

    #[test]
    fn interval_conversion() {
        for secs in [1, 2, 5, 10] {
            assert_eq!(RefreshInterval::try_from(secs).unwrap().secs(), secs);
        }
        assert!(matches!(
            RefreshInterval::try_from(0),
            Err(ConfigError::InvalidInterval(0))
        ));
        assert_eq!(RefreshInterval::Five.as_duration(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_returns_default() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert_eq!(config.general.refresh_interval_secs, 2);
        assert!(matches!(
            try_load_config(Path::new("/nonexistent/path/config.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn fallback_reason_is_returned() {
        let (config, err) = load_config_or_default(Some(Path::new("/nonexistent/path/config.toml")));
        assert_eq!(config.general.history_capacity, 60);
        assert!(matches!(err, Some(ConfigError::Read { .. })));

        let temp = std::env::temp_dir().join("sysvigil_test_fallback.toml");
        std::fs::write(&temp, "[general]\nhistory_capacity = 5\n").unwrap();
        let (config, err) = load_config_or_default(Some(&temp));
        assert_eq!(config.general.history_capacity, 5);
        assert!(err.is_none());
        let _ = std::fs::remove_file(&temp);
    }

    #[test]
    fn invalid_toml_returns_default() {
        let temp = std::env::temp_dir().join("sysvigil_test_invalid.toml");
        std::fs::write(&temp, "this is not valid toml {{{{").unwrap();
        let config = load_config_from_path(&temp);
        assert_eq!(config.general.refresh_interval_secs, 2);
        assert!(matches!(try_load_config(&temp), Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_file(&temp);
    }
}
