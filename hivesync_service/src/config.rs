/// Service configuration.
///
/// Settings come from `hivesync.toml` (every section and field optional),
/// then from the environment after `.env` is loaded:
///
/// | variable           | overrides                |
/// |--------------------|--------------------------|
/// | `DATABASE_URL`     | `store.database_url`     |
/// | `HIVE_GATEWAY_URL` | `hive.gateway_url`       |
/// | `HIVE_ENABLED`     | `hive.enabled`           |
/// | `HIVESYNC_LOG`     | `logging.level`          |
///
/// A missing config file is not an error; defaults apply.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::logging::LogLevel;
use crate::reconcile::DEFAULT_BATCH_SIZE;

pub const DEFAULT_CONFIG_FILE: &str = "hivesync.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("cannot parse {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HiveSettings {
    /// When false the service runs in CSV mode and never contacts Hive.
    pub enabled: bool,
    pub gateway_url: String,
    pub database: String,
    pub username: String,
    /// Upper bound on a single statement, enforced by the HTTP client.
    pub timeout_secs: u64,
}

impl Default for HiveSettings {
    fn default() -> Self {
        HiveSettings {
            enabled: true,
            gateway_url: "http://localhost:10001".to_string(),
            database: "default".to_string(),
            username: "hive".to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// PostgreSQL connection string. Without one the CLI falls back to an
    /// in-memory store.
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub batch_size: usize,
    pub observations_table: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            batch_size: DEFAULT_BATCH_SIZE,
            observations_table: "africa_climate_observations".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvSettings {
    pub data_dir: PathBuf,
    pub stations_file: String,
    pub observations_file: String,
}

impl Default for CsvSettings {
    fn default() -> Self {
        CsvSettings {
            data_dir: PathBuf::from("data"),
            stations_file: "portfolio_stations.csv".to_string(),
            observations_file: "portfolio_observations.csv".to_string(),
        }
    }
}

impl CsvSettings {
    pub fn stations_path(&self, data_dir: Option<&Path>) -> PathBuf {
        data_dir.unwrap_or(&self.data_dir).join(&self.stations_file)
    }

    pub fn observations_path(&self, data_dir: Option<&Path>) -> PathBuf {
        data_dir.unwrap_or(&self.data_dir).join(&self.observations_file)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentSettings {
    /// Runs slower than this many seconds end as `timeout`.
    pub max_duration_secs: Option<f64>,
    /// Record count given to scenarios created without one.
    pub default_record_count: i64,
}

impl Default for AssessmentSettings {
    fn default() -> Self {
        AssessmentSettings { max_duration_secs: None, default_record_count: 100_000_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings { level: "info".to_string(), file: None, timestamps: false }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hive: HiveSettings,
    pub store: StoreSettings,
    pub sync: SyncSettings,
    pub csv: CsvSettings,
    pub assessment: AssessmentSettings,
    pub logging: LoggingSettings,
}

impl Config {
    /// Read `path` (defaults if absent), then apply `.env` and process
    /// environment overrides, then validate.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
            Config::from_toml(&content).map_err(|e| match e {
                ConfigError::Parse { source, .. } => ConfigError::Parse { path: path.to_path_buf(), source },
                other => other,
            })?
        } else {
            Config::default()
        };

        dotenv::dotenv().ok();
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Config, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse { path: PathBuf::new(), source })
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            self.store.database_url = Some(url);
        }
        if let Some(url) = lookup("HIVE_GATEWAY_URL").filter(|v| !v.trim().is_empty()) {
            self.hive.gateway_url = url;
        }
        if let Some(flag) = lookup("HIVE_ENABLED") {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.hive.enabled = true,
                "0" | "false" | "no" | "off" => self.hive.enabled = false,
                _ => {}
            }
        }
        if let Some(level) = lookup("HIVESYNC_LOG").filter(|v| !v.trim().is_empty()) {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.batch_size == 0 {
            return Err(ConfigError::Invalid("sync.batch_size must be at least 1".to_string()));
        }
        if self.hive.timeout_secs == 0 {
            return Err(ConfigError::Invalid("hive.timeout_secs must be at least 1".to_string()));
        }
        if self.sync.observations_table.trim().is_empty() {
            return Err(ConfigError::Invalid("sync.observations_table is empty".to_string()));
        }
        if let Some(max) = self.assessment.max_duration_secs {
            if max.is_nan() || max <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "assessment.max_duration_secs must be positive, got {}",
                    max
                )));
            }
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        self.logging.level.parse().map_err(ConfigError::Invalid)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.sync.batch_size, 1000);
        assert_eq!(config.hive.timeout_secs, 300);
        assert_eq!(config.sync.observations_table, "africa_climate_observations");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [hive]
            gateway_url = "http://hive-gw.internal:10001"

            [assessment]
            max_duration_secs = 30.0
            "#,
        )
        .unwrap();
        assert_eq!(config.hive.gateway_url, "http://hive-gw.internal:10001");
        assert_eq!(config.hive.database, "default");
        assert_eq!(config.assessment.max_duration_secs, Some(30.0));
        assert_eq!(config.assessment.default_record_count, 100_000_000);
    }

    #[test]
    fn test_bad_toml_is_a_parse_error() {
        assert!(matches!(Config::from_toml("[hive\nenabled = "), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgres://hive:pw@localhost/hivesync"),
            ("HIVE_ENABLED", "false"),
            ("HIVESYNC_LOG", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.store.database_url.as_deref(), Some("postgres://hive:pw@localhost/hivesync"));
        assert!(!config.hive.enabled);
        assert_eq!(config.log_level().unwrap(), LogLevel::Debug);
        assert_eq!(config.hive.gateway_url, "http://localhost:10001");
    }

    #[test]
    fn test_validation_rejects_nonsense() {
        let mut config = Config::default();
        config.sync.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.assessment.max_duration_secs = Some(-1.0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.csv.stations_file, "portfolio_stations.csv");
    }

    #[test]
    fn test_csv_paths_honour_override_dir() {
        let csv = CsvSettings::default();
        assert_eq!(csv.stations_path(None), PathBuf::from("data/portfolio_stations.csv"));
        assert_eq!(
            csv.observations_path(Some(Path::new("/srv/exports"))),
            PathBuf::from("/srv/exports/portfolio_observations.csv")
        );
    }
}
