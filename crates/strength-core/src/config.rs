// Configuration loading and parsing (config/board.toml).

use crate::schema::{AliasTable, Field};
use crate::scoring::{FilterSpec, ReferencePolicy, ScoreRequest, SortPolicy};
use crate::snapshot::DataSource;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Name of the configuration file inside `config/` and `defaults/`.
pub const CONFIG_FILE: &str = "board.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("failed to read config file {}: {source}", .path.display())]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },

    #[error("cannot determine the working directory: {0}")]
    WorkingDir(std::io::Error),
}

// ---------------------------------------------------------------------------
// board.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub aliases: AliasOverrides,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub filters: FilterSpec,
    #[serde(default)]
    pub reload: ReloadConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// A CSV file, or a directory holding one `<sheet>.csv` per table.
    pub path: String,
    #[serde(default)]
    pub sheet: Option<String>,
}

/// Extra accepted column names, on top of the built-in alias table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AliasOverrides {
    #[serde(default)]
    pub player: Vec<String>,
    #[serde(default)]
    pub period: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub metric_value: Vec<String>,
}

impl AliasOverrides {
    fn entries(&self) -> [(Field, &[String]); 4] {
        [
            (Field::Player, self.player.as_slice()),
            (Field::Period, self.period.as_slice()),
            (Field::Category, self.category.as_slice()),
            (Field::MetricValue, self.metric_value.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_metric_field")]
    pub metric_field: String,
    #[serde(default)]
    pub group_field: Option<String>,
    #[serde(default)]
    pub reference_policy: ReferencePolicy,
    #[serde(default)]
    pub sort: SortPolicy,
}

fn default_metric_field() -> String {
    Field::MetricValue.canonical().to_string()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            metric_field: default_metric_field(),
            group_field: None,
            reference_policy: ReferencePolicy::default(),
            sort: SortPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReloadConfig {
    /// Seconds between change checks; 0 runs once and exits.
    #[serde(default)]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Upper bound for `reload.poll_interval_secs` (one day).
const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

impl Config {
    /// Built-in aliases plus the configured extras.
    pub fn alias_table(&self) -> AliasTable {
        let mut table = AliasTable::default();
        for (field, names) in self.aliases.entries() {
            table.extend(field, names);
        }
        table
    }

    /// The data source, with a relative path resolved against `base_dir`.
    pub fn data_source(&self, base_dir: &Path) -> DataSource {
        let path = Path::new(&self.data.path);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        };
        DataSource::new(path, self.data.sheet.clone())
    }

    pub fn score_request(&self) -> ScoreRequest {
        ScoreRequest {
            metric_field: self.scoring.metric_field.clone(),
            group_field: self.scoring.group_field.clone(),
            filter: self.filters.clone(),
            reference_policy: self.scoring.reference_policy,
            sort: self.scoring.sort,
        }
    }

    /// `None` when polling is disabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        match self.reload.poll_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/board.toml` under `base_dir`, without touching
/// `defaults/`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = config_path(base_dir);
    let text = read_config_text(&path)?;
    let config = parse_config(&text, &path)?;
    validate(&config)?;
    Ok(config)
}

fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Create `config/board.toml` from `defaults/board.toml` when it is missing.
/// Returns the path written, or `None` when a config was already in place.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = config_path(base_dir);
    if target.is_file() {
        return Ok(None);
    }
    let default = base_dir.join("defaults").join(CONFIG_FILE);
    if !default.is_file() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "{} is missing and there is no {} to create it from",
                target.display(),
                default.display()
            ),
        });
    }

    let copy_err = |e: std::io::Error| ConfigError::DefaultsCopyError {
        message: format!("copying {} to {}: {e}", default.display(), target.display()),
    };
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(copy_err)?;
    }
    std::fs::copy(&default, &target).map_err(copy_err)?;
    info!("created {} from defaults", target.display());
    Ok(Some(target))
}

/// Bootstrap the config from defaults if needed, then load it.
pub fn load_config_in(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_file(base_dir)?;
    load_config_from(base_dir)
}

/// [`load_config_in`] for the current working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(ConfigError::WorkingDir)?;
    load_config_in(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config_path(base_dir: &Path) -> PathBuf {
    base_dir.join("config").join(CONFIG_FILE)
}

fn read_config_text(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.data.path.trim().is_empty() {
        return Err(invalid("data.path", "must not be empty"));
    }
    if config
        .data
        .sheet
        .as_deref()
        .is_some_and(|s| s.trim().is_empty())
    {
        return Err(invalid("data.sheet", "must not be empty when set"));
    }

    for (field, names) in config.aliases.entries() {
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(invalid(
                &format!("aliases.{}", field.canonical()),
                "alias names must not be empty",
            ));
        }
    }

    // Field names must mean something under the effective alias table.
    let aliases = config.alias_table();
    let metric = &config.scoring.metric_field;
    match aliases.resolve(metric) {
        Some(Field::MetricValue) => {}
        Some(other) => {
            return Err(invalid(
                "scoring.metric_field",
                format!("`{metric}` names the {other} dimension, not a numeric column"),
            ));
        }
        None => {
            return Err(invalid(
                "scoring.metric_field",
                format!("`{metric}` is not a known column name"),
            ));
        }
    }
    if let Some(group) = &config.scoring.group_field {
        match aliases.resolve(group) {
            Some(field) if field.is_dimension() => {}
            _ => {
                return Err(invalid(
                    "scoring.group_field",
                    format!("`{group}` must name player, period or category"),
                ));
            }
        }
    }

    let secs = config.reload.poll_interval_secs;
    if secs > MAX_POLL_INTERVAL_SECS {
        return Err(invalid(
            "reload.poll_interval_secs",
            format!("must be at most {MAX_POLL_INTERVAL_SECS}, got {secs}"),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
