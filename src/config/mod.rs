//! Configuration loading and validation.
//!
//! Values come from serde defaults, then an optional TOML file, then
//! `CIV_STATS_*` environment variables (`__` separates nested keys, e.g.
//! `CIV_STATS_PATCH__TARGET`).

use std::path::{Path, PathBuf};

use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{BracketError, EloBrackets, EloCutoff, DEFAULT_ELO_CUTOFFS, DEFAULT_GAME_MODE};
use crate::storage::validate_target;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "CIV_STATS";

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "civ-stats.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load config: {0}")]
    LoadError(#[from] ::config::ConfigError),

    #[error("Failed to render config: {0}")]
    RenderError(#[from] toml::ser::Error),

    #[error("Invalid Elo brackets: {0}")]
    Brackets(#[from] BracketError),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Daily rollup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyConfig {
    /// Stats collection the daily rows are appended to
    #[serde(default = "default_daily_target")]
    pub target: String,

    #[serde(default)]
    pub breakdowns: bool,

    #[serde(default)]
    pub all_elo: bool,
}

fn default_daily_target() -> String {
    "daily_civ_stats".to_string()
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            target: default_daily_target(),
            breakdowns: false,
            all_elo: false,
        }
    }
}

/// Patch rollup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchConfig {
    /// Stats collection the per-build rows are upserted into
    #[serde(default = "default_patch_target")]
    pub target: String,

    #[serde(default = "default_true")]
    pub breakdowns: bool,

    #[serde(default)]
    pub all_elo: bool,
}

fn default_patch_target() -> String {
    "civ_stats_by_patch".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            target: default_patch_target(),
            breakdowns: true,
            all_elo: false,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Only matches with this mode tag are rolled up
    #[serde(default = "default_game_mode")]
    pub game_mode: String,

    #[serde(default = "default_elo_brackets")]
    pub elo_brackets: Vec<EloCutoff>,

    #[serde(default)]
    pub daily: DailyConfig,

    #[serde(default)]
    pub patch: PatchConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_game_mode() -> String {
    DEFAULT_GAME_MODE.to_string()
}

fn default_elo_brackets() -> Vec<EloCutoff> {
    DEFAULT_ELO_CUTOFFS.to_vec()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            game_mode: default_game_mode(),
            elo_brackets: default_elo_brackets(),
            daily: DailyConfig::default(),
            patch: PatchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit file (which must exist) or from
    /// `./civ-stats.toml` when present, layered with the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) if !p.exists() => return Err(ConfigError::NotFound(p.to_path_buf())),
            Some(p) => File::from(p).format(FileFormat::Toml).required(true),
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };

        let config: AppConfig = Config::builder()
            .add_source(file)
            .add_source(
                env.prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game_mode.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "game_mode must not be empty".to_string(),
            ));
        }

        for (section, target) in [("daily", &self.daily.target), ("patch", &self.patch.target)] {
            validate_target(target).map_err(|_| {
                ConfigError::ValidationError(format!(
                    "{}.target {:?} must be a plain file stem",
                    section, target
                ))
            })?;
        }

        self.brackets()?;
        Ok(())
    }

    /// The validated Elo bracket table.
    pub fn brackets(&self) -> Result<EloBrackets, ConfigError> {
        Ok(EloBrackets::new(&self.elo_brackets)?)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
