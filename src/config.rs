use crate::constants::{BUILTIN_BYE_OVERRIDES, DEFAULT_SEASON_URL_BASE, DEFAULT_USER_AGENT};
use crate::error::{IngestError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the staging cache; also holds the default sink file.
    pub data_dir: PathBuf,
    /// Sink location. Defaults to `<data_dir>/stats.db`.
    pub database_path: Option<PathBuf>,
    pub log_dir: PathBuf,
    pub season_url_base: String,
    pub http: HttpConfig,
    pub odds: OddsConfig,
    /// Extra synthetic byes on top of the built-in table.
    pub bye_overrides: Vec<ByeOverride>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OddsConfig {
    pub sources: Vec<OddsSource>,
}

/// A delimited-text export of a bookmaker odds dump covering one or more seasons.
#[derive(Debug, Clone, Deserialize)]
pub struct OddsSource {
    pub years: Vec<i32>,
    pub url: String,
    /// Rows preceding the column header row.
    #[serde(default)]
    pub header_row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ByeOverride {
    pub year: i32,
    pub round: u32,
    pub team: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            database_path: None,
            log_dir: PathBuf::from("logs"),
            season_url_base: DEFAULT_SEASON_URL_BASE.to_string(),
            http: HttpConfig::default(),
            odds: OddsConfig::default(),
            bye_overrides: Vec::new(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.season_url_base.ends_with('/') {
            return Err(IngestError::Config(format!(
                "season_url_base must end with '/': {}",
                self.season_url_base
            )));
        }
        if let Some(bad) = self
            .bye_overrides
            .iter()
            .find(|o| o.round == 0 || o.round > crate::constants::SEASON_ROUNDS)
        {
            return Err(IngestError::Config(format!(
                "bye override for {} has round {} outside the season",
                bad.team, bad.round
            )));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("stats.db"))
    }

    /// Built-in overrides followed by configured ones.
    pub fn all_bye_overrides(&self) -> Vec<ByeOverride> {
        BUILTIN_BYE_OVERRIDES
            .iter()
            .map(|(year, round, team)| ByeOverride {
                year: *year,
                round: *round,
                team: team.to_string(),
            })
            .chain(self.bye_overrides.iter().cloned())
            .collect()
    }
}
