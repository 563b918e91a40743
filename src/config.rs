use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::align::{ProfileName, ScoringProfile};
use crate::dataset::TieBreak;
use crate::error::HomopairError;

pub const DEFAULT_CONFIG_FILE: &str = "homopair.json";
pub const DEFAULT_RATE_LIMIT_SECS: u64 = 10;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub store_root: Option<String>,
    #[serde(default)]
    pub scoring: Option<ScoringEntry>,
    #[serde(default)]
    pub rate_limit_secs: Option<u64>,
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,
    #[serde(default)]
    pub tie_break: Option<TieBreak>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub max_alignment_cells: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ScoringEntry {
    #[serde(default)]
    pub profile: Option<ProfileEntry>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ProfileEntry {
    Named(String),
    Custom(ScoringProfile),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringSettings {
    pub name: Option<ProfileName>,
    pub profile: ScoringProfile,
    pub threshold: f64,
}

impl ScoringSettings {
    pub fn named(name: ProfileName) -> Self {
        Self {
            name: Some(name),
            profile: name.profile(),
            threshold: name.default_threshold(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Result<Self, HomopairError> {
        validate_threshold(threshold)?;
        self.threshold = threshold;
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub store_root: Option<Utf8PathBuf>,
    pub scoring: ScoringSettings,
    pub rate_limit: Duration,
    pub fetch_timeout: Duration,
    pub tie_break: TieBreak,
    pub workers: usize,
    pub max_alignment_cells: Option<u64>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            store_root: None,
            scoring: ScoringSettings::named(ProfileName::Standard),
            rate_limit: Duration::from_secs(DEFAULT_RATE_LIMIT_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            tie_break: TieBreak::default(),
            workers: DEFAULT_WORKERS,
            max_alignment_cells: None,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, HomopairError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HomopairError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HomopairError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HomopairError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(HomopairError::InvalidConfig(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let scoring = match config.scoring {
            None => ScoringSettings::named(ProfileName::Standard),
            Some(entry) => resolve_scoring(entry)?,
        };

        let rate_limit_secs = config.rate_limit_secs.unwrap_or(DEFAULT_RATE_LIMIT_SECS);
        if rate_limit_secs == 0 {
            return Err(HomopairError::InvalidConfig(
                "rate_limit_secs must be at least 1".to_string(),
            ));
        }
        let fetch_timeout_secs = config
            .fetch_timeout_secs
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
        if fetch_timeout_secs == 0 {
            return Err(HomopairError::InvalidConfig(
                "fetch_timeout_secs must be at least 1".to_string(),
            ));
        }
        let workers = config.workers.unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(HomopairError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version,
            store_root: config.store_root.map(Utf8PathBuf::from),
            scoring,
            rate_limit: Duration::from_secs(rate_limit_secs),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            tie_break: config.tie_break.unwrap_or_default(),
            workers,
            max_alignment_cells: config.max_alignment_cells,
        })
    }
}

fn resolve_scoring(entry: ScoringEntry) -> Result<ScoringSettings, HomopairError> {
    let settings = match entry.profile {
        None => ScoringSettings::named(ProfileName::Standard),
        Some(ProfileEntry::Named(name)) => ScoringSettings::named(name.parse()?),
        Some(ProfileEntry::Custom(profile)) => {
            profile.validate()?;
            let threshold = entry.threshold.ok_or_else(|| {
                HomopairError::InvalidConfig(
                    "a custom scoring profile needs an explicit threshold".to_string(),
                )
            })?;
            ScoringSettings {
                name: None,
                profile,
                threshold,
            }
        }
    };
    match entry.threshold {
        Some(threshold) => settings.with_threshold(threshold),
        None => Ok(settings),
    }
}

pub fn validate_threshold(threshold: f64) -> Result<(), HomopairError> {
    if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
        return Err(HomopairError::InvalidConfig(format!(
            "threshold must lie in (0, 1], got {threshold}"
        )));
    }
    Ok(())
}
