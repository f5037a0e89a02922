use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use radwaste_core::{history::DEFAULT_SAMPLE_LABEL, IsotopeTable};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_CONFIG_FILE: &str = "radwaste.yaml";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// How timestamps without an explicit UTC offset are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePolicy {
    #[default]
    Utc,
    Local,
}

impl TimePolicy {
    /// Parses an RFC 3339 timestamp, or a `YYYY-MM-DD[T ]HH:MM[:SS]` one in this policy's zone.
    pub fn parse_timestamp(&self, input: &str) -> Result<DateTime<Utc>> {
        let input = input.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(input) {
            return Ok(at.with_timezone(&Utc));
        }

        let naive = NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
            .with_context(|| format!("Unrecognised timestamp '{}' (expected e.g. 2024-03-01T08:00)", input))?;

        match self {
            TimePolicy::Utc => Ok(Utc.from_utc_datetime(&naive)),
            TimePolicy::Local => match Local.from_local_datetime(&naive).single() {
                Some(at) => Ok(at.with_timezone(&Utc)),
                None => bail!("Local time '{}' is ambiguous or does not exist", input),
            },
        }
    }
}

/// Settings read from the optional YAML configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// JSON file backing the history store.
    pub store_path: PathBuf,
    pub time_policy: TimePolicy,
    /// Extra isotopes merged over the built-in catalogue.
    pub isotope_catalogue: Option<PathBuf>,
    pub default_sample_label: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("./data/radwaste_store.json"),
            time_policy: TimePolicy::Utc,
            isotope_catalogue: None,
            default_sample_label: DEFAULT_SAMPLE_LABEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `path`, or `radwaste.yaml` from the working directory if present, or the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    log::debug!("No {} found; using default configuration", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML from {:?}", path))?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// The built-in isotopes, extended with the configured catalogue file if any.
    pub fn isotope_table(&self) -> Result<IsotopeTable> {
        let mut table = IsotopeTable::builtin();
        if let Some(catalogue) = &self.isotope_catalogue {
            table
                .extend_from_file(catalogue)
                .with_context(|| format!("Failed to load isotope catalogue {:?}", catalogue))?;
        }
        Ok(table)
    }
}
