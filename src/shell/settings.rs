// Environment-driven settings for binaries embedding the store.
//
// Keys
// - AGGREGATE_STORE_DATA_DIR                directory of the JSONL entry store
// - AGGREGATE_STORE_BATCH_SIZE              events per fetch while reading (default 100)
// - AGGREGATE_STORE_MAX_SNAPSHOTS_ARCHIVED  snapshots kept per aggregate (default unbounded)
// - AGGREGATE_STORE_TRANSLATE_CONFLICTS     "false" to surface raw backend failures

use crate::modules::event_store::core::config::{ConfigError, DEFAULT_BATCH_SIZE, EventStoreConfig};
use std::path::PathBuf;
use std::str::FromStr;

pub const DATA_DIR: &str = "AGGREGATE_STORE_DATA_DIR";
pub const BATCH_SIZE: &str = "AGGREGATE_STORE_BATCH_SIZE";
pub const MAX_SNAPSHOTS_ARCHIVED: &str = "AGGREGATE_STORE_MAX_SNAPSHOTS_ARCHIVED";
pub const TRANSLATE_CONFLICTS: &str = "AGGREGATE_STORE_TRANSLATE_CONFLICTS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_dir: Option<PathBuf>,
    pub batch_size: usize,
    pub max_snapshots_archived: Option<usize>,
    pub translate_conflicts: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            batch_size: DEFAULT_BATCH_SIZE.get(),
            max_snapshots_archived: None,
            translate_conflicts: true,
        }
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        if let Some(dir) = lookup(DATA_DIR).filter(|d| !d.trim().is_empty()) {
            settings.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup(BATCH_SIZE) {
            settings.batch_size = parse(BATCH_SIZE, &value)?;
        }
        if let Some(value) = lookup(MAX_SNAPSHOTS_ARCHIVED) {
            settings.max_snapshots_archived = Some(parse(MAX_SNAPSHOTS_ARCHIVED, &value)?);
        }
        if let Some(value) = lookup(TRANSLATE_CONFLICTS) {
            settings.translate_conflicts = parse(TRANSLATE_CONFLICTS, &value)?;
        }
        Ok(settings)
    }

    pub fn event_store_config(&self) -> Result<EventStoreConfig, ConfigError> {
        let mut config = EventStoreConfig::default().with_batch_size(self.batch_size)?;
        if let Some(max) = self.max_snapshots_archived {
            config = config.with_max_snapshots_archived(max);
        }
        if !self.translate_conflicts {
            config = config.without_conflict_classifier();
        }
        Ok(config)
    }
}
