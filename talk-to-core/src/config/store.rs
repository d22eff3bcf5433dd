//! Reloadable holder of the active configuration.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::config::TalkToConfig;
use crate::error::{TalkToError, TalkToResult};

/// Holds the active [`TalkToConfig`] snapshot.
///
/// Readers get an `Arc` to a complete config; a reload swaps the whole
/// snapshot only after the new file parsed and validated.
pub struct ConfigStore {
    path: Option<PathBuf>,
    current: RwLock<Arc<TalkToConfig>>,
}

impl ConfigStore {
    /// Load the config file at `path`. Later reloads re-read the same file.
    pub fn load(path: impl Into<PathBuf>) -> TalkToResult<Self> {
        let path = path.into();
        let config = TalkToConfig::from_file(&path)?;
        info!(path = %path.display(), calendars = config.calendars.len(), "loaded config");

        Ok(ConfigStore {
            path: Some(path),
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// A store around an in-memory config, with nothing to reload from.
    pub fn from_config(config: TalkToConfig) -> Self {
        ConfigStore {
            path: None,
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// The active config snapshot.
    pub fn current(&self) -> Arc<TalkToConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-read the config file.
    ///
    /// On error the previous config stays active and the error is returned.
    pub fn reload(&self) -> TalkToResult<Arc<TalkToConfig>> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| TalkToError::Config("No config file to reload from".into()))?;

        let config = Arc::new(TalkToConfig::from_file(path)?);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = config.clone();
        info!(path = %path.display(), calendars = config.calendars.len(), "reloaded config");

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{config_file, config_json, write_config};

    #[test]
    fn reload_picks_up_changes() {
        let mut file = config_file(&config_json(&["https://a.example/cal.ics"]));

        let store = ConfigStore::load(file.path()).unwrap();
        assert_eq!(store.current().calendars.len(), 1);

        write_config(
            &mut file,
            &config_json(&["https://a.example/cal.ics", "https://b.example/cal.ics"]),
        );
        store.reload().unwrap();
        assert_eq!(store.current().calendars.len(), 2);
    }

    #[test]
    fn failed_reload_keeps_previous_config() {
        let mut file = config_file(&config_json(&["https://a.example/cal.ics"]));
        let store = ConfigStore::load(file.path()).unwrap();

        write_config(&mut file, r#"{"calendars": ["#);
        let err = store.reload().unwrap_err();
        assert!(matches!(err, TalkToError::Config(_)));
        assert_eq!(store.current().calendars, vec!["https://a.example/cal.ics"]);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = ConfigStore::load("/definitely/not/here/config.json")
            .err()
            .unwrap();
        assert!(matches!(err, TalkToError::Config(_)));
    }

    #[test]
    fn in_memory_store_cannot_reload() {
        let config = TalkToConfig::from_json(&config_json(&[])).unwrap();
        let store = ConfigStore::from_config(config);
        assert!(store.reload().is_err());
        assert!(store.current().calendars.is_empty());
    }
}
