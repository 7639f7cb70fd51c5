use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{BrokerConfig, MapDataError, Result};

#[derive(Debug, Default)]
struct SessionState {
    config: Option<BrokerConfig>,
    stylesheets: HashSet<PathBuf>,
    storages: HashSet<String>,
}

/// Registration state shared by every request of one broker.
///
/// Engine registrations run while the session lock is held, which keeps
/// "register once" decisions atomic across threads.
#[derive(Debug, Default)]
pub struct EngineSession {
    state: Mutex<SessionState>,
}

impl EngineSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_configured(&self) -> bool {
        self.lock().config.is_some()
    }

    /// The active configuration, or a config error before `configure`
    pub fn config(&self) -> Result<BrokerConfig> {
        self.lock()
            .config
            .clone()
            .ok_or_else(|| MapDataError::Config("broker is not configured".to_string()))
    }

    /// Run `initialize` and store `config`, unless already configured.
    ///
    /// Returns `false` when the session was configured before.
    pub fn configure_once(
        &self,
        config: BrokerConfig,
        initialize: impl FnOnce(&BrokerConfig) -> Result<()>,
    ) -> Result<bool> {
        let mut state = self.lock();
        if state.config.is_some() {
            return Ok(false);
        }
        initialize(&config)?;
        state.config = Some(config);
        Ok(true)
    }

    /// Run `register` for `path` unless it ran before for the same path.
    ///
    /// Returns `true` when `register` ran and succeeded.
    pub fn register_stylesheet_once(
        &self,
        path: &Path,
        register: impl FnOnce(&Path) -> Result<()>,
    ) -> Result<bool> {
        let mut state = self.lock();
        if state.stylesheets.contains(path) {
            return Ok(false);
        }
        register(path)?;
        state.stylesheets.insert(path.to_path_buf());
        Ok(true)
    }

    pub fn add_storage(&self, key: &str) {
        self.lock().storages.insert(key.to_string());
    }

    pub fn has_storage(&self, key: &str) -> bool {
        self.lock().storages.contains(key)
    }

    /// Fail unless `key` was registered
    pub fn require_storage(&self, key: &str) -> Result<()> {
        if self.has_storage(key) {
            Ok(())
        } else {
            Err(MapDataError::UnregisteredStorage {
                key: key.to_string(),
            })
        }
    }

    pub fn stylesheet_count(&self) -> usize {
        self.lock().stylesheets.len()
    }

    /// Forget configuration and every registration
    pub fn reset(&self) {
        *self.lock() = SessionState::default();
    }
}
