//! Durable user settings and the single "yesterday" temperature slot.
//!
//! Loads never fail: a missing or unreadable record resolves to defaults
//! (field by field for settings). Saves replace the whole record.

use parking_lot::Mutex;
use std::{fmt::Debug, path::PathBuf};
use thiserror::Error;

use crate::model::UserSettings;

pub mod file;

pub use file::{FileSettingsStore, FileTemperatureMemory};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: toml::ser::Error,
    },
}

pub trait SettingsStore: Send + Sync + Debug {
    fn load(&self) -> UserSettings;
    fn save(&self, settings: &UserSettings) -> Result<(), StoreError>;
}

pub trait TemperatureMemory: Send + Sync + Debug {
    fn load(&self) -> Option<f64>;
    fn save(&self, value: f64) -> Result<(), StoreError>;
}

/// Process-local settings, handy for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    settings: Mutex<Option<UserSettings>>,
}

impl InMemorySettingsStore {
    pub fn new(settings: UserSettings) -> Self {
        Self { settings: Mutex::new(Some(settings)) }
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn load(&self) -> UserSettings {
        self.settings.lock().clone().unwrap_or_default()
    }

    fn save(&self, settings: &UserSettings) -> Result<(), StoreError> {
        *self.settings.lock() = Some(settings.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTemperatureMemory {
    slot: Mutex<Option<f64>>,
}

impl InMemoryTemperatureMemory {
    pub fn with_value(value: f64) -> Self {
        Self { slot: Mutex::new(Some(value)) }
    }
}

impl TemperatureMemory for InMemoryTemperatureMemory {
    fn load(&self) -> Option<f64> {
        *self.slot.lock()
    }

    fn save(&self, value: f64) -> Result<(), StoreError> {
        *self.slot.lock() = Some(value);
        Ok(())
    }
}
