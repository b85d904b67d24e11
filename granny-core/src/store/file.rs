use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{SettingsStore, StoreError, TemperatureMemory};
use crate::model::UserSettings;

pub const SETTINGS_FILE: &str = "settings.toml";
pub const MEMORY_FILE: &str = "memory.toml";

const KEY_YESTERDAY_TEMP: &str = "yesterday_temp";

/// Settings persisted as a flat TOML table.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> UserSettings {
        let defaults = UserSettings::default();
        let Some(table) = read_table(&self.path) else {
            return defaults;
        };

        UserSettings {
            language: field(&table, "language").unwrap_or(defaults.language),
            notification_hour: field(&table, "notification_hour")
                .filter(|h| within(*h, 23, "notification_hour"))
                .unwrap_or(defaults.notification_hour),
            notification_minute: field(&table, "notification_minute")
                .filter(|m| within(*m, 59, "notification_minute"))
                .unwrap_or(defaults.notification_minute),
            advice_tone: parsed_field(&table, "advice_tone").unwrap_or(defaults.advice_tone),
            voice_notifications: field(&table, "voice_notifications")
                .unwrap_or(defaults.voice_notifications),
            temperature_unit: parsed_field(&table, "temperature_unit")
                .unwrap_or(defaults.temperature_unit),
            threshold_delta: field(&table, "threshold_delta").unwrap_or(defaults.threshold_delta),
            granny_avatar: field(&table, "granny_avatar").unwrap_or(defaults.granny_avatar),
            background_theme: field(&table, "background_theme")
                .unwrap_or(defaults.background_theme),
            automatic_location: field(&table, "automatic_location")
                .unwrap_or(defaults.automatic_location),
            manual_location: field(&table, "manual_location").unwrap_or(defaults.manual_location),
        }
    }

    fn save(&self, settings: &UserSettings) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        write_record(&self.path, "settings", settings)?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

/// The single "yesterday" slot, persisted as `yesterday_temp = <f64>`.
#[derive(Debug)]
pub struct FileTemperatureMemory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

#[derive(Serialize)]
struct MemoryRecord {
    yesterday_temp: f64,
}

impl FileTemperatureMemory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(MEMORY_FILE))
    }
}

impl TemperatureMemory for FileTemperatureMemory {
    fn load(&self) -> Option<f64> {
        let table = read_table(&self.path)?;
        field(&table, KEY_YESTERDAY_TEMP)
    }

    fn save(&self, value: f64) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        write_record(&self.path, "temperature memory", &MemoryRecord { yesterday_temp: value })?;
        debug!(path = %self.path.display(), value, "yesterday temperature saved");
        Ok(())
    }
}

/// Read a TOML table, treating a missing or corrupt file as absent.
fn read_table(path: &Path) -> Option<toml::Table> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read store file, using defaults");
            return None;
        }
    };

    match contents.parse::<toml::Table>() {
        Ok(table) => Some(table),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "corrupt store file, using defaults");
            None
        }
    }
}

fn field<T: DeserializeOwned>(table: &toml::Table, key: &str) -> Option<T> {
    let value = table.get(key)?.clone();
    match value.try_into::<T>() {
        Ok(v) => Some(v),
        Err(err) => {
            warn!(key, error = %err, "ignoring unreadable stored value");
            None
        }
    }
}

/// Enum fields are stored by name and go through their `FromStr` boundary.
fn parsed_field<T>(table: &toml::Table, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = field(table, key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(err) => {
            warn!(key, error = %err, "ignoring unknown stored value");
            None
        }
    }
}

fn within(value: u32, max: u32, key: &str) -> bool {
    let ok = value <= max;
    if !ok {
        warn!(key, value, max, "stored value out of range");
    }
    ok
}

/// Serialize and atomically replace `path`: write to a sibling temp file,
/// then rename it over the target.
fn write_record<T: Serialize>(path: &Path, what: &'static str, record: &T) -> Result<(), StoreError> {
    let contents =
        toml::to_string_pretty(record).map_err(|source| StoreError::Serialize { what, source })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let io_err = |source| StoreError::Io { path: path.to_path_buf(), source };

    fs::create_dir_all(&dir)
        .map_err(|source| StoreError::Io { path: dir.clone(), source })?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(contents.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}
