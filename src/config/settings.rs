//! User settings for Tally
//!
//! Settings are a small key-value store kept apart from the document
//! collections: they are neither versioned nor replicated.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::paths::TallyPaths;
use crate::error::{TallyError, TallyResult};

/// The settings Tally knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingName {
    /// ISO currency code used when formatting amounts
    Currency,
    /// Address of the remote replica; empty means local-only
    SyncToken,
    /// Timestamp of the last successful replication event
    LastSyncDate,
}

impl SettingName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Currency => "currency",
            Self::SyncToken => "syncToken",
            Self::LastSyncDate => "lastSyncDate",
        }
    }
}

impl fmt::Display for SettingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingName {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "currency" => Ok(Self::Currency),
            "syncToken" | "sync-token" | "sync_token" => Ok(Self::SyncToken),
            "lastSyncDate" | "last-sync-date" | "last_sync_date" => Ok(Self::LastSyncDate),
            other => Err(TallyError::Config(format!("Unknown setting: {}", other))),
        }
    }
}

/// Key-value settings collaborator
///
/// `get_setting` returns an empty string for anything that was never set.
pub trait SettingsStore: Send + Sync {
    fn get_setting(&self, name: SettingName) -> TallyResult<String>;

    fn set_setting(&self, name: SettingName, value: &str) -> TallyResult<()>;
}

/// On-disk representation of the settings file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub currency: String,

    #[serde(default)]
    pub sync_token: String,

    #[serde(default)]
    pub last_sync_date: String,
}

fn default_schema_version() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            currency: String::new(),
            sync_token: String::new(),
            last_sync_date: String::new(),
        }
    }
}

impl Settings {
    fn get(&self, name: SettingName) -> &str {
        match name {
            SettingName::Currency => &self.currency,
            SettingName::SyncToken => &self.sync_token,
            SettingName::LastSyncDate => &self.last_sync_date,
        }
    }

    fn set(&mut self, name: SettingName, value: &str) {
        let slot = match name {
            SettingName::Currency => &mut self.currency,
            SettingName::SyncToken => &mut self.sync_token,
            SettingName::LastSyncDate => &mut self.last_sync_date,
        };
        *slot = value.to_string();
    }

    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &TallyPaths) -> Result<Self, TallyError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| TallyError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                TallyError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &TallyPaths) -> Result<(), TallyError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| TallyError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| TallyError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}

/// Settings backed by `config.json` in the Tally base directory
pub struct FileSettings {
    paths: TallyPaths,
    cached: RwLock<Settings>,
}

impl FileSettings {
    /// Open the settings file, starting from defaults if it doesn't exist yet
    pub fn open(paths: TallyPaths) -> TallyResult<Self> {
        let settings = Settings::load_or_create(&paths)?;
        Ok(Self {
            paths,
            cached: RwLock::new(settings),
        })
    }
}

impl SettingsStore for FileSettings {
    fn get_setting(&self, name: SettingName) -> TallyResult<String> {
        let settings = self
            .cached
            .read()
            .map_err(|e| TallyError::Config(format!("Failed to acquire read lock: {}", e)))?;
        Ok(settings.get(name).to_string())
    }

    fn set_setting(&self, name: SettingName, value: &str) -> TallyResult<()> {
        let mut settings = self
            .cached
            .write()
            .map_err(|e| TallyError::Config(format!("Failed to acquire write lock: {}", e)))?;
        settings.set(name, value);
        settings.save(&self.paths)
    }
}

/// Settings held in memory only
#[derive(Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<SettingName, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a store that syncs against `token`
    pub fn with_sync_token(token: &str) -> Self {
        let settings = Self::new();
        if let Ok(mut values) = settings.values.write() {
            values.insert(SettingName::SyncToken, token.to_string());
        }
        settings
    }
}

impl SettingsStore for MemorySettings {
    fn get_setting(&self, name: SettingName) -> TallyResult<String> {
        let values = self
            .values
            .read()
            .map_err(|e| TallyError::Config(format!("Failed to acquire read lock: {}", e)))?;
        Ok(values.get(&name).cloned().unwrap_or_default())
    }

    fn set_setting(&self, name: SettingName, value: &str) -> TallyResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|e| TallyError::Config(format!("Failed to acquire write lock: {}", e)))?;
        values.insert(name, value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unset_setting_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let paths = TallyPaths::with_base_dir(temp_dir.path().to_path_buf());
        let settings = FileSettings::open(paths).unwrap();

        assert_eq!(settings.get_setting(SettingName::SyncToken).unwrap(), "");
        assert_eq!(settings.get_setting(SettingName::Currency).unwrap(), "");
    }

    #[test]
    fn test_save_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let paths = TallyPaths::with_base_dir(temp_dir.path().to_path_buf());

        let settings = FileSettings::open(paths.clone()).unwrap();
        settings.set_setting(SettingName::Currency, "EUR").unwrap();
        settings
            .set_setting(SettingName::SyncToken, "/tmp/remote")
            .unwrap();

        let reopened = FileSettings::open(paths).unwrap();
        assert_eq!(reopened.get_setting(SettingName::Currency).unwrap(), "EUR");
        assert_eq!(
            reopened.get_setting(SettingName::SyncToken).unwrap(),
            "/tmp/remote"
        );
    }

    #[test]
    fn test_setting_names() {
        assert_eq!(SettingName::SyncToken.to_string(), "syncToken");
        assert_eq!(
            "lastSyncDate".parse::<SettingName>().unwrap(),
            SettingName::LastSyncDate
        );
        assert!("theme".parse::<SettingName>().is_err());
    }

    #[test]
    fn test_memory_settings() {
        let settings = MemorySettings::with_sync_token("remote");
        assert_eq!(settings.get_setting(SettingName::SyncToken).unwrap(), "remote");
        assert_eq!(settings.get_setting(SettingName::LastSyncDate).unwrap(), "");
    }
}
