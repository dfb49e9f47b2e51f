//! Configuration module for Tally
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - The key-value settings collaborator (currency, sync token, last sync date)

pub mod paths;
pub mod settings;

pub use paths::TallyPaths;
pub use settings::{FileSettings, MemorySettings, SettingName, Settings, SettingsStore};
