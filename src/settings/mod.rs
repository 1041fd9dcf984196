//! Persisted controller settings
//!
//! User configuration (relay schedules, display behavior, fan timing, mode
//! flags) stored as a JSON document on local storage. Every mutation path
//! validates the candidate state before committing it, so the store never
//! holds an out-of-range schedule.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Upper bound on an inbound settings patch, matching the controller's
/// message buffer.
const MAX_PATCH_BYTES: usize = 1024;

/// Settings persistence and validation errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file: {0}")]
    FileAccess(#[from] std::io::Error),
    #[error("failed to parse settings JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("settings rejected: {0}")]
    Invalid(String),
}

/// Wall-clock time of day, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub const fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }

    pub fn is_valid(&self) -> bool {
        self.hour < 24 && self.minute < 60
    }
}

/// On/off switching times for one relay circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySchedule {
    pub on: TimeOfDay,
    pub off: TimeOfDay,
}

impl RelaySchedule {
    pub const fn new(on: TimeOfDay, off: TimeOfDay) -> Self {
        Self { on, off }
    }

    fn is_valid(&self) -> bool {
        self.on.is_valid() && self.off.is_valid()
    }
}

/// Relay control mode: schedule-driven or manually overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    Auto,
    Manual,
}

/// Complete user-facing controller configuration.
///
/// `display_mode`: 0 = always on, 1 = auto, 2 = presence-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub display_mode: u8,
    pub day: RelaySchedule,
    pub night: RelaySchedule,
    pub bathroom: RelaySchedule,
    pub relay_mode: RelayMode,
    pub manual_day_state: bool,
    pub manual_night_state: bool,
    pub display_timeout_secs: u8,
    pub fan_delay_secs: u8,
    pub fan_run_minutes: u8,
    pub offline_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_mode: 1,
            day: RelaySchedule::new(TimeOfDay::new(8, 0), TimeOfDay::new(22, 0)),
            night: RelaySchedule::new(TimeOfDay::new(22, 0), TimeOfDay::new(8, 0)),
            bathroom: RelaySchedule::new(TimeOfDay::new(8, 0), TimeOfDay::new(20, 0)),
            relay_mode: RelayMode::Auto,
            manual_day_state: false,
            manual_night_state: false,
            display_timeout_secs: 30,
            fan_delay_secs: 60,
            fan_run_minutes: 5,
            offline_mode: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.display_mode > 2 {
            return Err(SettingsError::Invalid(format!(
                "display_mode {} out of range 0-2",
                self.display_mode
            )));
        }

        for (name, schedule) in [
            ("day", &self.day),
            ("night", &self.night),
            ("bathroom", &self.bathroom),
        ] {
            if !schedule.is_valid() {
                return Err(SettingsError::Invalid(format!(
                    "{name} schedule has an out-of-range time"
                )));
            }
        }

        Ok(())
    }

    /// Manual relay states only mean something while in manual mode; leaving
    /// it clears them.
    fn normalize(&mut self) {
        if self.relay_mode == RelayMode::Auto {
            self.manual_day_state = false;
            self.manual_night_state = false;
        }
    }
}

/// On-disk settings store with validate-before-commit semantics.
pub struct SettingsStore {
    path: PathBuf,
    current: Settings,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: Settings::default(),
        }
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings from disk. A missing file leaves the defaults in place;
    /// an unreadable or invalid file is reported and the defaults kept, so a
    /// corrupt flash sector never bricks the controller.
    ///
    /// Returns `true` when the file was loaded.
    pub fn load(&mut self) -> bool {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no settings file, using defaults");
            return false;
        }

        match Self::read_file(&self.path) {
            Ok(settings) => {
                self.current = settings;
                info!(path = %self.path.display(), "settings loaded");
                true
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "settings file rejected, using defaults");
                self.current = Settings::default();
                false
            }
        }
    }

    /// Write the current settings to disk as pretty-printed JSON.
    pub fn save(&self) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(&self.current)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Replace the full settings document after validation.
    pub fn replace(&mut self, mut settings: Settings) -> Result<(), SettingsError> {
        settings.validate()?;
        settings.normalize();
        self.current = settings;
        Ok(())
    }

    /// Apply a partial JSON update over the current settings.
    ///
    /// Fields absent from the patch keep their current values. The merged
    /// candidate is validated before commit; on rejection the current state
    /// is untouched.
    pub fn merge_json(&mut self, patch: &str) -> Result<(), SettingsError> {
        if patch.len() > MAX_PATCH_BYTES {
            return Err(SettingsError::Invalid(format!(
                "patch of {} bytes exceeds the {MAX_PATCH_BYTES} byte limit",
                patch.len()
            )));
        }

        let patch: Value = serde_json::from_str(patch)?;
        if !patch.is_object() {
            return Err(SettingsError::Invalid(
                "settings patch must be a JSON object".to_string(),
            ));
        }

        let mut candidate = serde_json::to_value(&self.current)?;
        merge_value(&mut candidate, &patch);

        let settings: Settings = serde_json::from_value(candidate)?;
        self.replace(settings)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, SettingsError> {
        let json = if pretty {
            serde_json::to_string_pretty(&self.current)?
        } else {
            serde_json::to_string(&self.current)?
        };
        Ok(json)
    }

    fn read_file(path: &Path) -> Result<Settings, SettingsError> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Recursive JSON overlay: objects merge key-wise, everything else replaces.
fn merge_value(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_entry) in patch_map {
                match base_map.get_mut(key) {
                    Some(base_entry) => merge_value(base_entry, patch_entry),
                    None => {
                        base_map.insert(key.clone(), patch_entry.clone());
                    }
                }
            }
        }
        (base_slot, patch_entry) => *base_slot = patch_entry.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_times() {
        let mut settings = Settings::default();
        settings.day.on = TimeOfDay::new(24, 0);
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.night.off = TimeOfDay::new(8, 60);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_display_mode() {
        let settings = Settings {
            display_mode: 3,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn merge_updates_only_named_fields() {
        let mut store = SettingsStore::new("/nonexistent/settings.json");
        store
            .merge_json(r#"{"display_timeout_secs": 60, "day": {"on": {"hour": 7}}}"#)
            .expect("valid patch");

        let settings = store.get();
        assert_eq!(settings.display_timeout_secs, 60);
        assert_eq!(settings.day.on, TimeOfDay::new(7, 0));
        // Untouched fields keep their defaults.
        assert_eq!(settings.day.off, TimeOfDay::new(22, 0));
        assert_eq!(settings.fan_delay_secs, 60);
    }

    #[test]
    fn invalid_merge_keeps_current_state() {
        let mut store = SettingsStore::new("/nonexistent/settings.json");
        let before = store.get().clone();

        let result = store.merge_json(r#"{"day": {"on": {"hour": 25}}}"#);
        assert!(result.is_err());
        assert_eq!(store.get(), &before);
    }

    #[test]
    fn merge_rejects_non_object_patch() {
        let mut store = SettingsStore::new("/nonexistent/settings.json");
        assert!(store.merge_json("[1, 2, 3]").is_err());
        assert!(store.merge_json("42").is_err());
    }

    #[test]
    fn merge_rejects_oversized_patch() {
        let mut store = SettingsStore::new("/nonexistent/settings.json");
        let huge = format!(r#"{{"pad": "{}"}}"#, "x".repeat(MAX_PATCH_BYTES));
        assert!(store.merge_json(&huge).is_err());
    }

    #[test]
    fn leaving_manual_mode_clears_manual_states() {
        let mut store = SettingsStore::new("/nonexistent/settings.json");
        store
            .merge_json(r#"{"relay_mode": "manual", "manual_day_state": true}"#)
            .expect("enter manual mode");
        assert!(store.get().manual_day_state);

        store
            .merge_json(r#"{"relay_mode": "auto"}"#)
            .expect("back to auto");
        assert!(!store.get().manual_day_state);
        assert!(!store.get().manual_night_state);
    }

    #[test]
    fn json_round_trip_preserves_settings() {
        let store = SettingsStore::new("/nonexistent/settings.json");
        let json = store.to_json(false).expect("serialize");
        let parsed: Settings = serde_json::from_str(&json).expect("parse");
        assert_eq!(&parsed, store.get());
    }
}
