//! User settings shared with the control path: recognizer sensitivity and the
//! notes directory, plus the persisted record they are loaded from.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::lock::lock_or_recover;
use crate::log::LogSink;
use crate::persist;

pub const MIN_SENSITIVITY: u32 = 50;
pub const MAX_SENSITIVITY: u32 = 400;
pub const DEFAULT_SENSITIVITY: u32 = 150;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to save settings: {0}")]
    Persistence(#[from] std::io::Error),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_energy_threshold")]
    pub energy_threshold: i64,
    #[serde(default)]
    pub notes_folder: Option<PathBuf>,
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default)]
    pub autostart: bool,
}

fn default_energy_threshold() -> i64 {
    DEFAULT_SENSITIVITY as i64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            energy_threshold: default_energy_threshold(),
            notes_folder: None,
            dark_mode: false,
            autostart: false,
        }
    }
}

impl Settings {
    /// Missing or malformed records fall back to defaults.
    pub fn load(path: &Path, sink: &dyn LogSink) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                sink.emit(&format!("Failed to load settings: {}", e));
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No settings at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                sink.emit(&format!("Failed to load settings: {}", e));
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        Ok(persist::write_json_atomic(path, self)?)
    }

    pub fn notes_dir(&self) -> PathBuf {
        self.notes_folder.clone().unwrap_or_else(default_notes_dir)
    }
}

pub fn default_notes_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Energy threshold used by the speech source. Writes are clamped to
/// `[MIN_SENSITIVITY, MAX_SENSITIVITY]`, never rejected.
#[derive(Debug, Clone)]
pub struct Sensitivity {
    value: Arc<Mutex<u32>>,
}

impl Sensitivity {
    pub fn new(value: i64) -> Self {
        Self {
            value: Arc::new(Mutex::new(Self::clamp(value))),
        }
    }

    pub fn clamp(value: i64) -> u32 {
        value.clamp(MIN_SENSITIVITY as i64, MAX_SENSITIVITY as i64) as u32
    }

    pub fn get(&self) -> u32 {
        *lock_or_recover(&self.value, "sensitivity")
    }

    pub fn set(&self, value: i64) -> u32 {
        let clamped = Self::clamp(value);
        *lock_or_recover(&self.value, "sensitivity") = clamped;
        clamped
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVITY as i64)
    }
}

#[derive(Debug, Clone)]
pub struct NotesDir {
    path: Arc<Mutex<PathBuf>>,
}

impl NotesDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(Mutex::new(path.into())),
        }
    }

    pub fn get(&self) -> PathBuf {
        lock_or_recover(&self.path, "notes dir").clone()
    }

    pub fn set(&self, path: impl Into<PathBuf>) {
        *lock_or_recover(&self.path, "notes dir") = path.into();
    }
}
