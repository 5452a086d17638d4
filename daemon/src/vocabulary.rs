//! Trigger phrases for the built-in actions.

use serde::{Deserialize, Serialize};
use shared::ipc::CommandPhrases;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use crate::lock::lock_or_recover;
use crate::log::LogSink;
use crate::persist;
use crate::speech::recognizer::clean_transcript;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Open,
    Save,
    Close,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Open, Action::Save, Action::Close];

    pub fn key(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Open => "open",
            Action::Save => "save",
            Action::Close => "close",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Error, Debug)]
pub enum VocabularyError {
    #[error("trigger phrase for '{0}' must contain at least one word")]
    Validation(Action),

    #[error("failed to persist vocabulary: {0}")]
    Persistence(#[from] std::io::Error),
}

/// The effective four-entry mapping. Phrases are stored in the same cleaned
/// form the recognizer produces for transcripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    create: String,
    open: String,
    save: String,
    close: String,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            create: "create a new notepad".to_string(),
            open: "open".to_string(),
            save: "save the notepad".to_string(),
            close: "close notepad".to_string(),
        }
    }
}

/// On-disk shape. Every key is optional; unknown keys are ignored.
#[derive(Debug, Default, Deserialize, Serialize)]
struct VocabularyRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    create: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    open: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    save: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    close: Option<String>,
}

/// A phrase that differs from every cleaned transcript could never match.
fn normalize(phrase: &str) -> String {
    clean_transcript(phrase)
}

impl Vocabulary {
    pub fn phrase(&self, action: Action) -> &str {
        match action {
            Action::Create => &self.create,
            Action::Open => &self.open,
            Action::Save => &self.save,
            Action::Close => &self.close,
        }
    }

    fn slot(&mut self, action: Action) -> &mut String {
        match action {
            Action::Create => &mut self.create,
            Action::Open => &mut self.open,
            Action::Save => &mut self.save,
            Action::Close => &mut self.close,
        }
    }

    /// Builds a vocabulary from user input, rejecting any phrase that has no
    /// words left after cleanup.
    pub fn from_phrases(phrases: &CommandPhrases) -> Result<Self, VocabularyError> {
        let mut vocabulary = Self::default();
        for action in Action::ALL {
            let raw = match action {
                Action::Create => &phrases.create,
                Action::Open => &phrases.open,
                Action::Save => &phrases.save,
                Action::Close => &phrases.close,
            };
            let phrase = normalize(raw);
            if phrase.is_empty() {
                return Err(VocabularyError::Validation(action));
            }
            *vocabulary.slot(action) = phrase;
        }
        Ok(vocabulary)
    }

    pub fn to_phrases(&self) -> CommandPhrases {
        CommandPhrases {
            create: self.create.clone(),
            open: self.open.clone(),
            save: self.save.clone(),
            close: self.close.clone(),
        }
    }

    fn overlay(record: VocabularyRecord) -> Self {
        let mut vocabulary = Self::default();
        let entries = [
            (Action::Create, record.create),
            (Action::Open, record.open),
            (Action::Save, record.save),
            (Action::Close, record.close),
        ];
        for (action, value) in entries {
            if let Some(phrase) = value.map(|p| normalize(&p)).filter(|p| !p.is_empty()) {
                *vocabulary.slot(action) = phrase;
            }
        }
        vocabulary
    }

    fn to_record(&self) -> VocabularyRecord {
        VocabularyRecord {
            create: Some(self.create.clone()),
            open: Some(self.open.clone()),
            save: Some(self.save.clone()),
            close: Some(self.close.clone()),
        }
    }
}

/// Holds the live vocabulary behind a single lock and persists every change.
pub struct VocabularyStore {
    path: PathBuf,
    current: Mutex<Vocabulary>,
}

impl VocabularyStore {
    /// Loads the persisted record over the defaults. A missing file yields the
    /// defaults; an unreadable or malformed file is reported and ignored.
    pub fn load(path: impl Into<PathBuf>, sink: &dyn LogSink) -> Self {
        let path = path.into();
        let vocabulary = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<VocabularyRecord>(&contents) {
                Ok(record) => Vocabulary::overlay(record),
                Err(e) => {
                    sink.emit(&format!("Failed to load commands: {}", e));
                    Vocabulary::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No vocabulary at {:?}, using defaults", path);
                Vocabulary::default()
            }
            Err(e) => {
                sink.emit(&format!("Failed to load commands: {}", e));
                Vocabulary::default()
            }
        };

        Self {
            path,
            current: Mutex::new(vocabulary),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn resolve(&self) -> Vocabulary {
        lock_or_recover(&self.current, "vocabulary").clone()
    }

    pub fn update(&self, phrases: &CommandPhrases) -> Result<Vocabulary, VocabularyError> {
        let vocabulary = Vocabulary::from_phrases(phrases)?;
        self.replace(vocabulary)
    }

    pub fn reset(&self) -> Result<Vocabulary, VocabularyError> {
        self.replace(Vocabulary::default())
    }

    fn replace(&self, vocabulary: Vocabulary) -> Result<Vocabulary, VocabularyError> {
        let mut current = lock_or_recover(&self.current, "vocabulary");
        persist::write_json_atomic(&self.path, &vocabulary.to_record())?;
        *current = vocabulary.clone();
        tracing::info!("Vocabulary saved to {:?}", self.path);
        Ok(vocabulary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogBook;
    use tempfile::TempDir;

    fn phrases(create: &str, open: &str, save: &str, close: &str) -> CommandPhrases {
        CommandPhrases {
            create: create.to_string(),
            open: open.to_string(),
            save: save.to_string(),
            close: close.to_string(),
        }
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let sink = LogBook::new();
        let store = VocabularyStore::load(dir.path().join("commands.json"), &sink);
        assert_eq!(store.resolve(), Vocabulary::default());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_partial_record_overlays_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commands.json");
        std::fs::write(&path, r#"{"save": "  Save It ", "bogus": "ignored", "close": ""}"#).unwrap();

        let store = VocabularyStore::load(&path, &LogBook::new());
        let vocabulary = store.resolve();
        assert_eq!(vocabulary.phrase(Action::Save), "save it");
        assert_eq!(vocabulary.phrase(Action::Create), "create a new notepad");
        assert_eq!(vocabulary.phrase(Action::Close), "close notepad");
    }

    #[test]
    fn test_malformed_file_is_logged_and_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commands.json");
        std::fs::write(&path, "{not json").unwrap();

        let sink = LogBook::new();
        let store = VocabularyStore::load(&path, &sink);
        assert_eq!(store.resolve(), Vocabulary::default());
        assert_eq!(sink.len(), 1);
        assert!(sink.entries()[0].starts_with("Failed to load commands"));
    }

    #[test]
    fn test_update_persists_and_normalizes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commands.json");
        let store = VocabularyStore::load(&path, &LogBook::new());

        store
            .update(&phrases(" New Note", "open", "save it", "close it"))
            .unwrap();
        assert_eq!(store.resolve().phrase(Action::Create), "new note");

        let reloaded = VocabularyStore::load(&path, &LogBook::new());
        assert_eq!(reloaded.resolve(), store.resolve());
    }

    #[test]
    fn test_update_with_empty_phrase_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commands.json");
        let store = VocabularyStore::load(&path, &LogBook::new());
        store.update(&phrases("a", "b", "c", "d")).unwrap();
        let persisted = std::fs::read_to_string(&path).unwrap();

        let err = store.update(&phrases("x", "y", "   ", "z")).unwrap_err();
        assert!(matches!(err, VocabularyError::Validation(Action::Save)));
        assert_eq!(store.resolve().phrase(Action::Create), "a");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), persisted);
    }

    #[test]
    fn test_update_cleans_phrases_like_transcripts() {
        let dir = TempDir::new().unwrap();
        let store = VocabularyStore::load(dir.path().join("commands.json"), &LogBook::new());

        let vocabulary = store
            .update(&phrases("New-Note!", "Open.", "save it.", "go go"))
            .unwrap();
        assert_eq!(vocabulary.phrase(Action::Create), "new-note");
        assert_eq!(vocabulary.phrase(Action::Open), "open");
        assert_eq!(vocabulary.phrase(Action::Save), "save it");
        assert_eq!(vocabulary.phrase(Action::Close), "go");
    }

    #[test]
    fn test_punctuation_only_phrase_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commands.json");
        let store = VocabularyStore::load(&path, &LogBook::new());

        let err = store.update(&phrases("new note", "?!", "save", "close")).unwrap_err();
        assert!(matches!(err, VocabularyError::Validation(Action::Open)));
        assert_eq!(store.resolve(), Vocabulary::default());
        assert!(!path.exists());
    }

    #[test]
    fn test_persisted_phrases_are_cleaned_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commands.json");
        std::fs::write(&path, r#"{"save": "Save, it!", "close": "..."}"#).unwrap();

        let vocabulary = VocabularyStore::load(&path, &LogBook::new()).resolve();
        assert_eq!(vocabulary.phrase(Action::Save), "save it");
        assert_eq!(vocabulary.phrase(Action::Close), "close notepad");
    }

    #[test]
    fn test_persistence_failure_keeps_memory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = VocabularyStore::load(blocker.join("commands.json"), &LogBook::new());

        let err = store.update(&phrases("a", "b", "c", "d")).unwrap_err();
        assert!(matches!(err, VocabularyError::Persistence(_)));
        assert_eq!(store.resolve(), Vocabulary::default());

        let err = store.reset().unwrap_err();
        assert!(matches!(err, VocabularyError::Persistence(_)));
        assert_eq!(store.resolve(), Vocabulary::default());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commands.json");
        let store = VocabularyStore::load(&path, &LogBook::new());
        store.update(&phrases("a", "b", "c", "d")).unwrap();

        store.reset().unwrap();
        assert_eq!(store.resolve(), Vocabulary::default());
        let reloaded = VocabularyStore::load(&path, &LogBook::new());
        assert_eq!(reloaded.resolve(), Vocabulary::default());
    }
}
