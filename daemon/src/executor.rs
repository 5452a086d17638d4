//! Guarded session transitions and their effects on the target application.
//!
//! The executor is the only code that moves [`SessionState`]. Each request
//! produces exactly one log event describing what happened.

use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

use crate::lock::lock_or_recover;
use crate::log::LogSink;
use crate::output::{AppError, TargetApp};
use crate::session::{LastAction, SessionState};
use crate::settings::NotesDir;
use crate::vocabulary::Action;

/// Dictated in place of closing when the document has unsaved changes.
pub const CLOSE_FALLBACK_TEXT: &str = "close notepad";

/// Prefixed to the outcome when the editor turned out to be gone.
pub const EDITOR_LOST_TEXT: &str = "Editor is no longer running; session reset. ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    Create(String),
    Open(String),
    Save,
    Close,
    Literal(String),
}

impl ActionRequest {
    fn label(&self) -> &'static str {
        match self {
            ActionRequest::Create(_) => "create",
            ActionRequest::Open(_) => "open",
            ActionRequest::Save => "save",
            ActionRequest::Close => "close",
            ActionRequest::Literal(_) => "dictation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(PathBuf),
    Opened(PathBuf),
    Saved,
    Closed,
    Typed(String),
    /// Close was asked for before a save; the phrase was dictated instead.
    CloseDeferred,
    AlreadyExists(PathBuf),
    NotFound(PathBuf),
    NothingOpen(Action),
    InvalidName(String),
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created(path) => {
                write!(f, "Note '{}' created and opened successfully!", file_name(path))
            }
            Outcome::Opened(path) => write!(f, "Opened note: {}", file_name(path)),
            Outcome::Saved => write!(f, "Note saved successfully."),
            Outcome::Closed => write!(f, "Note closed successfully!"),
            Outcome::Typed(text) => write!(f, "Typed: {}", text),
            Outcome::CloseDeferred => write!(
                f,
                "Notes can only be closed after saving! Writing '{}' instead.",
                CLOSE_FALLBACK_TEXT
            ),
            Outcome::AlreadyExists(path) => {
                write!(f, "Note '{}' already exists!", file_name(path))
            }
            Outcome::NotFound(path) => write!(
                f,
                "File '{}' does not exist! Please say another name.",
                file_name(path)
            ),
            Outcome::NothingOpen(action) => write!(f, "No note is open to {}!", action),
            Outcome::InvalidName(name) => write!(f, "'{}' is not a valid note name.", name),
        }
    }
}

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("cannot create {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    App(#[from] AppError),
}

pub struct ActionExecutor {
    app: Box<dyn TargetApp>,
    session: Arc<Mutex<SessionState>>,
    notes_dir: NotesDir,
    sink: Arc<dyn LogSink>,
    editor_lost: bool,
}

impl ActionExecutor {
    pub fn new(app: Box<dyn TargetApp>, notes_dir: NotesDir, sink: Arc<dyn LogSink>) -> Self {
        Self {
            app,
            session: Arc::new(Mutex::new(SessionState::new())),
            notes_dir,
            sink,
            editor_lost: false,
        }
    }

    /// Shared handle for readers on the control path.
    pub fn session(&self) -> Arc<Mutex<SessionState>> {
        Arc::clone(&self.session)
    }

    pub fn snapshot(&self) -> SessionState {
        lock_or_recover(&self.session, "session").clone()
    }

    pub fn note_path(&self, name: &str) -> PathBuf {
        self.notes_dir.get().join(format!("{name}.txt"))
    }

    pub fn execute(&mut self, request: ActionRequest) -> Result<Outcome, ActionError> {
        let label = request.label();
        debug!("Executing {:?}", request);

        let result = match request {
            ActionRequest::Create(name) => self.create(&name),
            ActionRequest::Open(name) => self.open(&name),
            ActionRequest::Save => self.save(),
            ActionRequest::Close => self.close(),
            ActionRequest::Literal(text) => self.write_text(text),
        };

        // a reset noticed on the way shares the request's single event
        let prefix = if std::mem::take(&mut self.editor_lost) {
            EDITOR_LOST_TEXT
        } else {
            ""
        };
        match &result {
            Ok(outcome) => self.sink.emit(&format!("{}{}", prefix, outcome)),
            Err(e) => self
                .sink
                .emit(&format!("{}Error during {}: {}", prefix, label, e)),
        }
        result
    }

    fn update(&self, f: impl FnOnce(&mut SessionState)) {
        f(&mut lock_or_recover(&self.session, "session"));
    }

    /// Spoken names become file stems; anything that would leave the notes
    /// directory is refused.
    fn valid_name(name: &str) -> Option<&str> {
        let name = name.trim();
        let traversal = name.contains('/') || name.contains('\\') || name.contains("..");
        if name.is_empty() || name == "." || traversal {
            None
        } else {
            Some(name)
        }
    }

    /// Notices an editor that went away without us and forgets its document.
    fn check_alive(&mut self) {
        if self.snapshot().is_open() && !self.app.is_running() {
            warn!("Target application is no longer running; resetting session");
            self.update(SessionState::reset);
            self.editor_lost = true;
        }
    }

    fn create(&mut self, name: &str) -> Result<Outcome, ActionError> {
        let Some(name) = Self::valid_name(name) else {
            return Ok(Outcome::InvalidName(name.to_string()));
        };
        let path = self.note_path(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Ok(Outcome::AlreadyExists(path));
            }
            Err(source) => return Err(ActionError::Io { path, source }),
        }

        if let Err(e) = self.app.launch(Some(&path)) {
            // a note only exists once the editor has it open
            if let Err(rm) = std::fs::remove_file(&path) {
                warn!("Could not remove {:?} after failed launch: {}", path, rm);
            }
            return Err(e.into());
        }
        self.update(|s| s.opened(path.clone(), LastAction::Create));
        Ok(Outcome::Created(path))
    }

    fn open(&mut self, name: &str) -> Result<Outcome, ActionError> {
        let Some(name) = Self::valid_name(name) else {
            return Ok(Outcome::InvalidName(name.to_string()));
        };
        let path = self.note_path(name);
        if !path.is_file() {
            return Ok(Outcome::NotFound(path));
        }

        // one document per session: old instances must be gone before relaunch
        self.app.terminate_all()?;
        self.update(SessionState::reset);

        self.app.launch(Some(&path))?;
        self.update(|s| s.opened(path.clone(), LastAction::Open));
        Ok(Outcome::Opened(path))
    }

    fn save(&mut self) -> Result<Outcome, ActionError> {
        self.check_alive();
        if !self.snapshot().is_open() {
            return Ok(Outcome::NothingOpen(Action::Save));
        }

        self.app.send_save_shortcut()?;
        self.update(SessionState::saved);
        Ok(Outcome::Saved)
    }

    fn close(&mut self) -> Result<Outcome, ActionError> {
        self.check_alive();
        let state = self.snapshot();
        if !state.is_open() {
            return Ok(Outcome::NothingOpen(Action::Close));
        }

        if state.last_action() != LastAction::Save {
            self.app.send_text(CLOSE_FALLBACK_TEXT)?;
            return Ok(Outcome::CloseDeferred);
        }

        self.app.terminate_all()?;
        self.update(SessionState::closed);
        Ok(Outcome::Closed)
    }

    fn write_text(&mut self, text: String) -> Result<Outcome, ActionError> {
        self.check_alive();
        self.app.send_text(&text)?;
        Ok(Outcome::Typed(text))
    }
}
