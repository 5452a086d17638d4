use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastAction {
    #[default]
    None,
    Create,
    Open,
    Save,
    Close,
}

impl fmt::Display for LastAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastAction::None => write!(f, "None"),
            LastAction::Create => write!(f, "Create"),
            LastAction::Open => write!(f, "Open"),
            LastAction::Save => write!(f, "Save"),
            LastAction::Close => write!(f, "Close"),
        }
    }
}

/// Facts about the current automation session.
///
/// `current_file` is only ever set while `open` is true. The mutators are
/// crate-private so that only the executor can move the state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    open: bool,
    current_file: Option<PathBuf>,
    last_action: LastAction,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn last_action(&self) -> LastAction {
        self.last_action
    }

    pub(crate) fn opened(&mut self, path: PathBuf, action: LastAction) {
        self.open = true;
        self.current_file = Some(path);
        self.last_action = action;
    }

    pub(crate) fn saved(&mut self) {
        self.last_action = LastAction::Save;
    }

    pub(crate) fn closed(&mut self) {
        self.open = false;
        self.current_file = None;
        self.last_action = LastAction::Close;
    }

    /// Used when the target application went away underneath us.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
