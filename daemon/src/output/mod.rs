pub mod editor;
pub mod keyboard;

use std::path::Path;
use thiserror::Error;

pub use editor::DesktopEditor;
pub use keyboard::VirtualKeyboard;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to terminate {0}: {1}")]
    Terminate(String, String),

    #[error("{0} still running after {1:?}; refusing to relaunch")]
    ExitTimeout(String, std::time::Duration),

    #[error("save shortcut failed: {0}")]
    Save(String),

    #[error("text input failed: {0}")]
    Input(String),
}

/// The automated text editor. Implementations block until each effect has
/// been delivered.
pub trait TargetApp: Send {
    fn launch(&mut self, path: Option<&Path>) -> Result<(), AppError>;

    /// Terminates every running instance and waits for them to exit.
    fn terminate_all(&mut self) -> Result<(), AppError>;

    fn is_running(&mut self) -> bool;

    fn send_save_shortcut(&mut self) -> Result<(), AppError>;

    fn send_text(&mut self, text: &str) -> Result<(), AppError>;
}
