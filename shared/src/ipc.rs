use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Toggle,
    Status,
    Logs,
    GetCommands,
    SetCommands(CommandPhrases),
    ResetCommands,
    SetSensitivity(i64),
    SetNotesDir(String),
    ResetSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    Error(String),
    Status(StatusInfo),
    Logs(Vec<String>),
    Commands(CommandPhrases),
}

/// Trigger phrases for the four built-in actions, as exchanged with the CLI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommandPhrases {
    pub create: String,
    pub open: String,
    pub save: String,
    pub close: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatusInfo {
    pub is_listening: bool,
    pub phase: String,
    pub document_open: bool,
    pub current_file: Option<String>,
    pub last_action: String,
    pub sensitivity: u32,
    pub notes_dir: String,
    pub fault: Option<String>,
}

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection refused: is notevoxd running?")]
    ConnectionRefused,

    #[error("Connection timeout")]
    Timeout,
}
