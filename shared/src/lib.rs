pub mod ipc;

pub use ipc::{Command, CommandPhrases, IpcError, Response, StatusInfo};
