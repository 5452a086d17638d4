//! User-facing event log.
//!
//! Every action the daemon takes on behalf of the user is reported through a
//! [`LogSink`]. Components receive the sink at construction; nothing writes to
//! a global default.

use std::sync::Mutex;

use crate::lock::lock_or_recover;

pub trait LogSink: Send + Sync {
    fn emit(&self, message: &str);
}

/// Append-only, ordered history of emitted events, mirrored to `tracing`.
#[derive(Debug, Default)]
pub struct LogBook {
    entries: Mutex<Vec<String>>,
}

impl LogBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        lock_or_recover(&self.entries, "log book").clone()
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.entries, "log book").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for LogBook {
    fn emit(&self, message: &str) {
        tracing::info!(target: "notevox::events", "{}", message);
        lock_or_recover(&self.entries, "log book").push(message.to_string());
    }
}
