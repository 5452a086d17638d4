use tracing::{debug, info};
use wrtype::WrtypeClient;

use super::AppError;

/// Wayland virtual keyboard typing into the focused window.
pub struct VirtualKeyboard {
    client: WrtypeClient,
}

impl VirtualKeyboard {
    pub fn new() -> Result<Self, AppError> {
        info!("Creating VirtualKeyboard using wrtype");

        let client = WrtypeClient::new()
            .map_err(|e| AppError::Input(format!("failed to create WrtypeClient: {:?}", e)))?;

        Ok(Self { client })
    }

    /// Types `text` followed by a newline so each dictated phrase lands on
    /// its own line.
    pub fn type_line(&mut self, text: &str) -> Result<(), AppError> {
        let line = format!("{text}\n");
        self.client
            .type_text(&line)
            .map_err(|e| AppError::Input(format!("failed to type text: {:?}", e)))?;
        debug!("Typed {} characters", line.chars().count());
        Ok(())
    }
}

// The Wayland connection is only touched from the listen worker.
unsafe impl Send for VirtualKeyboard {}
