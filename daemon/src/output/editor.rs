use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::keyboard::VirtualKeyboard;
use super::{AppError, TargetApp};
use crate::config::EditorConfig;

/// A desktop text editor driven through process control and synthetic input.
pub struct DesktopEditor {
    program: String,
    process_name: String,
    save_command: Vec<String>,
    launch_settle: Duration,
    save_settle: Duration,
    exit_poll: Duration,
    exit_timeout: Duration,
    children: Vec<Child>,
    keyboard: Option<VirtualKeyboard>,
}

impl DesktopEditor {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            program: config.program.clone(),
            process_name: config.process_name.clone(),
            save_command: config.save_command.clone(),
            launch_settle: Duration::from_millis(config.launch_settle_ms),
            save_settle: Duration::from_millis(config.save_settle_ms),
            exit_poll: Duration::from_millis(config.exit_poll_ms.max(10)),
            exit_timeout: Duration::from_secs(config.exit_timeout_seconds),
            children: Vec::new(),
            keyboard: None,
        }
    }

    /// Collects exited children so they do not linger as zombies that
    /// `pgrep` would still report.
    fn reap_children(&mut self) {
        self.children
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));
    }

    fn keyboard(&mut self) -> Result<&mut VirtualKeyboard, AppError> {
        let keyboard = match self.keyboard.take() {
            Some(keyboard) => keyboard,
            None => VirtualKeyboard::new()?,
        };
        Ok(self.keyboard.insert(keyboard))
    }
}

fn quiet(command: &mut Command) -> &mut Command {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
}

impl TargetApp for DesktopEditor {
    fn launch(&mut self, path: Option<&Path>) -> Result<(), AppError> {
        let mut command = Command::new(&self.program);
        if let Some(path) = path {
            command.arg(path);
        }
        let child = quiet(&mut command).spawn().map_err(|source| AppError::Launch {
            program: self.program.clone(),
            source,
        })?;
        info!("Launched {} (pid {})", self.program, child.id());
        self.children.push(child);
        thread::sleep(self.launch_settle);
        Ok(())
    }

    fn terminate_all(&mut self) -> Result<(), AppError> {
        let status = quiet(Command::new("pkill").args(["-x", self.process_name.as_str()]))
            .status()
            .map_err(|e| AppError::Terminate(self.process_name.clone(), e.to_string()))?;
        // pkill exits 1 when nothing matched
        if !status.success() && status.code() != Some(1) {
            return Err(AppError::Terminate(
                self.process_name.clone(),
                format!("pkill exited with {status}"),
            ));
        }

        let deadline = Instant::now() + self.exit_timeout;
        while self.is_running() {
            if Instant::now() >= deadline {
                warn!("{} did not exit within {:?}", self.process_name, self.exit_timeout);
                return Err(AppError::ExitTimeout(self.process_name.clone(), self.exit_timeout));
            }
            thread::sleep(self.exit_poll);
        }
        debug!("All {} instances exited", self.process_name);
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        self.reap_children();
        quiet(Command::new("pgrep").args(["-x", self.process_name.as_str()]))
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn send_save_shortcut(&mut self) -> Result<(), AppError> {
        let (program, args) = self
            .save_command
            .split_first()
            .ok_or_else(|| AppError::Save("no save command configured".to_string()))?;
        let status = quiet(Command::new(program).args(args))
            .status()
            .map_err(|e| AppError::Save(format!("{program}: {e}")))?;
        if !status.success() {
            return Err(AppError::Save(format!("{program} exited with {status}")));
        }
        thread::sleep(self.save_settle);
        Ok(())
    }

    fn send_text(&mut self, text: &str) -> Result<(), AppError> {
        self.keyboard()?.type_line(text)
    }
}

impl Drop for DesktopEditor {
    fn drop(&mut self) {
        self.reap_children();
    }
}
