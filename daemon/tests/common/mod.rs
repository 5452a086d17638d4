// Common test helpers for notevoxd tests
//
// This module provides:
// - Scripted speech source and recording target application fakes
// - Polling helpers for the listen loop worker
// - Prompts for the hardware tests that need a person at the microphone

#![allow(dead_code)]

use notevoxd::output::{AppError, TargetApp};
use notevoxd::speech::{DeviceError, RecognitionResult, SpeechSource};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// One scripted reply from [`ScriptedSource`].
pub enum Step {
    Hear(RecognitionResult),
    Fail(DeviceError),
    /// Blocks inside `listen_once` until the gate is released.
    Gated(Gate, RecognitionResult),
}

pub fn heard(text: &str) -> Step {
    Step::Hear(RecognitionResult::Transcript(text.to_string()))
}

/// Worker side of a gate.
pub struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// Test side of a gate.
pub struct GateHandle {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl GateHandle {
    pub fn wait_entered(&self) {
        self.entered
            .recv_timeout(Duration::from_secs(5))
            .expect("capture never started");
    }

    pub fn release(&self) {
        self.release.send(()).expect("gate dropped");
    }
}

pub fn gate() -> (GateHandle, Gate) {
    let (entered_tx, entered_rx) = channel();
    let (release_tx, release_rx) = channel();
    (
        GateHandle {
            entered: entered_rx,
            release: release_tx,
        },
        Gate {
            entered: entered_tx,
            release: release_rx,
        },
    )
}

/// Plays back a script, then times out forever.
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    calls: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct SourceHandle {
    calls: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl SourceHandle {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> (Self, SourceHandle) {
        let calls = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicBool::new(false));
        let handle = SourceHandle {
            calls: Arc::clone(&calls),
            released: Arc::clone(&released),
        };
        (
            Self {
                steps: steps.into(),
                calls,
                released,
            },
            handle,
        )
    }
}

impl SpeechSource for ScriptedSource {
    fn listen_once(&mut self, timeout: Duration) -> Result<RecognitionResult, DeviceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.released.store(false, Ordering::SeqCst);
        match self.steps.pop_front() {
            Some(Step::Hear(result)) => Ok(result),
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Gated(gate, result)) => {
                let _ = gate.entered.send(());
                let _ = gate.release.recv_timeout(Duration::from_secs(5));
                Ok(result)
            }
            None => {
                thread::sleep(timeout.min(Duration::from_millis(5)));
                Ok(RecognitionResult::TimedOut)
            }
        }
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCall {
    Launch(Option<PathBuf>),
    TerminateAll,
    Save,
    Text(String),
}

/// Records every effect and tracks whether an instance is running.
pub struct RecordingApp {
    calls: Arc<Mutex<Vec<AppCall>>>,
    running: Arc<AtomicBool>,
    fail_launch: bool,
}

#[derive(Clone)]
pub struct AppHandle {
    calls: Arc<Mutex<Vec<AppCall>>>,
    running: Arc<AtomicBool>,
}

impl AppHandle {
    pub fn calls(&self) -> Vec<AppCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                AppCall::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The user closed the editor behind the daemon's back.
    pub fn kill_externally(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl RecordingApp {
    pub fn new() -> (Self, AppHandle) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(false));
        let handle = AppHandle {
            calls: Arc::clone(&calls),
            running: Arc::clone(&running),
        };
        (
            Self {
                calls,
                running,
                fail_launch: false,
            },
            handle,
        )
    }

    pub fn failing_launch() -> (Self, AppHandle) {
        let (mut app, handle) = Self::new();
        app.fail_launch = true;
        (app, handle)
    }

    fn record(&self, call: AppCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl TargetApp for RecordingApp {
    fn launch(&mut self, path: Option<&Path>) -> Result<(), AppError> {
        if self.fail_launch {
            return Err(AppError::Launch {
                program: "fake-editor".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such program"),
            });
        }
        self.record(AppCall::Launch(path.map(Path::to_path_buf)));
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn terminate_all(&mut self) -> Result<(), AppError> {
        self.record(AppCall::TerminateAll);
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn send_save_shortcut(&mut self) -> Result<(), AppError> {
        self.record(AppCall::Save);
        Ok(())
    }

    fn send_text(&mut self, text: &str) -> Result<(), AppError> {
        self.record(AppCall::Text(text.to_string()));
        Ok(())
    }
}

/// Polls `condition` until it holds or `limit` passes.
pub fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Ask user to confirm an action
pub fn confirm_action(prompt: &str) -> bool {
    print!(
        "\n[CONFIRM] {}\nPress 'y' to confirm, any other key to skip: ",
        prompt
    );
    io::stdout().flush().unwrap();

    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();

    input.trim().to_lowercase() == "y"
}

/// Print a section header
pub fn print_header(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("  {}", title);
    println!("{}", "=".repeat(60));
}

pub fn print_info(message: &str) {
    println!("\nℹ {}", message);
}
