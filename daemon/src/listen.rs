//! The listen loop: capture, classify, dispatch, repeat until cancelled.
//!
//! The loop runs on its own thread and talks to the control path only
//! through a cancellation flag, the shared status record and the log sink.
//! Every capture is bounded by the speech source timeout, so a stop request
//! takes effect at most one capture interval after it is made.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::classify::{classify, ClassifiedCommand};
use crate::executor::{ActionExecutor, ActionRequest};
use crate::lock::lock_or_recover;
use crate::log::LogSink;
use crate::speech::{DeviceError, RecognitionResult, SpeechSource};
use crate::vocabulary::VocabularyStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Listening,
    Dispatching,
    Stopped,
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopPhase::Idle => write!(f, "idle"),
            LoopPhase::Listening => write!(f, "listening"),
            LoopPhase::Dispatching => write!(f, "dispatching"),
            LoopPhase::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug)]
struct LoopStatus {
    generation: u64,
    phase: LoopPhase,
    fault: Option<DeviceError>,
}

/// Status writes from a worker are ignored once a newer run has started.
#[derive(Clone)]
struct StatusHandle {
    generation: u64,
    status: Arc<Mutex<LoopStatus>>,
}

impl StatusHandle {
    fn set_phase(&self, phase: LoopPhase) {
        let mut status = lock_or_recover(&self.status, "loop status");
        if status.generation == self.generation {
            status.phase = phase;
        }
    }

    fn set_fault(&self, fault: DeviceError) {
        let mut status = lock_or_recover(&self.status, "loop status");
        if status.generation == self.generation {
            status.fault = Some(fault);
        }
    }
}

/// Everything the worker owns while a run is in progress.
pub struct ListenEngine {
    source: Box<dyn SpeechSource>,
    executor: ActionExecutor,
    vocabulary: Arc<VocabularyStore>,
    timeout: Duration,
}

impl ListenEngine {
    pub fn new(
        source: Box<dyn SpeechSource>,
        executor: ActionExecutor,
        vocabulary: Arc<VocabularyStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            executor,
            vocabulary,
            timeout,
        }
    }

    fn run(&mut self, cancel: &AtomicBool, status: &StatusHandle, sink: &dyn LogSink) {
        info!("Listen loop running");
        if let Err(e) = self.listen_until_cancelled(cancel, status, sink) {
            error!("Listen loop halted: {}", e);
            sink.emit(&format!("Microphone error: {}. Listening halted.", e));
            status.set_fault(e);
        }
        self.source.release();
        status.set_phase(LoopPhase::Stopped);
        info!("Listen loop exited");
    }

    fn listen_until_cancelled(
        &mut self,
        cancel: &AtomicBool,
        status: &StatusHandle,
        sink: &dyn LogSink,
    ) -> Result<(), DeviceError> {
        while !cancel.load(Ordering::SeqCst) {
            status.set_phase(LoopPhase::Listening);
            let Some(transcript) = self.next_transcript(cancel, sink)? else {
                continue;
            };
            sink.emit(&format!("You said: {}", transcript));

            let command = classify(&transcript, &self.vocabulary.resolve());
            debug!("Classified {:?} as {:?}", transcript, command);

            let request = match command {
                ClassifiedCommand::Create => match self.spoken_name(cancel, sink)? {
                    Some(name) => ActionRequest::Create(name),
                    None => break,
                },
                ClassifiedCommand::Open => match self.spoken_name(cancel, sink)? {
                    Some(name) => ActionRequest::Open(name),
                    None => break,
                },
                ClassifiedCommand::Save => ActionRequest::Save,
                ClassifiedCommand::Close => ActionRequest::Close,
                ClassifiedCommand::Literal(text) => ActionRequest::Literal(text),
            };

            if cancel.load(Ordering::SeqCst) {
                debug!("Stop requested; dropping {:?}", request);
                break;
            }

            status.set_phase(LoopPhase::Dispatching);
            // failures are already in the log; the loop keeps going
            let _ = self.executor.execute(request);
        }
        Ok(())
    }

    /// One capture attempt. Returns `None` for recognition failures and when
    /// a stop arrived while the capture was outstanding.
    fn next_transcript(
        &mut self,
        cancel: &AtomicBool,
        sink: &dyn LogSink,
    ) -> Result<Option<String>, DeviceError> {
        let result = self.source.listen_once(self.timeout)?;
        if cancel.load(Ordering::SeqCst) {
            debug!("Stop requested during capture; discarding {:?}", result);
            return Ok(None);
        }

        match result {
            RecognitionResult::Transcript(text) => Ok(Some(text.trim().to_lowercase())),
            RecognitionResult::TimedOut => {
                debug!("No speech within {:?}", self.timeout);
                Ok(None)
            }
            RecognitionResult::Unintelligible => {
                sink.emit("Could not understand audio, try again.");
                Ok(None)
            }
            RecognitionResult::ServiceError(detail) => {
                sink.emit(&format!("Could not request results; {}", detail));
                Ok(None)
            }
        }
    }

    /// Keeps listening until a name is heard. `None` means the run was
    /// cancelled first.
    fn spoken_name(
        &mut self,
        cancel: &AtomicBool,
        sink: &dyn LogSink,
    ) -> Result<Option<String>, DeviceError> {
        sink.emit("Say the note name...");
        while !cancel.load(Ordering::SeqCst) {
            if let Some(name) = self.next_transcript(cancel, sink)? {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }
}

struct Run {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Run {
    fn is_active(&self) -> bool {
        !self.cancel.load(Ordering::SeqCst) && !self.handle.is_finished()
    }
}

/// Owns the worker thread. A new run waits for the engine until a previous,
/// already cancelled run has finished its last capture.
pub struct ListenLoop {
    engine: Arc<Mutex<ListenEngine>>,
    sink: Arc<dyn LogSink>,
    status: Arc<Mutex<LoopStatus>>,
    run: Mutex<Option<Run>>,
}

impl ListenLoop {
    pub fn new(engine: ListenEngine, sink: Arc<dyn LogSink>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            sink,
            status: Arc::new(Mutex::new(LoopStatus {
                generation: 0,
                phase: LoopPhase::Idle,
                fault: None,
            })),
            run: Mutex::new(None),
        }
    }

    /// Starts a run. Returns `false` when one is already listening.
    pub fn start(&self) -> anyhow::Result<bool> {
        let mut run = lock_or_recover(&self.run, "listen run");
        if run.as_ref().is_some_and(Run::is_active) {
            debug!("Listen loop already running");
            return Ok(false);
        }

        let generation = {
            let mut status = lock_or_recover(&self.status, "loop status");
            status.generation += 1;
            status.phase = LoopPhase::Listening;
            status.fault = None;
            status.generation
        };
        let status = StatusHandle {
            generation,
            status: Arc::clone(&self.status),
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let engine = Arc::clone(&self.engine);
        let sink = Arc::clone(&self.sink);
        let worker_cancel = Arc::clone(&cancel);

        let handle = thread::Builder::new()
            .name("listen-loop".to_string())
            .spawn(move || {
                let mut engine = lock_or_recover(&engine, "listen engine");
                engine.run(&worker_cancel, &status, sink.as_ref());
            })?;

        // a previous cancelled run is left to finish on its own
        *run = Some(Run { cancel, handle });
        Ok(true)
    }

    /// Requests cancellation. Returns `false` when nothing was listening.
    pub fn stop(&self) -> bool {
        let run = lock_or_recover(&self.run, "listen run");
        match run.as_ref() {
            Some(current) if current.is_active() => {
                current.cancel.store(true, Ordering::SeqCst);
                info!("Listen loop stop requested");
                true
            }
            _ => false,
        }
    }

    /// Cancels the current run and blocks until its worker has exited.
    pub fn stop_and_wait(&self) {
        let current = lock_or_recover(&self.run, "listen run").take();
        if let Some(current) = current {
            current.cancel.store(true, Ordering::SeqCst);
            if current.handle.join().is_err() {
                error!("Listen loop worker panicked");
            }
        }
    }

    pub fn is_listening(&self) -> bool {
        lock_or_recover(&self.run, "listen run")
            .as_ref()
            .is_some_and(Run::is_active)
    }

    pub fn phase(&self) -> LoopPhase {
        lock_or_recover(&self.status, "loop status").phase
    }

    /// The device error that halted the last run, if any.
    pub fn fault(&self) -> Option<DeviceError> {
        lock_or_recover(&self.status, "loop status").fault.clone()
    }
}

impl Drop for ListenLoop {
    fn drop(&mut self) {
        if let Some(current) = lock_or_recover(&self.run, "listen run").as_ref() {
            current.cancel.store(true, Ordering::SeqCst);
        }
    }
}
