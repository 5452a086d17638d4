pub mod capture;
pub mod endpoint;
pub mod microphone;
pub mod recognizer;

use std::time::Duration;
use thiserror::Error;

pub use capture::AudioCapture;
pub use endpoint::{Calibrator, Endpointer};
pub use microphone::MicrophoneSource;
pub use recognizer::{HttpRecognizer, Recognizer};

/// Outcome of one listen attempt. Only a transcript carries data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionResult {
    Transcript(String),
    TimedOut,
    Unintelligible,
    ServiceError(String),
}

/// The capture device cannot be used. Fatal to the listen loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("capture device unavailable: {0}")]
pub struct DeviceError(pub String);

pub trait SpeechSource: Send {
    /// Captures one utterance and recognizes it. Waiting for speech never
    /// exceeds `timeout`; expected recognition failures are returned as
    /// values, only device trouble is an error.
    fn listen_once(&mut self, timeout: Duration) -> Result<RecognitionResult, DeviceError>;

    /// Gives up the capture device until the next `listen_once`.
    fn release(&mut self) {}
}
