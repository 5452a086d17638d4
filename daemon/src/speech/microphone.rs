use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::capture::AudioCapture;
use super::endpoint::{Calibrator, Endpointer};
use super::recognizer::Recognizer;
use super::{DeviceError, RecognitionResult, SpeechSource};
use crate::config::{AudioConfig, CalibrationMode, SpeechConfig};
use crate::settings::{Sensitivity, MAX_SENSITIVITY, MIN_SENSITIVITY};

const CHUNK_QUEUE: usize = 64;
/// Wall-clock slack on top of the phrase limit before a stalled stream is cut.
const PHRASE_SLACK: Duration = Duration::from_secs(1);

/// Speech source backed by the default microphone and a [`Recognizer`].
pub struct MicrophoneSource<R> {
    sample_rate: u32,
    channels: u16,
    calibration: CalibrationMode,
    calibration_time: Duration,
    pause_ms: u64,
    phrase_limit: Duration,
    sensitivity: Sensitivity,
    recognizer: R,
    capture: Option<AudioCapture>,
    audio_rx: Option<Receiver<Vec<f32>>>,
    threshold: f32,
    base_seen: u32,
    calibrated: bool,
}

impl<R: Recognizer> MicrophoneSource<R> {
    pub fn new(
        speech: &SpeechConfig,
        audio: &AudioConfig,
        sensitivity: Sensitivity,
        recognizer: R,
    ) -> Self {
        let base = sensitivity.get();
        Self {
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            calibration: speech.calibration,
            calibration_time: Duration::from_millis(speech.calibration_ms),
            pause_ms: speech.pause_ms,
            phrase_limit: Duration::from_secs(speech.phrase_limit_seconds.max(1)),
            sensitivity,
            recognizer,
            capture: None,
            audio_rx: None,
            threshold: base as f32,
            base_seen: base,
            calibrated: false,
        }
    }

    fn ensure_capture(&mut self) -> Result<(), DeviceError> {
        let healthy = self.capture.as_ref().is_some_and(|c| c.is_running() && !c.has_failed());
        if healthy {
            return Ok(());
        }

        self.release();
        let mut capture = AudioCapture::new(self.sample_rate, self.channels)?;
        let (audio_tx, audio_rx) = sync_channel(CHUNK_QUEUE);
        capture.start(audio_tx)?;
        self.capture = Some(capture);
        self.audio_rx = Some(audio_rx);
        Ok(())
    }

    fn next_chunk(&self, deadline: Instant) -> Result<Option<Vec<f32>>, DeviceError> {
        if self.capture.as_ref().is_some_and(|c| c.has_failed()) {
            return Err(DeviceError("audio stream reported an error".to_string()));
        }
        let audio_rx = self
            .audio_rx
            .as_ref()
            .ok_or_else(|| DeviceError("audio capture not started".to_string()))?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        match audio_rx.recv_timeout(remaining) {
            Ok(chunk) => Ok(Some(chunk)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(DeviceError("audio stream closed".to_string()))
            }
        }
    }

    fn drain_stale(&self) {
        if let Some(audio_rx) = self.audio_rx.as_ref() {
            let stale = audio_rx.try_iter().count();
            if stale > 0 {
                debug!("Discarded {} stale audio chunks", stale);
            }
        }
    }

    fn calibrate(&mut self) -> Result<(), DeviceError> {
        let base = self.sensitivity.get();
        let mut calibrator = Calibrator::new(base as f32, self.sample_rate);
        let deadline = Instant::now() + self.calibration_time;
        while let Some(chunk) = self.next_chunk(deadline)? {
            calibrator.feed(&chunk);
        }

        self.threshold = calibrator
            .threshold()
            .clamp(MIN_SENSITIVITY as f32, MAX_SENSITIVITY as f32);
        self.base_seen = base;
        self.calibrated = true;
        info!("Ambient calibration: threshold {} -> {:.1}", base, self.threshold);
        Ok(())
    }

    /// A sensitivity change from the control path overrides the calibrated
    /// value until the next calibration.
    fn effective_threshold(&mut self) -> f32 {
        let base = self.sensitivity.get();
        if base != self.base_seen {
            debug!("Sensitivity changed to {}", base);
            self.base_seen = base;
            self.threshold = base as f32;
        }
        self.threshold
    }
}

impl<R: Recognizer> SpeechSource for MicrophoneSource<R> {
    fn listen_once(&mut self, timeout: Duration) -> Result<RecognitionResult, DeviceError> {
        self.ensure_capture()?;
        self.drain_stale();

        if self.calibration == CalibrationMode::PerCall || !self.calibrated {
            self.calibrate()?;
        }

        let threshold = self.effective_threshold();
        let mut endpointer = Endpointer::new(
            threshold,
            self.sample_rate,
            self.pause_ms,
            self.phrase_limit.as_millis() as u64,
        );

        let wait_deadline = Instant::now() + timeout;
        let mut phrase_deadline: Option<Instant> = None;

        let utterance = loop {
            let deadline = phrase_deadline.unwrap_or(wait_deadline);
            match self.next_chunk(deadline)? {
                Some(chunk) => {
                    let complete = endpointer.process(&chunk);
                    if phrase_deadline.is_none() && (endpointer.has_speech() || complete.is_some()) {
                        phrase_deadline = Some(Instant::now() + self.phrase_limit + PHRASE_SLACK);
                    }
                    if let Some(utterance) = complete {
                        break utterance;
                    }
                }
                None => match endpointer.finish() {
                    Some(utterance) => break utterance,
                    None => return Ok(RecognitionResult::TimedOut),
                },
            }
        };

        debug!("Captured {} samples, recognizing", utterance.len());
        Ok(self.recognizer.recognize(&utterance, self.sample_rate))
    }

    fn release(&mut self) {
        self.audio_rx = None;
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        self.calibrated = false;
    }
}
