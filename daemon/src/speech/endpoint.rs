use std::collections::VecDeque;
use tracing::debug;

/// Damping applied per second of ambient audio during calibration.
const CALIBRATION_DAMPING: f32 = 0.15;
/// Calibrated threshold sits this far above the ambient energy.
const CALIBRATION_RATIO: f32 = 1.5;
/// Audio kept from before speech onset so the first syllable is not clipped.
const PRE_ROLL_MS: u64 = 500;

/// RMS energy of a chunk, in 16-bit sample units.
pub fn energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_square: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_square.sqrt() * i16::MAX as f32
}

/// Moves an energy threshold towards the ambient noise level.
#[derive(Debug, Clone)]
pub struct Calibrator {
    threshold: f32,
    sample_rate: u32,
}

impl Calibrator {
    pub fn new(threshold: f32, sample_rate: u32) -> Self {
        Self {
            threshold,
            sample_rate,
        }
    }

    pub fn feed(&mut self, chunk: &[f32]) {
        if chunk.is_empty() {
            return;
        }
        let seconds = chunk.len() as f32 / self.sample_rate as f32;
        let damping = CALIBRATION_DAMPING.powf(seconds);
        let target = energy(chunk) * CALIBRATION_RATIO;
        self.threshold = self.threshold * damping + target * (1.0 - damping);
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeechState {
    Idle,
    Speaking,
    SilenceDetected,
}

/// Splits a chunk stream into one utterance: speech onset above the energy
/// threshold, ending after a run of silence or when the phrase limit is hit.
pub struct Endpointer {
    state: SpeechState,
    threshold: f32,
    pause_samples: usize,
    max_samples: usize,
    pre_roll_samples: usize,
    pre_roll: VecDeque<f32>,
    speech_buffer: Vec<f32>,
    silence_samples: usize,
}

impl Endpointer {
    pub fn new(threshold: f32, sample_rate: u32, pause_ms: u64, phrase_limit_ms: u64) -> Self {
        let samples_for = |ms: u64| (sample_rate as u64 * ms / 1000) as usize;
        Self {
            state: SpeechState::Idle,
            threshold,
            pause_samples: samples_for(pause_ms).max(1),
            max_samples: samples_for(phrase_limit_ms).max(1),
            pre_roll_samples: samples_for(PRE_ROLL_MS),
            pre_roll: VecDeque::new(),
            speech_buffer: Vec::new(),
            silence_samples: 0,
        }
    }

    pub fn state(&self) -> SpeechState {
        self.state
    }

    pub fn has_speech(&self) -> bool {
        self.state != SpeechState::Idle
    }

    /// Feeds one chunk; returns the utterance once it is complete.
    pub fn process(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        let is_speech = energy(samples) > self.threshold;

        match self.state {
            SpeechState::Idle => {
                if is_speech {
                    debug!("Speech onset, threshold {:.1}", self.threshold);
                    self.state = SpeechState::Speaking;
                    self.speech_buffer.extend(self.pre_roll.drain(..));
                    self.speech_buffer.extend_from_slice(samples);
                } else {
                    self.pre_roll.extend(samples.iter().copied());
                    let excess = self.pre_roll.len().saturating_sub(self.pre_roll_samples);
                    self.pre_roll.drain(..excess);
                }
            }
            SpeechState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);
                if !is_speech {
                    self.state = SpeechState::SilenceDetected;
                    self.silence_samples = samples.len();
                }
            }
            SpeechState::SilenceDetected => {
                self.speech_buffer.extend_from_slice(samples);
                if is_speech {
                    self.state = SpeechState::Speaking;
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += samples.len();
                }
            }
        }

        let paused =
            self.state == SpeechState::SilenceDetected && self.silence_samples >= self.pause_samples;
        if paused || self.speech_buffer.len() >= self.max_samples {
            return self.finish();
        }
        None
    }

    /// Returns whatever speech has been collected and resets to idle.
    pub fn finish(&mut self) -> Option<Vec<f32>> {
        let speech = std::mem::take(&mut self.speech_buffer);
        self.state = SpeechState::Idle;
        self.silence_samples = 0;
        self.pre_roll.clear();
        if speech.is_empty() {
            None
        } else {
            debug!("Utterance complete: {} samples", speech.len());
            Some(speech)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16000;

    fn tone(amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    #[test]
    fn test_energy_units() {
        assert_eq!(energy(&[]), 0.0);
        let e = energy(&tone(0.01, 100));
        assert!((e - 327.67).abs() < 0.1);
    }

    #[test]
    fn test_calibration_moves_towards_ambient() {
        let mut calibrator = Calibrator::new(300.0, RATE);
        // ambient energy ~32.8, target ~49
        for _ in 0..20 {
            calibrator.feed(&tone(0.001, 1600));
        }
        assert!(calibrator.threshold() < 100.0);
        assert!(calibrator.threshold() > 49.0);
    }

    #[test]
    fn test_silence_only_never_completes() {
        let mut endpointer = Endpointer::new(150.0, RATE, 800, 15_000);
        for _ in 0..50 {
            assert!(endpointer.process(&tone(0.0001, 1600)).is_none());
        }
        assert_eq!(endpointer.state(), SpeechState::Idle);
        assert!(endpointer.finish().is_none());
    }

    #[test]
    fn test_utterance_ends_after_pause() {
        let mut endpointer = Endpointer::new(150.0, RATE, 800, 15_000);
        assert!(endpointer.process(&tone(0.0001, 1600)).is_none());
        for _ in 0..5 {
            assert!(endpointer.process(&tone(0.1, 1600)).is_none());
        }
        assert_eq!(endpointer.state(), SpeechState::Speaking);

        let mut result = None;
        for _ in 0..8 {
            result = endpointer.process(&tone(0.0001, 1600));
            if result.is_some() {
                break;
            }
        }
        let speech = result.expect("utterance should end after 800ms of silence");
        // pre-roll + 5 speech chunks + 8 silent chunks
        assert_eq!(speech.len(), 1600 + 5 * 1600 + 8 * 1600);
        assert_eq!(endpointer.state(), SpeechState::Idle);
    }

    #[test]
    fn test_false_alarm_keeps_speaking() {
        let mut endpointer = Endpointer::new(150.0, RATE, 800, 15_000);
        endpointer.process(&tone(0.1, 1600));
        endpointer.process(&tone(0.0001, 1600));
        assert_eq!(endpointer.state(), SpeechState::SilenceDetected);
        endpointer.process(&tone(0.1, 1600));
        assert_eq!(endpointer.state(), SpeechState::Speaking);
    }

    #[test]
    fn test_phrase_limit_cuts_long_speech() {
        let mut endpointer = Endpointer::new(150.0, RATE, 800, 1_000);
        let mut result = None;
        for _ in 0..20 {
            result = endpointer.process(&tone(0.1, 1600));
            if result.is_some() {
                break;
            }
        }
        assert_eq!(result.unwrap().len(), 16000);
    }
}
