use regex::Regex;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::io::Cursor;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

use super::RecognitionResult;

/// Turns one captured utterance into text.
pub trait Recognizer: Send {
    fn recognize(&mut self, samples: &[f32], sample_rate: u32) -> RecognitionResult;
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    text: String,
}

/// Client for a whisper.cpp-style `/inference` endpoint.
pub struct HttpRecognizer {
    endpoint: String,
    language: String,
    timeout: Duration,
    client: Option<Client>,
}

impl HttpRecognizer {
    pub fn new(endpoint: impl Into<String>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            language: language.into(),
            timeout,
            client: None,
        }
    }

    // Built on first use so the blocking client lives on the listen worker.
    fn client(&mut self) -> Result<&Client, reqwest::Error> {
        let client = match self.client.take() {
            Some(client) => client,
            None => Client::builder().timeout(self.timeout).build()?,
        };
        Ok(self.client.insert(client))
    }
}

impl Recognizer for HttpRecognizer {
    fn recognize(&mut self, samples: &[f32], sample_rate: u32) -> RecognitionResult {
        let wav = match encode_wav(samples, sample_rate) {
            Ok(wav) => wav,
            Err(e) => return RecognitionResult::ServiceError(format!("WAV encoding failed: {e}")),
        };

        let part = match Part::bytes(wav).file_name("speech.wav").mime_str("audio/wav") {
            Ok(part) => part,
            Err(e) => return RecognitionResult::ServiceError(e.to_string()),
        };
        let form = Form::new()
            .part("file", part)
            .text("response_format", "json")
            .text("language", self.language.clone());

        let endpoint = self.endpoint.clone();
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => return RecognitionResult::ServiceError(e.to_string()),
        };

        debug!("Posting {} samples to {}", samples.len(), endpoint);
        let response = match client.post(&endpoint).multipart(form).send() {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return RecognitionResult::TimedOut,
            Err(e) => return RecognitionResult::ServiceError(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return RecognitionResult::ServiceError(format!("recognizer returned HTTP {status}"));
        }

        match response.json::<InferenceResponse>() {
            Ok(body) => interpret(&body.text),
            Err(e) if e.is_timeout() => RecognitionResult::TimedOut,
            Err(e) => RecognitionResult::ServiceError(format!("malformed recognizer reply: {e}")),
        }
    }
}

pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Maps raw recognizer text to a result; nothing left after cleanup means the
/// audio was not understood.
pub fn interpret(raw: &str) -> RecognitionResult {
    let cleaned = clean_transcript(raw);
    if cleaned.is_empty() {
        RecognitionResult::Unintelligible
    } else {
        RecognitionResult::Transcript(cleaned)
    }
}

/// Lowercases, drops annotations such as `[BLANK_AUDIO]` or `(music)`,
/// strips punctuation and collapses stuttered repeats.
pub fn clean_transcript(text: &str) -> String {
    static ANNOTATIONS: OnceLock<Regex> = OnceLock::new();
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();

    let annotations = ANNOTATIONS
        .get_or_init(|| Regex::new(r"\[.*?\]|\{.*?\}|\(.*?\)").expect("valid annotation regex"));
    let punctuation =
        PUNCTUATION.get_or_init(|| Regex::new(r"[^\w\s'-]").expect("valid punctuation regex"));

    let text = annotations.replace_all(text, " ");
    let text = punctuation.replace_all(&text, " ").to_lowercase();

    let mut words: Vec<&str> = Vec::new();
    for word in text.split_whitespace() {
        if words.last() != Some(&word) {
            words.push(word);
        }
    }
    words.join(" ")
}
