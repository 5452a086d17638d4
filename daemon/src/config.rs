use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DaemonConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_listen_on_startup")]
    pub listen_on_startup: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            listen_on_startup: default_listen_on_startup(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    match dirs::runtime_dir() {
        Some(runtime_dir) => runtime_dir.join("notevoxd.sock"),
        None => PathBuf::from("/tmp/notevoxd.sock"),
    }
}

fn default_listen_on_startup() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMode {
    #[default]
    Session,
    PerCall,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SpeechConfig {
    #[serde(default = "default_energy_threshold")]
    pub energy_threshold: i64,
    #[serde(default)]
    pub calibration: CalibrationMode,
    #[serde(default = "default_calibration_ms")]
    pub calibration_ms: u64,
    #[serde(default = "default_listen_timeout")]
    pub listen_timeout_seconds: u64,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    #[serde(default = "default_phrase_limit")]
    pub phrase_limit_seconds: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            energy_threshold: default_energy_threshold(),
            calibration: CalibrationMode::default(),
            calibration_ms: default_calibration_ms(),
            listen_timeout_seconds: default_listen_timeout(),
            pause_ms: default_pause_ms(),
            phrase_limit_seconds: default_phrase_limit(),
        }
    }
}

impl SpeechConfig {
    /// Per-call capture bound. A zero value is raised to one second: the loop
    /// relies on every capture returning.
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_secs(self.listen_timeout_seconds.max(1))
    }
}

fn default_energy_threshold() -> i64 {
    150
}
fn default_calibration_ms() -> u64 {
    2000
}
fn default_listen_timeout() -> u64 {
    2
}
fn default_pause_ms() -> u64 {
    800
}
fn default_phrase_limit() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

fn default_sample_rate() -> u32 {
    16000
}
fn default_channels() -> u16 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RecognizerConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            language: default_language(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080/inference".to_string()
}
fn default_language() -> String {
    "en".to_string()
}
fn default_request_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EditorConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_process_name")]
    pub process_name: String,
    #[serde(default = "default_save_command")]
    pub save_command: Vec<String>,
    #[serde(default = "default_launch_settle_ms")]
    pub launch_settle_ms: u64,
    #[serde(default = "default_save_settle_ms")]
    pub save_settle_ms: u64,
    #[serde(default = "default_exit_poll_ms")]
    pub exit_poll_ms: u64,
    #[serde(default = "default_exit_timeout")]
    pub exit_timeout_seconds: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            process_name: default_process_name(),
            save_command: default_save_command(),
            launch_settle_ms: default_launch_settle_ms(),
            save_settle_ms: default_save_settle_ms(),
            exit_poll_ms: default_exit_poll_ms(),
            exit_timeout_seconds: default_exit_timeout(),
        }
    }
}

fn default_program() -> String {
    "gedit".to_string()
}
fn default_process_name() -> String {
    "gedit".to_string()
}
fn default_save_command() -> Vec<String> {
    ["wtype", "-M", "ctrl", "s", "-m", "ctrl"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_launch_settle_ms() -> u64 {
    2000
}
fn default_save_settle_ms() -> u64 {
    1000
}
fn default_exit_poll_ms() -> u64 {
    1000
}
fn default_exit_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PathsConfig {
    #[serde(default = "default_vocabulary_file")]
    pub vocabulary_file: PathBuf,
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            vocabulary_file: default_vocabulary_file(),
            settings_file: default_settings_file(),
        }
    }
}

fn default_vocabulary_file() -> PathBuf {
    config_dir().join("commands.json")
}
fn default_settings_file() -> PathBuf {
    config_dir().join("settings.json")
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "default_commands_per_second")]
    pub commands_per_second: u32,
    #[serde(default = "default_burst_capacity")]
    pub burst_capacity: u32,
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            commands_per_second: default_commands_per_second(),
            burst_capacity: default_burst_capacity(),
            enabled: default_rate_limit_enabled(),
        }
    }
}

fn default_commands_per_second() -> u32 {
    10
}
fn default_burst_capacity() -> u32 {
    20
}
fn default_rate_limit_enabled() -> bool {
    true
}

pub fn load_config() -> Result<Config> {
    let config_path = config_dir().join("config.toml");

    if !config_path.exists() {
        tracing::info!("Config file not found at {:?}, using defaults", config_path);
        return Ok(Config::default());
    }

    tracing::info!("Loading config from {:?}", config_path);
    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;

    tracing::info!("Config loaded successfully");
    Ok(config)
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notevox")
}
