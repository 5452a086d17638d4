pub mod classify;
pub mod config;
pub mod executor;
pub mod listen;
mod lock;
pub mod log;
pub mod output;
mod persist;
pub mod rate_limit;
pub mod server;
pub mod session;
pub mod settings;
pub mod speech;
pub mod state;
pub mod vocabulary;

pub use classify::{classify, ClassifiedCommand};
pub use executor::{ActionError, ActionExecutor, ActionRequest, Outcome};
pub use listen::{ListenEngine, ListenLoop, LoopPhase};
pub use log::{LogBook, LogSink};
pub use output::{AppError, DesktopEditor, TargetApp};
pub use rate_limit::ControlRateLimiter;
pub use session::{LastAction, SessionState};
pub use speech::{DeviceError, MicrophoneSource, RecognitionResult, SpeechSource};
pub use vocabulary::{Action, Vocabulary, VocabularyError, VocabularyStore};
