use shared::ipc::{CommandPhrases, StatusInfo};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::config::Config;
use crate::executor::ActionExecutor;
use crate::listen::{ListenEngine, ListenLoop};
use crate::lock::lock_or_recover;
use crate::log::{LogBook, LogSink};
use crate::output::TargetApp;
use crate::session::SessionState;
use crate::settings::{NotesDir, Sensitivity, Settings, SettingsError};
use crate::speech::SpeechSource;
use crate::vocabulary::{Vocabulary, VocabularyError, VocabularyStore};

/// Everything the control path can reach. The listen loop owns the speech
/// source and the executor; the rest is shared through handles.
pub struct DaemonState {
    pub config: Config,
    listen: ListenLoop,
    vocabulary: Arc<VocabularyStore>,
    session: Arc<Mutex<SessionState>>,
    sensitivity: Sensitivity,
    notes_dir: NotesDir,
    settings: Settings,
    log: Arc<LogBook>,
}

impl DaemonState {
    /// Loads the persisted records named in `config.paths` and wires the
    /// collaborators into a stopped listen loop. `make_source` receives the
    /// live sensitivity handle.
    pub fn new<F>(config: Config, log: Arc<LogBook>, make_source: F, app: Box<dyn TargetApp>) -> Self
    where
        F: FnOnce(Sensitivity) -> Box<dyn SpeechSource>,
    {
        let sink: Arc<dyn LogSink> = log.clone();

        let mut settings = Settings::load(&config.paths.settings_file, log.as_ref());
        if !config.paths.settings_file.exists() {
            settings.energy_threshold = config.speech.energy_threshold;
        }
        let sensitivity = Sensitivity::new(settings.energy_threshold);
        let notes_dir = NotesDir::new(settings.notes_dir());

        let vocabulary = Arc::new(VocabularyStore::load(
            config.paths.vocabulary_file.clone(),
            log.as_ref(),
        ));

        let executor = ActionExecutor::new(app, notes_dir.clone(), Arc::clone(&sink));
        let session = executor.session();
        let engine = ListenEngine::new(
            make_source(sensitivity.clone()),
            executor,
            Arc::clone(&vocabulary),
            config.speech.listen_timeout(),
        );

        Self {
            listen: ListenLoop::new(engine, sink),
            config,
            vocabulary,
            session,
            sensitivity,
            notes_dir,
            settings,
            log,
        }
    }

    pub fn start_listening(&mut self) -> anyhow::Result<()> {
        if self.listen.start()? {
            self.log.emit("Listening started.");
        }
        Ok(())
    }

    pub fn stop_listening(&mut self) {
        if self.listen.stop() {
            self.log.emit("Listening stopped.");
        }
    }

    pub fn toggle_listening(&mut self) -> anyhow::Result<()> {
        if self.listen.is_listening() {
            self.stop_listening();
            Ok(())
        } else {
            self.start_listening()
        }
    }

    /// Stops the loop and waits for the worker; used on daemon exit.
    pub fn shutdown(&mut self) {
        self.stop_listening();
        self.listen.stop_and_wait();
    }

    pub fn get_status(&self) -> StatusInfo {
        let session = lock_or_recover(&self.session, "session").clone();
        StatusInfo {
            is_listening: self.listen.is_listening(),
            phase: self.listen.phase().to_string(),
            document_open: session.is_open(),
            current_file: session
                .current_file()
                .map(|path| path.display().to_string()),
            last_action: session.last_action().to_string(),
            sensitivity: self.sensitivity.get(),
            notes_dir: self.notes_dir.get().display().to_string(),
            fault: self.listen.fault().map(|e| e.to_string()),
        }
    }

    pub fn logs(&self) -> Vec<String> {
        self.log.entries()
    }

    pub fn commands(&self) -> CommandPhrases {
        self.vocabulary.resolve().to_phrases()
    }

    pub fn set_commands(&mut self, phrases: &CommandPhrases) -> Result<CommandPhrases, VocabularyError> {
        let result = self.vocabulary.update(phrases);
        self.report_vocabulary(result, "Commands updated.")
    }

    pub fn reset_commands(&mut self) -> Result<CommandPhrases, VocabularyError> {
        let result = self.vocabulary.reset();
        self.report_vocabulary(result, "Commands reset to defaults.")
    }

    fn report_vocabulary(
        &self,
        result: Result<Vocabulary, VocabularyError>,
        success: &str,
    ) -> Result<CommandPhrases, VocabularyError> {
        match result {
            Ok(vocabulary) => {
                self.log.emit(success);
                Ok(vocabulary.to_phrases())
            }
            Err(e) => {
                self.log.emit(&format!("Failed to save commands: {}", e));
                Err(e)
            }
        }
    }

    /// Applies immediately; the value is clamped, never rejected.
    pub fn set_sensitivity(&mut self, value: i64) -> u32 {
        let applied = self.sensitivity.set(value);
        self.settings.energy_threshold = applied as i64;
        self.persist_settings();
        self.log.emit(&format!("Sensitivity set to {}.", applied));
        applied
    }

    pub fn set_notes_dir(&mut self, path: impl Into<PathBuf>) -> Result<PathBuf, SettingsError> {
        let path = path.into();
        if !path.is_dir() {
            return Err(SettingsError::NotADirectory(path));
        }
        self.notes_dir.set(path.clone());
        self.settings.notes_folder = Some(path.clone());
        self.persist_settings();
        self.log.emit(&format!("Notes folder set to {}.", path.display()));
        Ok(path)
    }

    pub fn reset_settings(&mut self) {
        self.settings = Settings::default();
        self.sensitivity.set(self.settings.energy_threshold);
        self.notes_dir.set(self.settings.notes_dir());
        self.persist_settings();
        self.log.emit("Settings reset to defaults.");
    }

    /// The live value stays authoritative when the record cannot be written.
    fn persist_settings(&self) {
        let path = &self.config.paths.settings_file;
        if let Err(e) = self.settings.save(path) {
            warn!("Could not write settings to {:?}: {}", path, e);
            self.log.emit(&e.to_string());
        } else {
            info!("Settings saved to {:?}", path);
        }
    }
}
