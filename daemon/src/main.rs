use anyhow::Result;
use notevoxd::config::load_config;
use notevoxd::log::LogBook;
use notevoxd::output::DesktopEditor;
use notevoxd::rate_limit::ControlRateLimiter;
use notevoxd::server::DaemonServer;
use notevoxd::speech::{HttpRecognizer, MicrophoneSource, SpeechSource};
use notevoxd::state::DaemonState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    info!("notevox daemon (notevoxd) starting...");

    let config = load_config()?;
    let log = Arc::new(LogBook::new());

    let speech = config.speech.clone();
    let audio = config.audio.clone();
    let recognizer = HttpRecognizer::new(
        config.recognizer.endpoint.clone(),
        config.recognizer.language.clone(),
        Duration::from_secs(config.recognizer.request_timeout_seconds.max(1)),
    );
    let editor = DesktopEditor::new(&config.editor);

    let mut daemon_state = DaemonState::new(
        config.clone(),
        log,
        move |sensitivity| -> Box<dyn SpeechSource> {
            Box::new(MicrophoneSource::new(&speech, &audio, sensitivity, recognizer))
        },
        Box::new(editor),
    );
    if config.daemon.listen_on_startup {
        daemon_state.start_listening()?;
    }
    let state = Arc::new(Mutex::new(daemon_state));

    let server = DaemonServer::new(
        config.daemon.socket_path.clone(),
        Arc::clone(&state),
        ControlRateLimiter::from_config(&config.rate_limit),
    );

    tokio::select! {
        result = server.run() => {
            if let Err(e) = &result {
                error!("Socket server failed: {}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    let mut state = state.lock().await;
    tokio::task::block_in_place(|| state.shutdown());
    info!("notevoxd stopped");
    Ok(())
}
