use shared::ipc::{Command, Response};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::rate_limit::ControlRateLimiter;
use crate::state::DaemonState;

/// Largest request accepted from a client.
const MAX_REQUEST_BYTES: u64 = 64 * 1024;

pub struct DaemonServer {
    socket_path: PathBuf,
    state: Arc<Mutex<DaemonState>>,
    rate_limiter: Arc<ControlRateLimiter>,
}

impl DaemonServer {
    pub fn new(
        socket_path: PathBuf,
        state: Arc<Mutex<DaemonState>>,
        rate_limiter: ControlRateLimiter,
    ) -> Self {
        Self {
            socket_path,
            state,
            rate_limiter: Arc::new(rate_limiter),
        }
    }

    pub fn bind(&self) -> anyhow::Result<UnixListener> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Starting socket server at {}", self.socket_path.display());
        Ok(UnixListener::bind(&self.socket_path)?)
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: UnixListener) -> anyhow::Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("Connection accepted");
                    let state = Arc::clone(&self.state);
                    let rate_limiter = Arc::clone(&self.rate_limiter);
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(state, rate_limiter, stream).await
                        {
                            error!("Error handling connection: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(
        state: Arc<Mutex<DaemonState>>,
        rate_limiter: Arc<ControlRateLimiter>,
        mut stream: UnixStream,
    ) -> anyhow::Result<()> {
        let mut buffer = Vec::new();
        (&mut stream)
            .take(MAX_REQUEST_BYTES)
            .read_to_end(&mut buffer)
            .await?;

        if buffer.is_empty() {
            return Ok(());
        }

        let response = match serde_json::from_slice::<Command>(&buffer) {
            Ok(command) if !rate_limiter.check() => {
                warn!("Rate limited: {:?}", command);
                Response::Error("Too many commands, slow down".to_string())
            }
            Ok(command) => {
                info!("Received command: {:?}", command);
                let mut state = state.lock().await;
                Self::dispatch(&mut state, command)
            }
            Err(e) => Response::Error(format!("Malformed command: {}", e)),
        };

        let response_json = serde_json::to_vec(&response)?;
        stream.write_all(&response_json).await?;
        stream.shutdown().await?;

        debug!("Sent response: {:?}", response);
        Ok(())
    }

    fn dispatch(state: &mut DaemonState, command: Command) -> Response {
        match command {
            Command::Start => match state.start_listening() {
                Ok(()) => Response::Ok,
                Err(e) => Response::Error(format!("Failed to start listening: {}", e)),
            },
            Command::Stop => {
                state.stop_listening();
                Response::Ok
            }
            Command::Toggle => match state.toggle_listening() {
                Ok(()) => Response::Ok,
                Err(e) => Response::Error(format!("Failed to start listening: {}", e)),
            },
            Command::Status => Response::Status(state.get_status()),
            Command::Logs => Response::Logs(state.logs()),
            Command::GetCommands => Response::Commands(state.commands()),
            Command::SetCommands(phrases) => match state.set_commands(&phrases) {
                Ok(phrases) => Response::Commands(phrases),
                Err(e) => Response::Error(e.to_string()),
            },
            Command::ResetCommands => match state.reset_commands() {
                Ok(phrases) => Response::Commands(phrases),
                Err(e) => Response::Error(e.to_string()),
            },
            Command::SetSensitivity(value) => {
                state.set_sensitivity(value);
                Response::Status(state.get_status())
            }
            Command::SetNotesDir(path) => match state.set_notes_dir(path) {
                Ok(_) => Response::Status(state.get_status()),
                Err(e) => Response::Error(e.to_string()),
            },
            Command::ResetSettings => {
                state.reset_settings();
                Response::Status(state.get_status())
            }
        }
    }
}

impl Drop for DaemonServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}
