use shared::ipc::{Command, IpcError, Response};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::{timeout, Duration};
use tracing::warn;

/// Timeout for each socket operation. Settings writes and stopping the loop
/// return immediately, so this only trips when the daemon is wedged.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

/// Same default as the daemon's `[daemon] socket_path`.
pub fn default_socket_path() -> PathBuf {
    match dirs::runtime_dir() {
        Some(runtime_dir) => runtime_dir.join("notevoxd.sock"),
        None => PathBuf::from("/tmp/notevoxd.sock"),
    }
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new(socket_path: Option<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.unwrap_or_else(default_socket_path),
        }
    }

    pub async fn send_command(&self, cmd: Command) -> Result<Response, IpcError> {
        let mut stream = match timeout(SOCKET_TIMEOUT, UnixStream::connect(&self.socket_path)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
                ) =>
            {
                return Err(IpcError::ConnectionRefused);
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(
                    "Connection timeout: no answer from {} within {:?}",
                    self.socket_path.display(),
                    SOCKET_TIMEOUT
                );
                return Err(IpcError::Timeout);
            }
        };

        let command_json = serde_json::to_vec(&cmd)?;

        // the daemon reads until end of stream, so close our half after writing
        let write = async {
            stream.write_all(&command_json).await?;
            stream.shutdown().await
        };
        match timeout(SOCKET_TIMEOUT, write).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Write timeout: could not send command within {:?}", SOCKET_TIMEOUT);
                return Err(IpcError::Timeout);
            }
        }

        let mut buffer = Vec::new();
        match timeout(SOCKET_TIMEOUT, stream.read_to_end(&mut buffer)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Read timeout: no response within {:?}", SOCKET_TIMEOUT);
                return Err(IpcError::Timeout);
            }
        };

        Ok(serde_json::from_slice(&buffer)?)
    }
}
