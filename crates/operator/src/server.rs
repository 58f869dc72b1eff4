use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::protocol::{OverrideHandler, Request, Response};

/// Hard cap on one request line. Anything longer is rejected without
/// reading further.
pub const MAX_REQUEST_BYTES: usize = 4_096;

/// A connection that sends nothing within this window is dropped.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Concurrent connection ceiling; the socket is an operator tool, not an API.
pub const MAX_CONNECTIONS: usize = 8;

#[derive(Debug)]
pub enum OperatorError {
    Io(std::io::Error),
    Serialize(String),
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Serialize(msg) => write!(f, "serialize error: {}", msg),
        }
    }
}

impl std::error::Error for OperatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OperatorError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

pub type OperatorResult<T> = std::result::Result<T, OperatorError>;

/// Line-delimited JSON server on a mode-0600 Unix socket. One request per
/// connection; the response is written and the connection closed.
pub struct OperatorServer {
    listener: UnixListener,
    socket_path: PathBuf,
    handler: Arc<dyn OverrideHandler>,
    connections: Arc<Semaphore>,
}

impl OperatorServer {
    pub fn bind(socket_path: &Path, handler: Arc<dyn OverrideHandler>) -> OperatorResult<Self> {
        // A leftover socket from an unclean shutdown blocks bind.
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }
        if let Some(parent) = socket_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let listener = UnixListener::bind(socket_path)?;

        // Operator-only: no group or world access.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!(socket = %socket_path.display(), "operator socket listening");

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            handler,
            connections: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept loop; runs until the task is cancelled or the listener fails.
    pub async fn serve(self) -> OperatorResult<()> {
        loop {
            let (stream, _addr) = self.listener.accept().await?;

            let Ok(permit) = Arc::clone(&self.connections).try_acquire_owned() else {
                // Over the ceiling; close immediately instead of queueing.
                warn!("operator connection rejected, too many concurrent connections");
                drop(stream);
                continue;
            };

            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(err) = handle_connection(stream, handler).await {
                    debug!(error = %err, "operator connection error");
                }
            });
        }
    }
}

impl Drop for OperatorServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn handle_connection(
    stream: UnixStream,
    handler: Arc<dyn OverrideHandler>,
) -> OperatorResult<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half).take((MAX_REQUEST_BYTES + 1) as u64);

    let mut line = String::new();
    let response = match tokio::time::timeout(REQUEST_TIMEOUT, reader.read_line(&mut line)).await {
        Err(_) => Response::failure("request timed out"),
        Ok(Err(err)) => Response::failure(format!("read error: {}", err)),
        Ok(Ok(0)) => Response::failure("empty request"),
        Ok(Ok(n)) if n > MAX_REQUEST_BYTES => Response::failure("request too large"),
        Ok(Ok(_)) => match serde_json::from_str::<Request>(line.trim()) {
            Ok(request) => handler.handle(request),
            Err(err) => Response::failure(format!("malformed request: {}", err)),
        },
    };

    let mut payload = serde_json::to_vec(&response)
        .map_err(|err| OperatorError::Serialize(err.to_string()))?;
    payload.push(b'\n');
    write_half.write_all(&payload).await?;
    write_half.shutdown().await?;
    Ok(())
}
