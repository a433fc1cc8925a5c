use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::envelope::BridgeFrame;
use crate::error::{BridgeError, Result};
use crate::platform::ChatClient;

/// Pause after a failed accept so a persistent error (EMFILE) cannot spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Delete whatever is left at `path` from a previous listener.
///
/// A missing file is fine; any other failure is fatal to startup.
pub fn remove_stale_socket(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed stale socket {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
        Err(source) => Err(BridgeError::SocketCleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Listener role of the reply socket.
pub struct SocketListener {
    listener: UnixListener,
    socket_path: PathBuf,
    max_frame_bytes: usize,
    reply_kind: String,
}

impl SocketListener {
    /// Clean up the path and bind. Frames whose `type` differs from
    /// `reply_kind` are read and ignored.
    pub fn bind(
        socket_path: impl Into<PathBuf>,
        max_frame_bytes: usize,
        reply_kind: impl Into<String>,
    ) -> Result<Self> {
        let socket_path = socket_path.into();
        remove_stale_socket(&socket_path)?;

        let listener =
            UnixListener::bind(&socket_path).map_err(|source| BridgeError::SocketBind {
                path: socket_path.clone(),
                source,
            })?;

        Ok(Self {
            listener,
            socket_path,
            max_frame_bytes,
            reply_kind: reply_kind.into(),
        })
    }

    /// Accept and fully handle one connection at a time, forever.
    ///
    /// Per-connection failures are logged and the loop moves on.
    pub async fn serve(&self, client: &dyn ChatClient) -> Result<()> {
        info!("Reply socket listening on {}", self.socket_path.display());
        loop {
            let (stream, _addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    accept_failed(e).await;
                    continue;
                }
            };

            match self.handle_connection(stream, client).await {
                Ok(Some(frame)) => debug!("Forwarded reply to chat {}", frame.chat_id()),
                Ok(None) => {}
                Err(e) => error!("Failed to handle reply connection: {}", e),
            }
        }
    }

    /// Read one frame and forward it if it is a reply.
    ///
    /// Returns the forwarded frame, or `None` when the connection carried
    /// nothing or a frame of another type.
    pub async fn handle_connection(
        &self,
        stream: UnixStream,
        client: &dyn ChatClient,
    ) -> Result<Option<BridgeFrame>> {
        let payload = read_frame(stream, self.max_frame_bytes).await?;
        let text = String::from_utf8_lossy(&payload);
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let frame: BridgeFrame = serde_json::from_str(text)?;
        if frame.kind != self.reply_kind {
            debug!("Ignoring frame of type {:?}", frame.kind);
            return Ok(None);
        }

        client.send_text(frame.chat_id(), frame.text()).await?;
        Ok(Some(frame))
    }
}

async fn accept_failed(e: std::io::Error) {
    warn!("Reply socket accept failed: {}", e);
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

/// Read until the peer closes, refusing anything over `limit` bytes.
async fn read_frame(stream: UnixStream, limit: usize) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    stream
        .take(u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1))
        .read_to_end(&mut payload)
        .await?;
    if payload.len() > limit {
        return Err(BridgeError::FrameTooLarge { limit });
    }
    Ok(payload)
}
