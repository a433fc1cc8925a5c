use std::path::PathBuf;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{BridgeError, Result};

/// Client role of the reply socket.
///
/// Delivery is best effort: `Ok(())` means the whole payload was written and
/// the connection closed, never that the listener processed it. No
/// acknowledgment is read and nothing is retried.
#[derive(Debug, Clone)]
pub struct ReplyClient {
    socket_path: PathBuf,
}

impl ReplyClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Open a fresh connection, write `payload` once, close.
    pub async fn deliver(&self, payload: &[u8]) -> Result<()> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| BridgeError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;
        stream.write_all(payload).await?;
        // Half-close so the listener sees end-of-stream.
        stream.shutdown().await?;
        debug!(
            "Wrote {} byte reply to {}",
            payload.len(),
            self.socket_path.display()
        );
        Ok(())
    }
}
