use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::broker::MessageLog;
use crate::error::Result;
use crate::lines::{LineDecoder, LineReader};
use crate::router::{Routed, Router};
use crate::socket::ReplyClient;

/// Forward path into the distributed log.
struct Publisher {
    log: Arc<dyn MessageLog>,
    topic: String,
}

/// Drives lines through a [`Router`] and performs the resulting I/O.
///
/// Per-line failures are logged and the loop continues; only a failed write
/// to `output` ends it, since nobody is reading any more.
pub struct Pipeline<W> {
    router: Router,
    output: W,
    publisher: Option<Publisher>,
    reply: Option<ReplyClient>,
}

impl<W: AsyncWrite + Unpin> Pipeline<W> {
    pub fn new(router: Router, output: W) -> Self {
        Self {
            router,
            output,
            publisher: None,
            reply: None,
        }
    }

    /// Send forwarded records to `topic` instead of `output`.
    pub fn with_publisher(mut self, log: Arc<dyn MessageLog>, topic: impl Into<String>) -> Self {
        self.publisher = Some(Publisher {
            log,
            topic: topic.into(),
        });
        self
    }

    /// Also deliver replies through the reply socket.
    pub fn with_reply_client(mut self, client: ReplyClient) -> Self {
        self.reply = Some(client);
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Process every line of `input` until end of stream.
    pub async fn run<R: AsyncRead + Unpin>(&mut self, input: R) -> Result<()> {
        let lines = LineReader::new(input).into_stream();
        tokio::pin!(lines);
        while let Some(line) = lines.next().await {
            self.handle_line(&line?).await?;
        }
        debug!("Input closed");
        Ok(())
    }

    /// Process messages consumed from a log subscription until it closes.
    pub async fn run_messages(&mut self, mut messages: mpsc::Receiver<Vec<u8>>) -> Result<()> {
        while let Some(payload) = messages.recv().await {
            let mut decoder = LineDecoder::new();
            let mut lines = decoder.push(&payload);
            lines.extend(decoder.finish());
            for line in lines {
                self.handle_line(&line).await?;
            }
        }
        debug!("Subscription closed");
        Ok(())
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<()> {
        match self.router.route(line) {
            Routed::Forward(record) => self.forward(record).await?,
            Routed::Reply(record) => {
                self.emit(&record).await?;
                self.deliver_reply(&record).await;
            }
            Routed::PassThrough { line, diagnostic } => {
                if let Some(diagnostic) = diagnostic {
                    warn!("{}", diagnostic);
                }
                self.emit(&line).await?;
            }
            Routed::Skip => {}
            Routed::Reject(e) => error!("{}", e),
        }
        Ok(())
    }

    async fn forward(&mut self, record: String) -> Result<()> {
        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.log.publish(&publisher.topic, record.into_bytes()).await {
                error!("Failed to publish to {}: {}", publisher.topic, e);
            }
            return Ok(());
        }
        self.emit(&record).await
    }

    async fn deliver_reply(&self, record: &str) {
        let Some(client) = &self.reply else {
            return;
        };
        let payload = format!("{record}\n");
        if let Err(e) = client.deliver(payload.as_bytes()).await {
            error!("{}", e);
        }
    }

    async fn emit(&mut self, line: &str) -> Result<()> {
        self.output.write_all(line.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(())
    }
}
