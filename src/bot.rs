use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::envelope::{kind, BridgeFrame};
use crate::platform::telegram::TelegramClient;
use crate::socket::SocketListener;

/// Where the dispatcher drops incoming messages.
#[derive(Clone)]
struct Inbox {
    frames: mpsc::Sender<BridgeFrame>,
    channel: Arc<str>,
}

/// Run the Telegram adapter until interrupted.
///
/// Incoming text messages become `<channel>-in` frames on stdout, written in
/// arrival order by a single writer. Replies come back through the socket
/// listener, which runs alongside in the same runtime.
pub async fn run(config: &Config) -> Result<()> {
    let bot = Bot::new(config.api_key()?);

    let listener = SocketListener::bind(
        &config.socket.path,
        config.socket.max_frame_bytes,
        kind::outbound_of(&config.bridge.channel),
    )?;
    let client = TelegramClient::new(bot.clone());

    let (frames, rx) = mpsc::channel(config.bridge.channel_capacity);
    let inbox = Inbox {
        frames,
        channel: Arc::from(config.bridge.channel.as_str()),
    };

    info!("Starting Telegram bot...");

    let allowed_users = config.telegram.allowed_user_ids.clone();
    let handler = Update::filter_message()
        .filter_map(move |msg: Message| {
            if allowed_users.is_empty() {
                return Some(msg);
            }
            let user = msg.from.as_ref()?;
            if allowed_users.contains(&user.id.0) {
                Some(msg)
            } else {
                None
            }
        })
        .endpoint(handle_message);

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![inbox])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build();

    tokio::select! {
        _ = dispatcher.dispatch() => info!("Telegram dispatcher stopped"),
        result = write_frames(rx, tokio::io::stdout()) => result?,
        result = listener.serve(&client) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    Ok(())
}

async fn handle_message(msg: Message, inbox: Inbox) -> ResponseResult<()> {
    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    info!("Message from chat {}", msg.chat.id.0);

    let frame = BridgeFrame::inbound(&inbox.channel, msg.chat.id.0, text);
    if inbox.frames.send(frame).await.is_err() {
        warn!("Frame writer stopped, dropping message from chat {}", msg.chat.id.0);
    }
    Ok(())
}

/// Drain the queue to `out`, one JSON line per frame, until every sender is gone.
pub async fn write_frames<W: AsyncWrite + Unpin>(
    mut frames: mpsc::Receiver<BridgeFrame>,
    mut out: W,
) -> crate::error::Result<()> {
    while let Some(frame) = frames.recv().await {
        let mut line = serde_json::to_vec(&frame)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        out.flush().await?;
    }
    Ok(())
}
