pub mod telegram;

use async_trait::async_trait;

use crate::error::Result;

/// Outbound half of a chat platform, as seen by the reply listener.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Deliver `text` to the chat identified by `chat_id`.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;
}
