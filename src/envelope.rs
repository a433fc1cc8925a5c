//! Wire records exchanged between the bridge processes.
//!
//! Every record is one JSON value on one line. Unknown fields on platform
//! messages are kept in an `extra` side-map so pass-through stays lossless.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminant values carried in the `type` field.
pub mod kind {
    pub const TELEGRAM_IN: &str = "telegram_in";
    pub const TELEGRAM_OUT: &str = "telegram_out";
    pub const BOT_IN: &str = "telegram-bot-in";
    pub const BOT_OUT: &str = "telegram-bot-out";
    pub const LOG: &str = "log";
    pub const ERROR: &str = "error";

    /// Default bot channel name, `<channel>-in` / `<channel>-out`.
    pub const BOT_CHANNEL: &str = "telegram-bot";

    pub fn inbound_of(channel: &str) -> String {
        format!("{channel}-in")
    }

    pub fn outbound_of(channel: &str) -> String {
        format!("{channel}-out")
    }
}

/// Fresh collision-resistant request id (UUID v4).
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current UTC time in the same shape the envelopes carry.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub request: String,
    pub timestamp: String,
}

/// Canonical envelope: `{ type, header: { request, timestamp }, body }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<B = Value> {
    #[serde(rename = "type")]
    pub kind: String,
    pub header: Header,
    pub body: B,
}

/// A message produced by the chat platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_type: Value,
    pub timestamp: String,
    pub source: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A message addressed to the chat platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub message_type: Value,
    pub timestamp: String,
    pub target: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSender {
    #[serde(rename = "chatId")]
    pub chat_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameText {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameBody {
    pub from: FrameSender,
    pub message: FrameText,
}

/// Reply-channel frame shared by the adapter and the responder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub body: FrameBody,
}

impl BridgeFrame {
    /// Frame announcing a platform message on `<channel>-in`.
    pub fn inbound(channel: &str, chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            kind: kind::inbound_of(channel),
            body: FrameBody {
                from: FrameSender { chat_id },
                message: FrameText { text: text.into() },
            },
        }
    }

    pub fn chat_id(&self) -> i64 {
        self.body.from.chat_id
    }

    pub fn text(&self) -> &str {
        &self.body.message.text
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogHeader {
    pub request: String,
    pub program: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogBody {
    pub level: String,
    pub message: String,
}

/// Diagnostic record written to stderr.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub header: LogHeader,
    pub body: LogBody,
}

impl LogRecord {
    pub fn new(program: &str, level: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind::LOG.to_string(),
            header: LogHeader {
                request: new_request_id(),
                program: program.to_string(),
                timestamp: now_timestamp(),
            },
            body: LogBody {
                level: level.to_string(),
                message: message.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Fatal startup error: `{ "type": "error", "body": { "error": ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub body: ErrorBody,
}

impl ErrorFrame {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            kind: kind::ERROR.to_string(),
            body: ErrorBody {
                error: error.into(),
            },
        }
    }
}
