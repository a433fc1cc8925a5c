//! Per-line routing decisions for the pipe processes.
//!
//! The router only decides; [`Pipeline`](crate::pipeline::Pipeline) performs
//! the resulting I/O. Strict roles drop what they cannot parse, the responder
//! role echoes it.

use serde::Deserialize;
use serde_json::Value;

use crate::envelope::{kind, Envelope, InboundMessage, OutboundMessage};
use crate::error::BridgeError;
use crate::translator::{from_envelope, to_envelope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Platform messages in, `telegram_in` envelopes out.
    Inbound,
    /// Envelopes in, platform messages out for `telegram_out` only.
    Outbound,
    /// `<channel>-in` frames are flipped to `<channel>-out` and replied.
    Responder { channel: String },
}

#[derive(Debug)]
pub enum Routed {
    /// Translated record for the forward path.
    Forward(String),
    /// Flipped frame: echoed and delivered through the reply socket.
    Reply(String),
    /// The input line, unchanged. `diagnostic` is set when the line could not
    /// be parsed at all.
    PassThrough {
        line: String,
        diagnostic: Option<String>,
    },
    /// Nothing to emit.
    Skip,
    /// Unparseable input for a strict role; logged and dropped.
    Reject(BridgeError),
}

#[derive(Debug, Clone)]
pub struct Router {
    role: Role,
    reply_from: String,
    reply_to: String,
}

impl Router {
    pub fn new(role: Role) -> Self {
        let (reply_from, reply_to) = match &role {
            Role::Responder { channel } => (kind::inbound_of(channel), kind::outbound_of(channel)),
            _ => (String::new(), String::new()),
        };
        Self {
            role,
            reply_from,
            reply_to,
        }
    }

    pub fn responder(channel: &str) -> Self {
        Self::new(Role::Responder {
            channel: channel.to_string(),
        })
    }

    pub fn route(&self, line: &str) -> Routed {
        match self.role {
            Role::Inbound => strict(line, translate_inbound),
            Role::Outbound => strict(line, translate_outbound),
            Role::Responder { .. } => self.respond(line),
        }
    }

    fn respond(&self, line: &str) -> Routed {
        let mut value: Value = match serde_json::from_str(line.trim()) {
            Ok(value) => value,
            Err(e) => {
                return Routed::PassThrough {
                    line: line.to_string(),
                    diagnostic: Some(format!("unparseable line passed through: {e}")),
                }
            }
        };

        let has_text = value
            .pointer("/body/message/text")
            .and_then(Value::as_str)
            .is_some_and(|text| !text.is_empty());
        let is_request = value.get("type").and_then(Value::as_str) == Some(self.reply_from.as_str());
        if !has_text || !is_request {
            return pass_through(line);
        }

        let Some(object) = value.as_object_mut() else {
            return pass_through(line);
        };
        object.insert("type".to_string(), Value::String(self.reply_to.clone()));

        match serde_json::to_string(&value) {
            Ok(reply) => Routed::Reply(reply),
            Err(e) => Routed::PassThrough {
                line: line.to_string(),
                diagnostic: Some(e.to_string()),
            },
        }
    }
}

fn pass_through(line: &str) -> Routed {
    Routed::PassThrough {
        line: line.to_string(),
        diagnostic: None,
    }
}

/// Blank lines are skipped; translation errors reject the line.
fn strict(line: &str, translate: fn(&str) -> Result<Option<String>, BridgeError>) -> Routed {
    let line = line.trim();
    if line.is_empty() {
        return Routed::Skip;
    }
    match translate(line) {
        Ok(Some(record)) => Routed::Forward(record),
        Ok(None) => Routed::Skip,
        Err(e) => Routed::Reject(e),
    }
}

fn translate_inbound(line: &str) -> Result<Option<String>, BridgeError> {
    let msg: InboundMessage = serde_json::from_str(line)?;
    Ok(Some(serde_json::to_string(&to_envelope(msg))?))
}

fn translate_outbound(line: &str) -> Result<Option<String>, BridgeError> {
    let envelope: Envelope = serde_json::from_str(line)?;
    let Some(body) = from_envelope(envelope) else {
        return Ok(None);
    };
    // Validate the shape, but emit the body exactly as received.
    OutboundMessage::deserialize(&body)?;
    Ok(Some(serde_json::to_string(&body)?))
}
