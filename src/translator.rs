use crate::envelope::{kind, new_request_id, Envelope, Header, InboundMessage};

/// Wrap a platform message into a `telegram_in` envelope.
///
/// The timestamp is copied from the message; only the request id is new.
pub fn to_envelope(msg: InboundMessage) -> Envelope<InboundMessage> {
    Envelope {
        kind: kind::TELEGRAM_IN.to_string(),
        header: Header {
            request: new_request_id(),
            timestamp: msg.timestamp.clone(),
        },
        body: msg,
    }
}

/// Unwrap the body of a `telegram_out` envelope.
///
/// `None` means "not for us": the caller skips the message, it is not an error.
pub fn from_envelope<B>(msg: Envelope<B>) -> Option<B> {
    if msg.kind != kind::TELEGRAM_OUT {
        return None;
    }
    Some(msg.body)
}
