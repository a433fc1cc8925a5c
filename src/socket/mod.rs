//! Private reply channel into the long-running adapter.
//!
//! One listener owns a filesystem Unix socket; short-lived responders connect,
//! write exactly one serialized [`BridgeFrame`](crate::envelope::BridgeFrame)
//! and disconnect. Connections are served strictly one at a time, so a burst
//! of replies queues in the kernel accept backlog.

pub mod client;
pub mod listener;

pub use client::ReplyClient;
pub use listener::{remove_stale_socket, SocketListener};
