//! Line-delimited JSON bridge between a Telegram bot and pipe-connected
//! consumers, with a Unix socket reply channel back into the adapter.

pub mod bot;
pub mod broker;
pub mod config;
pub mod diagnostics;
pub mod envelope;
pub mod error;
pub mod lines;
pub mod pipeline;
pub mod platform;
pub mod router;
pub mod socket;
pub mod translator;
