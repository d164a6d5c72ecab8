//! Update-polling and framing engine for a Telegram bot.
//!
//! This crate is transport-agnostic. The TLS socket lives behind the
//! `Connector` / `TransportStream` ports (implemented in `tgpoll-tls`), the
//! bot's behavior behind `MessageHandler`.

pub mod config;
pub mod connectivity;
pub mod domain;
pub mod errors;
pub mod framing;
pub mod handlers;
pub mod logging;
pub mod messaging;
pub mod offset;
pub mod poll;
pub mod ports;
pub mod reply;
pub mod request;
pub mod security;
pub mod updates;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
