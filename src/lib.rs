//! Send one framed request over TCP and print the replies.
//!
//! A request is an opaque header followed by a big endian `u16` length and
//! the content. After sending, the client shuts down its write half and reads
//! replies until the server closes the connection.

pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod message;
pub mod receiver;
pub mod server;

pub use client::{exchange, Client, Exchange};
pub use config::{ReceiveMode, Settings, SettingsLayer};
pub use error::{Error, Result};
pub use frame::{Decoding, FrameBuffer, Reply};
pub use message::FramedMessage;
