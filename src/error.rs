//! Error types for framesend.

use thiserror::Error;

/// Everything that can go wrong while sending a request or reading replies.
#[derive(Debug, Error)]
pub enum Error {
    /// No address accepted the connection (refused, unreachable, timed out, or
    /// the host name resolved to nothing).
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the request or shutting down the write half failed.
    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    /// Reading from the connection failed.
    #[error("receive failed: {0}")]
    Receive(#[source] std::io::Error),

    /// The configured read timeout elapsed with no data.
    #[error("timed out waiting for a reply")]
    ReadTimeout,

    /// The two byte length field cannot describe this much content.
    #[error("content is {len} bytes, the length field holds at most 65535")]
    ContentTooLarge { len: usize },

    /// The peer closed the connection in the middle of a frame.
    #[error("connection closed with {buffered} bytes of an incomplete frame buffered")]
    TruncatedFrame { buffered: usize },

    /// Reply frames carry exactly 4 header bytes.
    #[error("reply header is {len} bytes, it must be exactly 4")]
    ReplyHeaderLength { len: usize },

    /// Writing a reply to the output failed.
    #[error("failed to write reply: {0}")]
    Output(#[source] std::io::Error),

    /// A reply was not valid UTF-8.
    #[error("reply is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// Invalid setting or unreadable config file.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures to establish the connection, as opposed to failures
    /// on an open one.
    pub fn is_connect(&self) -> bool {
        matches!(self, Error::Connect { .. })
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
