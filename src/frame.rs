//! Incoming reply framing.
//!
//! Replies use a fixed 4 byte header:
//! ```text
//! ┌──────────┬────────────┬─────────────────┐
//! │ Header   │ Length     │ Content         │
//! │ 4 bytes  │ 2 bytes    │ Length bytes    │
//! │          │ uint16 BE  │                 │
//! └──────────┴────────────┴─────────────────┘
//! ```
//!
//! TCP has no message boundaries, so [`FrameBuffer`] accumulates reads and
//! only hands out complete frames. [`Reply::from_chunk`] keeps the older
//! interpretation, where every read is assumed to hold exactly one reply.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::message::{LENGTH_FIELD_LEN, MAX_CONTENT_LEN};

/// Reply header size in bytes.
pub const REPLY_HEADER_LEN: usize = 4;

/// Header plus length field.
pub const REPLY_PREFIX_LEN: usize = REPLY_HEADER_LEN + LENGTH_FIELD_LEN;

/// How reply bytes are turned into text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Decoding {
    /// Invalid UTF-8 is an [`Error::Decode`].
    #[default]
    Strict,
    /// Invalid sequences become U+FFFD.
    Lossy,
}

/// One reply from the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub header: Bytes,
    pub content: Bytes,
}

impl Reply {
    pub fn new(header: impl Into<Bytes>, content: impl Into<Bytes>) -> Self {
        Self {
            header: header.into(),
            content: content.into(),
        }
    }

    /// Interpret a single read as a reply: bytes `0..4` are the header,
    /// `4..6` are skipped, the rest is content.
    pub fn from_chunk(chunk: &[u8]) -> Self {
        let header_end = chunk.len().min(REPLY_HEADER_LEN);
        let content = chunk.get(REPLY_PREFIX_LEN..).unwrap_or_default();
        Self {
            header: Bytes::copy_from_slice(&chunk[..header_end]),
            content: Bytes::copy_from_slice(content),
        }
    }

    /// Header followed by content, as text.
    pub fn text(&self, decoding: Decoding) -> Result<String> {
        let mut raw = Vec::with_capacity(self.header.len() + self.content.len());
        raw.extend_from_slice(&self.header);
        raw.extend_from_slice(&self.content);
        match decoding {
            Decoding::Strict => String::from_utf8(raw).map_err(|e| Error::Decode(e.utf8_error())),
            Decoding::Lossy => Ok(String::from_utf8_lossy(&raw).into_owned()),
        }
    }

    /// Serialize as a reply frame. The header must be exactly 4 bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.header.len() != REPLY_HEADER_LEN {
            return Err(Error::ReplyHeaderLength {
                len: self.header.len(),
            });
        }
        if self.content.len() > MAX_CONTENT_LEN {
            return Err(Error::ContentTooLarge {
                len: self.content.len(),
            });
        }

        let mut buf = Vec::with_capacity(REPLY_PREFIX_LEN + self.content.len());
        buf.extend_from_slice(&self.header);
        buf.extend_from_slice(&(self.content.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.content);
        Ok(buf)
    }
}

#[derive(Debug, Clone)]
enum State {
    /// Need the 6 byte prefix.
    WaitingForPrefix,
    /// Prefix parsed, need `remaining` content bytes.
    WaitingForContent { header: Bytes, remaining: usize },
}

/// Accumulates reads and extracts complete reply frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::with_capacity(4 * 1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: State::WaitingForPrefix,
        }
    }

    /// Append `data` and return every frame it completes, in order.
    pub fn push(&mut self, data: &[u8]) -> Vec<Reply> {
        self.buffer.extend_from_slice(data);

        let mut replies = Vec::new();
        while let Some(reply) = self.try_extract_one() {
            replies.push(reply);
        }
        replies
    }

    fn try_extract_one(&mut self) -> Option<Reply> {
        match &self.state {
            State::WaitingForPrefix => {
                if self.buffer.len() < REPLY_PREFIX_LEN {
                    return None;
                }
                let header = self.buffer.split_to(REPLY_HEADER_LEN).freeze();
                let remaining = self.buffer.get_u16() as usize;
                self.state = State::WaitingForContent { header, remaining };
                self.try_extract_one()
            }
            State::WaitingForContent { header, remaining } => {
                if self.buffer.len() < *remaining {
                    return None;
                }
                let header = header.clone();
                let content = self.buffer.split_to(*remaining).freeze();
                self.state = State::WaitingForPrefix;
                Some(Reply { header, content })
            }
        }
    }

    /// Bytes belonging to a frame that has not completed yet.
    pub fn pending(&self) -> usize {
        match &self.state {
            State::WaitingForPrefix => self.buffer.len(),
            State::WaitingForContent { header, .. } => {
                header.len() + LENGTH_FIELD_LEN + self.buffer.len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Called once the peer has closed. Fails if a frame was left half read.
    pub fn finish(&self) -> Result<()> {
        match self.pending() {
            0 => Ok(()),
            buffered => Err(Error::TruncatedFrame { buffered }),
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
