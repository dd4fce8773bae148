//! Outgoing request framing.
//!
//! ```text
//! ┌──────────────────┬────────────┬─────────────────┐
//! │ Header           │ Length     │ Content         │
//! │ caller-defined   │ 2 bytes    │ Length bytes    │
//! │                  │ uint16 BE  │                 │
//! └──────────────────┴────────────┴─────────────────┘
//! ```

use std::io::{self, Read};

use crate::error::{Error, Result};
use crate::receiver::is_timeout;

/// Size of the content length field.
pub const LENGTH_FIELD_LEN: usize = 2;

/// Largest content the length field can describe.
pub const MAX_CONTENT_LEN: usize = u16::MAX as usize;

/// A request: opaque header, then length-prefixed content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramedMessage {
    header: Vec<u8>,
    content: Vec<u8>,
}

impl FramedMessage {
    /// Build a message, rejecting content the length field cannot describe.
    pub fn new(header: impl Into<Vec<u8>>, content: impl Into<Vec<u8>>) -> Result<Self> {
        let content = content.into();
        if content.len() > MAX_CONTENT_LEN {
            return Err(Error::ContentTooLarge { len: content.len() });
        }
        Ok(Self {
            header: header.into(),
            content,
        })
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Value written to the length field. Always equals `content().len()`.
    pub fn content_length(&self) -> u16 {
        self.content.len() as u16
    }

    pub fn encoded_len(&self) -> usize {
        self.header.len() + LENGTH_FIELD_LEN + self.content.len()
    }

    /// Serialize into one contiguous buffer, ready for a single write.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&self.header);
        buf.extend_from_slice(&self.content_length().to_be_bytes());
        buf.extend_from_slice(&self.content);
        buf
    }

    /// Read one message whose header is exactly `header_len` bytes.
    ///
    /// Returns `Ok(None)` if the stream ends before the first byte, and
    /// [`Error::TruncatedFrame`] if it ends anywhere after that.
    pub fn read_from<R: Read>(reader: &mut R, header_len: usize) -> Result<Option<Self>> {
        let mut prefix = vec![0; header_len + LENGTH_FIELD_LEN];
        let got = read_full(reader, &mut prefix)?;
        if got == 0 {
            return Ok(None);
        }
        if got < prefix.len() {
            return Err(Error::TruncatedFrame { buffered: got });
        }

        let len = u16::from_be_bytes([prefix[header_len], prefix[header_len + 1]]) as usize;
        prefix.truncate(header_len);

        let mut content = vec![0; len];
        let got = read_full(reader, &mut content)?;
        if got < len {
            return Err(Error::TruncatedFrame {
                buffered: header_len + LENGTH_FIELD_LEN + got,
            });
        }

        Ok(Some(Self {
            header: prefix,
            content,
        }))
    }
}

/// The length field a 16 bit wrapping encoder would have produced for `len`.
///
/// Lengths above [`MAX_CONTENT_LEN`] wrap modulo 65536, which is why
/// [`FramedMessage::new`] refuses them.
pub fn wrapped_length(len: usize) -> u16 {
    (len % (MAX_CONTENT_LEN + 1)) as u16
}

/// Like `read_exact`, but reports how far it got instead of failing on EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_timeout(&e) => return Err(Error::ReadTimeout),
            Err(e) => return Err(Error::Receive(e)),
        }
    }
    Ok(filled)
}
