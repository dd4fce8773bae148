use std::io::{self, Read};

use crate::config::ReceiveMode;
use crate::error::{Error, Result};
use crate::frame::{FrameBuffer, Reply};

/// Outcome of one read on the connection.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadState {
    /// Replies completed by this read (possibly none).
    Replies(Vec<Reply>),
    /// The peer closed its side.
    Disconnected,
}

/// Reads the reply stream in fixed size chunks and turns it into replies.
pub struct BufferedReceiver {
    mode: ReceiveMode,
    frames: FrameBuffer,
    chunk: Vec<u8>,
    received: usize,
}

impl BufferedReceiver {
    pub fn new(mode: ReceiveMode, chunk_size: usize) -> Self {
        Self {
            mode,
            frames: FrameBuffer::new(),
            chunk: vec![0; chunk_size],
            received: 0,
        }
    }

    /// Perform one read of at most `chunk_size` bytes.
    pub fn read<R: Read>(&mut self, reader: &mut R) -> Result<ReadState> {
        let n = loop {
            match reader.read(&mut self.chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(&e) => return Err(Error::ReadTimeout),
                Err(e) => return Err(Error::Receive(e)),
            }
        };

        if n == 0 {
            return Ok(ReadState::Disconnected);
        }
        self.received += n;
        log::trace!("Read {} bytes", n);

        let data = &self.chunk[..n];
        Ok(ReadState::Replies(match self.mode {
            ReceiveMode::Framed => self.frames.push(data),
            ReceiveMode::Chunks => vec![Reply::from_chunk(data)],
        }))
    }

    /// Total bytes read so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Check that nothing was left half read once the peer has closed.
    pub fn finish(&self) -> Result<()> {
        self.frames.finish()
    }
}

// Read timeouts surface as WouldBlock on unix and TimedOut on windows
pub(crate) fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Hands out one scripted read result per call.
    struct Script(VecDeque<io::Result<Vec<u8>>>);

    impl Script {
        fn new(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            Self(reads.into())
        }
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(data)) => {
                    assert!(data.len() <= buf.len());
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    fn drain(receiver: &mut BufferedReceiver, script: &mut Script) -> Result<Vec<Reply>> {
        let mut all = Vec::new();
        loop {
            match receiver.read(script)? {
                ReadState::Replies(replies) => all.extend(replies),
                ReadState::Disconnected => break,
            }
        }
        receiver.finish()?;
        Ok(all)
    }

    #[test]
    fn framed_reassembles_split_reads() {
        let mut script = Script::new(vec![
            Ok(b"R_O".to_vec()),
            Ok(b"K\x00\x05hel".to_vec()),
            Ok(b"loPONG\x00\x00".to_vec()),
        ]);
        let mut receiver = BufferedReceiver::new(ReceiveMode::Framed, 1024);

        let replies = drain(&mut receiver, &mut script).unwrap();
        assert_eq!(
            replies,
            vec![
                Reply::new(&b"R_OK"[..], &b"hello"[..]),
                Reply::new(&b"PONG"[..], &b""[..]),
            ]
        );
        assert_eq!(receiver.received(), 17);
    }

    #[test]
    fn chunks_mode_one_reply_per_read() {
        let mut script = Script::new(vec![Ok(b"XXXXYYdata".to_vec()), Ok(b"ABCD..ef".to_vec())]);
        let mut receiver = BufferedReceiver::new(ReceiveMode::Chunks, 1024);

        let replies = drain(&mut receiver, &mut script).unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(&replies[0].content[..], b"data");
        assert_eq!(&replies[1].header[..], b"ABCD");
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let mut script = Script::new(vec![
            Err(io::ErrorKind::Interrupted.into()),
            Ok(b"R_NO\x00\x00".to_vec()),
        ]);
        let mut receiver = BufferedReceiver::new(ReceiveMode::Framed, 1024);

        let replies = drain(&mut receiver, &mut script).unwrap();
        assert_eq!(replies.len(), 1);
    }

    #[test]
    fn timeout_is_its_own_error() {
        let mut script = Script::new(vec![Err(io::ErrorKind::WouldBlock.into())]);
        let mut receiver = BufferedReceiver::new(ReceiveMode::Framed, 1024);

        assert!(matches!(receiver.read(&mut script), Err(Error::ReadTimeout)));
    }

    #[test]
    fn reset_is_a_receive_error() {
        let mut script = Script::new(vec![Err(io::ErrorKind::ConnectionReset.into())]);
        let mut receiver = BufferedReceiver::new(ReceiveMode::Framed, 1024);

        assert!(matches!(receiver.read(&mut script), Err(Error::Receive(_))));
    }

    #[test]
    fn close_mid_frame_is_truncation() {
        let mut script = Script::new(vec![Ok(b"R_OK\x00\x05he".to_vec())]);
        let mut receiver = BufferedReceiver::new(ReceiveMode::Framed, 1024);

        let err = drain(&mut receiver, &mut script).unwrap_err();
        assert!(matches!(err, Error::TruncatedFrame { buffered: 8 }));
    }

    #[test]
    fn chunk_size_bounds_each_read() {
        let mut receiver = BufferedReceiver::new(ReceiveMode::Chunks, 4);
        let mut input: &[u8] = b"ABCDEFGH";

        let mut headers = Vec::new();
        while let ReadState::Replies(replies) = receiver.read(&mut input).unwrap() {
            headers.extend(replies.into_iter().map(|r| r.header));
        }
        assert_eq!(headers, vec![&b"ABCD"[..], &b"EFGH"[..]]);
    }
}
