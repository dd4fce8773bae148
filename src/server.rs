//! A sequential reply server speaking the same framing, for exercising the
//! client by hand and in tests.
//!
//! Every reply is a length-prefixed frame, so the client's default framed
//! mode reads it. Nodes that answer with a bare `header || content` need the
//! client's chunks mode instead.

use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    time::Duration,
};

use log::{info, warn};

use crate::error::{Error, Result};
use crate::frame::{Reply, REPLY_HEADER_LEN};
use crate::message::FramedMessage;

/// Header sent back when a request cannot be parsed.
pub const REJECT_HEADER: &[u8] = b"R_NO";

/// Header sent back with the echoed content by default.
pub const ACCEPT_HEADER: &[u8] = b"R_OK";

/// How long a connection may sit idle before the server gives up on it.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct ServerOptions {
    /// Length of the request header
    pub header_len: usize,
    /// Header of successful replies, exactly 4 bytes
    pub reply_header: Vec<u8>,
    /// Per-connection read timeout. `None` waits forever.
    pub read_timeout: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            header_len: 4,
            reply_header: ACCEPT_HEADER.to_vec(),
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
        }
    }
}

impl ServerOptions {
    pub fn validate(&self) -> Result<()> {
        if self.reply_header.len() != REPLY_HEADER_LEN {
            return Err(Error::ReplyHeaderLength {
                len: self.reply_header.len(),
            });
        }
        if self.read_timeout == Some(Duration::ZERO) {
            return Err(Error::Config("read timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Read one request from `stream` and answer it.
///
/// Returns the request, or `None` if the peer sent nothing at all.
pub fn handle_connection<S: Read + Write>(
    stream: &mut S,
    options: &ServerOptions,
) -> Result<Option<FramedMessage>> {
    let request = match FramedMessage::read_from(stream, options.header_len) {
        Ok(Some(request)) => request,
        Ok(None) => return Ok(None),
        Err(e @ Error::TruncatedFrame { .. }) => {
            let reply = Reply::new(REJECT_HEADER, &b""[..]).encode()?;
            stream.write_all(&reply).map_err(Error::Send)?;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let reply = Reply::new(options.reply_header.clone(), request.content().to_vec());
    stream.write_all(&reply.encode()?).map_err(Error::Send)?;
    stream.flush().map_err(Error::Send)?;
    Ok(Some(request))
}

/// Accept connections one at a time, forever.
///
/// Failed accepts and errors on a single connection are logged and do not
/// stop the loop. A peer that stays silent is dropped once
/// [`ServerOptions::read_timeout`] elapses.
pub fn serve(listener: &TcpListener, options: &ServerOptions) -> ! {
    loop {
        match listener.accept() {
            Ok((mut stream, addr)) => serve_one(&mut stream, addr, options),
            Err(e) => warn!("Accept failed: {}", e),
        }
    }
}

fn serve_one(stream: &mut TcpStream, addr: SocketAddr, options: &ServerOptions) {
    info!("{} Connected", addr);
    if let Err(e) = stream.set_read_timeout(options.read_timeout) {
        warn!("{}: failed to set read timeout: {}", addr, e);
        return;
    }
    match handle_connection(stream, options) {
        Ok(Some(request)) => info!(
            "{} sent {:?} with {} bytes of content",
            addr,
            String::from_utf8_lossy(request.header()),
            request.content().len()
        ),
        Ok(None) => info!("{} Disconnected without a request", addr),
        Err(Error::ReadTimeout) => warn!("{}: idle for too long, dropping", addr),
        Err(e) => warn!("{}: {}", addr, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reads from a fixed input, records writes.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Duplex {
        fn new(input: &[u8]) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn echoes_content_with_ok_header() {
        let mut stream = Duplex::new(b"/get\x00\x02{}");
        let request = handle_connection(&mut stream, &ServerOptions::default())
            .unwrap()
            .unwrap();

        assert_eq!(request.header(), b"/get");
        assert_eq!(stream.output, b"R_OK\x00\x02{}".to_vec());
    }

    #[test]
    fn custom_header_length_and_reply() {
        let options = ServerOptions {
            header_len: 6,
            reply_header: b"PONG".to_vec(),
            ..ServerOptions::default()
        };
        let mut stream = Duplex::new(b"ABCD12\x00\x05hello");
        handle_connection(&mut stream, &options).unwrap();

        assert_eq!(stream.output, b"PONG\x00\x05hello".to_vec());
    }

    #[test]
    fn truncated_request_is_rejected() {
        let mut stream = Duplex::new(b"PING\x00\x09abc");
        let err = handle_connection(&mut stream, &ServerOptions::default()).unwrap_err();

        assert!(matches!(err, Error::TruncatedFrame { .. }));
        assert_eq!(stream.output, b"R_NO\x00\x00".to_vec());
    }

    #[test]
    fn silent_peer_gets_nothing() {
        let mut stream = Duplex::new(b"");
        assert!(handle_connection(&mut stream, &ServerOptions::default())
            .unwrap()
            .is_none());
        assert!(stream.output.is_empty());
    }

    #[test]
    fn reply_header_must_be_four_bytes() {
        assert!(ServerOptions::default().validate().is_ok());

        let options = ServerOptions {
            reply_header: b"HELLO".to_vec(),
            ..ServerOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(Error::ReplyHeaderLength { len: 5 })
        ));

        // An unchecked header is never cut to fit
        let mut stream = Duplex::new(b"PING\x00\x01x");
        assert!(handle_connection(&mut stream, &options).is_err());
        assert!(stream.output.is_empty());
    }

    #[test]
    fn zero_read_timeout_is_rejected() {
        let options = ServerOptions {
            read_timeout: Some(Duration::ZERO),
            ..ServerOptions::default()
        };
        assert!(matches!(options.validate(), Err(Error::Config(_))));
    }
}
