use std::{
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::{debug, info};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::frame::Reply;
use crate::message::FramedMessage;
use crate::receiver::{BufferedReceiver, ReadState};

/// One connection to the server. The socket is closed when this is dropped,
/// whichever way the exchange ends.
pub struct Client {
    tcp_stream: TcpStream,
    peer: SocketAddr,
}

impl Client {
    /// Connect to the first address `host` resolves to that accepts.
    pub fn connect(host: &str, port: u16, settings: &Settings) -> Result<Self> {
        let target = format!("{}:{}", host, port);
        let addrs = (host, port).to_socket_addrs().map_err(|source| Error::Connect {
            addr: target.clone(),
            source,
        })?;

        let mut last_err = None;
        for addr in addrs {
            let attempt = match settings.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(tcp_stream) => {
                    tcp_stream
                        .set_read_timeout(settings.read_timeout)
                        .map_err(Error::Receive)?;
                    info!("Connected to {}", addr);
                    return Ok(Self {
                        tcp_stream,
                        peer: addr,
                    });
                }
                Err(e) => {
                    debug!("Connecting to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(Error::Connect {
            addr: target,
            source: last_err.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
            }),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Write the whole message in one logical write. Returns the bytes sent.
    pub fn send(&mut self, msg: &FramedMessage) -> Result<usize> {
        let buf = msg.encode();
        self.tcp_stream.write_all(&buf).map_err(Error::Send)?;
        self.tcp_stream.flush().map_err(Error::Send)?;
        debug!("Sent {} bytes to {}", buf.len(), self.peer);
        Ok(buf.len())
    }

    /// Shut down the write half after an optional settle delay. Reading stays
    /// open.
    pub fn finish_sending(&mut self, settle: Duration) -> Result<()> {
        if !settle.is_zero() {
            debug!("Waiting {:?} before half-close", settle);
            std::thread::sleep(settle);
        }
        self.tcp_stream
            .shutdown(Shutdown::Write)
            .map_err(Error::Send)
    }

    /// Read until the peer closes, handing every reply to `on_reply`.
    /// Returns the number of bytes read.
    pub fn receive<F>(&mut self, settings: &Settings, mut on_reply: F) -> Result<usize>
    where
        F: FnMut(Reply) -> Result<()>,
    {
        let mut receiver = BufferedReceiver::new(settings.mode, settings.chunk_size);
        while let ReadState::Replies(replies) = receiver.read(&mut self.tcp_stream)? {
            for reply in replies {
                on_reply(reply)?;
            }
        }
        debug!("{} closed the connection", self.peer);
        receiver.finish()?;
        Ok(receiver.received())
    }
}

/// Totals for one request/reply exchange.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Exchange {
    pub bytes_sent: usize,
    pub bytes_received: usize,
    pub replies: usize,
}

/// Send `msg` to `host:port`, half-close, and write every reply to `out` as
/// one line of text.
pub fn exchange<W: Write>(
    host: &str,
    port: u16,
    msg: &FramedMessage,
    settings: &Settings,
    out: &mut W,
) -> Result<Exchange> {
    let mut client = Client::connect(host, port, settings)?;

    let bytes_sent = client.send(msg)?;
    client.finish_sending(settings.settle)?;

    let mut replies = 0;
    let bytes_received = client.receive(settings, |reply| {
        let text = reply.text(settings.decoding)?;
        writeln!(out, "{}", text).map_err(Error::Output)?;
        replies += 1;
        Ok(())
    })?;
    out.flush().map_err(Error::Output)?;

    Ok(Exchange {
        bytes_sent,
        bytes_received,
        replies,
    })
}
