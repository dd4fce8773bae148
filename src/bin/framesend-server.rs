use std::{
    net::{SocketAddr, TcpListener},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use framesend::server::{self, ServerOptions};
use log::info;

/// Answer framed requests one connection at a time
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8089", env = "FRAMESEND_BIND")]
    bind: SocketAddr,

    /// Length of the request header in bytes
    #[arg(long, default_value_t = 4)]
    header_len: usize,

    /// Header of successful replies, exactly 4 bytes
    #[arg(long, default_value = "R_OK")]
    reply_header: String,

    /// Drop a connection after this many idle milliseconds, 0 waits forever
    #[arg(long, default_value_t = 5000, env = "FRAMESEND_SERVER_READ_TIMEOUT_MS")]
    read_timeout_ms: u64,
}

impl Args {
    fn options(&self) -> Result<ServerOptions> {
        let options = ServerOptions {
            header_len: self.header_len,
            reply_header: self.reply_header.clone().into_bytes(),
            read_timeout: (self.read_timeout_ms > 0)
                .then(|| Duration::from_millis(self.read_timeout_ms)),
        };
        options
            .validate()
            .with_context(|| format!("Invalid --reply-header {:?}", self.reply_header))?;
        Ok(options)
    }
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let options = args.options()?;

    let listener =
        TcpListener::bind(args.bind).with_context(|| format!("Failed to bind {}", args.bind))?;
    info!("Listening on {}", listener.local_addr()?);

    server::serve(&listener, &options)
}
