use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::Decoding;

/// How the reply stream is cut into replies.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReceiveMode {
    /// Buffer reads and split on length-prefixed frame boundaries
    #[default]
    Framed,
    /// Treat every read as one reply, skipping bytes 4 and 5.
    ///
    /// Needed for nodes that answer with a bare `header || content` and no
    /// length field. In framed mode such a reply is misparsed: the first two
    /// content bytes are taken as a length, and a short reply like `PONG`
    /// ends as [`Error::TruncatedFrame`](crate::Error::TruncatedFrame).
    Chunks,
}

/// Transport and output settings for one exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub mode: ReceiveMode,
    /// Pause between sending and shutting down the write half
    pub settle: Duration,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    /// Read buffer size
    pub chunk_size: usize,
    pub decoding: Decoding,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: ReceiveMode::Framed,
            settle: Duration::ZERO,
            connect_timeout: None,
            read_timeout: None,
            chunk_size: 1024,
            decoding: Decoding::Strict,
        }
    }
}

/// A partial set of settings. Config files and the command line each produce
/// one, and they are applied over the defaults in that order.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsLayer {
    pub mode: Option<ReceiveMode>,
    pub settle_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub chunk_size: Option<usize>,
    pub lossy: Option<bool>,
}

impl SettingsLayer {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::parse(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }
}

impl Settings {
    /// Overwrite every field `layer` sets.
    pub fn apply(mut self, layer: &SettingsLayer) -> Self {
        if let Some(mode) = layer.mode {
            self.mode = mode;
        }
        if let Some(ms) = layer.settle_ms {
            self.settle = Duration::from_millis(ms);
        }
        if let Some(ms) = layer.connect_timeout_ms {
            self.connect_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = layer.read_timeout_ms {
            self.read_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(size) = layer.chunk_size {
            self.chunk_size = size;
        }
        if let Some(lossy) = layer.lossy {
            self.decoding = if lossy {
                Decoding::Lossy
            } else {
                Decoding::Strict
            };
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        // std rejects zero durations for both timeouts
        if self.connect_timeout == Some(Duration::ZERO) {
            return Err(Error::Config("connect_timeout_ms must be greater than zero".into()));
        }
        if self.read_timeout == Some(Duration::ZERO) {
            return Err(Error::Config("read_timeout_ms must be greater than zero".into()));
        }
        Ok(())
    }
}
