use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use framesend::{FramedMessage, ReceiveMode, Settings, SettingsLayer};
use log::{debug, error};

/// Send one framed request over TCP and print the replies
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Host to connect to
    hostname: String,

    /// Port to connect to
    port: u16,

    /// Request header, sent verbatim
    header: String,

    /// Request content, sent after its 2 byte big endian length
    content: String,

    /// TOML file with transport settings
    #[arg(long, env = "FRAMESEND_CONFIG")]
    config: Option<PathBuf>,

    /// How replies are cut out of the stream
    #[arg(long, value_enum, env = "FRAMESEND_MODE")]
    mode: Option<ReceiveMode>,

    /// Milliseconds to wait between sending and half-closing
    #[arg(long, env = "FRAMESEND_SETTLE_MS")]
    settle_ms: Option<u64>,

    #[arg(long, env = "FRAMESEND_CONNECT_TIMEOUT_MS")]
    connect_timeout_ms: Option<u64>,

    #[arg(long, env = "FRAMESEND_READ_TIMEOUT_MS")]
    read_timeout_ms: Option<u64>,

    /// Read buffer size in bytes
    #[arg(long, env = "FRAMESEND_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Replace invalid UTF-8 in replies instead of failing
    #[arg(long, env = "FRAMESEND_LOSSY", overrides_with = "no_lossy")]
    lossy: bool,

    /// Fail on invalid UTF-8, even if the config file asks for lossy output
    #[arg(long, overrides_with = "lossy")]
    no_lossy: bool,

    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn layer(&self) -> SettingsLayer {
        SettingsLayer {
            mode: self.mode,
            settle_ms: self.settle_ms,
            connect_timeout_ms: self.connect_timeout_ms,
            read_timeout_ms: self.read_timeout_ms,
            chunk_size: self.chunk_size,
            // Only an explicit flag overrides the config file
            lossy: match (self.lossy, self.no_lossy) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
        }
    }

    fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::default();
        if let Some(path) = &self.config {
            let file = SettingsLayer::load(path)?;
            settings = settings.apply(&file);
        }
        let settings = settings.apply(&self.layer());
        settings.validate()?;
        Ok(settings)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run(args: &Args) -> Result<()> {
    let settings = args.settings()?;
    debug!("{:?}", settings);

    let msg = FramedMessage::new(args.header.as_bytes(), args.content.as_bytes())?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let summary = framesend::exchange(&args.hostname, args.port, &msg, &settings, &mut out)
        .with_context(|| format!("Exchange with {}:{} failed", args.hostname, args.port))?;

    debug!(
        "Sent {} bytes, received {} bytes in {} replies",
        summary.bytes_sent, summary.bytes_received, summary.replies
    );
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn four_positionals_are_required() {
        let err = Args::try_parse_from(["framesend", "localhost", "8089", "PING"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        assert!(Args::try_parse_from(["framesend"]).is_err());
    }

    #[test]
    fn port_must_be_a_number() {
        let err =
            Args::try_parse_from(["framesend", "localhost", "http", "PING", ""]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "framesend",
            "localhost",
            "8089",
            "/get",
            "{}",
            "--mode",
            "chunks",
            "--settle-ms",
            "500",
            "--lossy",
        ])
        .unwrap();

        assert_eq!(args.port, 8089);
        let settings = args.settings().unwrap();
        assert_eq!(settings.mode, ReceiveMode::Chunks);
        assert_eq!(settings.settle, Duration::from_millis(500));
        assert_eq!(settings.decoding, framesend::Decoding::Lossy);
    }

    #[test]
    fn no_lossy_overrides_config_file() {
        let path =
            std::env::temp_dir().join(format!("framesend-lossy-{}.toml", std::process::id()));
        std::fs::write(&path, "lossy = true\n").unwrap();
        let config = path.to_str().unwrap();
        let base = ["framesend", "localhost", "8089", "/get", "{}", "--config", config];

        let from_file = Args::try_parse_from(base).unwrap().settings().unwrap();
        assert_eq!(from_file.decoding, framesend::Decoding::Lossy);

        let mut argv = base.to_vec();
        argv.push("--no-lossy");
        let overridden = Args::try_parse_from(argv.clone()).unwrap().settings().unwrap();
        assert_eq!(overridden.decoding, framesend::Decoding::Strict);

        // The last of the two flags wins
        argv.push("--lossy");
        let args = Args::try_parse_from(argv).unwrap();
        assert_eq!(args.layer().lossy, Some(true));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn invalid_settings_are_reported() {
        let args = Args::try_parse_from([
            "framesend",
            "localhost",
            "8089",
            "PING",
            "",
            "--chunk-size",
            "0",
        ])
        .unwrap();
        assert!(args.settings().is_err());
    }
}
