extern crate log;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use env_logger::Builder;
use log::{debug, error, info, warn, LevelFilter};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::fs::File;

use mlat_client_rust::modes;
use mlat_client_rust::modes::modes_error::CoreError;
use mlat_client_rust::modes::modes_reader::{DecoderMode, FilterTable, ReaderConfig, ReaderState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[clap(group(
    clap::ArgGroup::new("Receiver location")
        .required(false)
        .multiple(true)
        .args(&["lat", "lon", "alt"]),
))]
#[clap(group(
    clap::ArgGroup::new("Multilateration server connection")
        .required(false)
        .multiple(true)
        .args(&["user", "server", "no_udp"]),
))]
struct Cli {
    #[arg(long = "lat", env = "MLAT_LAT", help = "Latitude of the receiver, in decimal degrees.")]
    lat: Option<f64>,

    #[arg(long = "lon", env = "MLAT_LON", help = "Longitude of the receiver, in decimal degrees.")]
    lon: Option<f64>,

    #[arg(long = "alt", env = "MLAT_ALT", help = "Altitude of the receiver (height above ellipsoid), in metres.")]
    alt: Option<f64>,

    #[arg(long = "privacy", action = clap::ArgAction::SetTrue, default_value_t = false, env = "MLAT_PRIVACY")]
    privacy: bool,

    #[arg(long = "user", env = "MLAT_USER", help = "User information to give to the server.")]
    user: Option<String>,

    #[arg(long = "server", env = "MLAT_SERVER", help = "host:port of the multilateration server to connect to.")]
    server: Option<String>,

    #[arg(long = "no-udp", action = clap::ArgAction::SetFalse, default_value_t = true, env = "MLAT_NO_UDP")]
    no_udp: bool,

    /// Receiver format: one of beast, radarcape, radarcape_emulated, avr, avrmlat, sbs.
    #[arg(long = "format", env = "MLAT_INPUT_FORMAT", default_value = "beast")]
    format: String,

    /// Path to a file of raw receiver bytes, or "-" to read from stdin.
    #[arg(long = "input", env = "MLAT_INPUT", default_value = "-")]
    input: String,

    #[arg(long = "allow-mode-change", action = clap::ArgAction::SetTrue, default_value_t = true)]
    allow_mode_change: bool,

    #[arg(long = "want-zero-timestamps", action = clap::ArgAction::SetTrue, default_value_t = false)]
    want_zero_timestamps: bool,

    #[arg(long = "want-mlat-messages", action = clap::ArgAction::SetTrue, default_value_t = false)]
    want_mlat_messages: bool,

    #[arg(long = "want-invalid-messages", action = clap::ArgAction::SetTrue, default_value_t = false)]
    want_invalid_messages: bool,

    #[arg(long = "no-events", action = clap::ArgAction::SetTrue, default_value_t = false)]
    no_events: bool,

    #[arg(long = "json", action = clap::ArgAction::SetTrue, default_value_t = false, help = "Emit one JSON object per decoded message instead of a human-readable line.")]
    json: bool,

    #[arg(short = 'v', long = "log-level", alias = "loglevel", action = clap::ArgAction::Set, default_value_t = String::from("info"), value_parser = ["off", "error", "warn", "info", "debug", "trace"], env = "MLAT_LOG_LEVEL")]
    log_level: String,

    #[arg(long = "log-style", alias = "logstyle", action = clap::ArgAction::Set, default_value_t = String::from("auto"), value_parser = ["auto", "always", "never"], env = "MLAT_LOG_STYLE")]
    log_style: String,
}

fn parse_mode(name: &str) -> Option<DecoderMode> {
    match name.to_ascii_lowercase().as_str() {
        "beast" => Some(DecoderMode::Beast),
        "radarcape" => Some(DecoderMode::Radarcape),
        "radarcape_emulated" => Some(DecoderMode::RadarcapeEmulated),
        "avr" => Some(DecoderMode::Avr),
        "avrmlat" => Some(DecoderMode::AvrMlat),
        "sbs" => Some(DecoderMode::Sbs),
        _ => None,
    }
}

/// Opens either a real file or stdin, erased behind `AsyncRead` so the feed
/// loop below doesn't need to know which.
async fn open_input(path: &str) -> std::io::Result<Box<dyn AsyncRead + Unpin>> {
    if path == "-" {
        Ok(Box::new(tokio::io::stdin()))
    } else {
        Ok(Box::new(File::open(path).await?))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::from_str_lossy(&cli.log_level));
    builder.parse_write_style(&cli.log_style);
    builder.init();

    let Some(mode) = parse_mode(&cli.format) else {
        error!("unknown receiver format {:?}; expected beast/radarcape/radarcape_emulated/avr/avrmlat/sbs", cli.format);
        return ExitCode::FAILURE;
    };

    info!(
        "starting decoder: format={} input={} lat={:?} lon={:?} alt={:?}",
        mode.name(),
        cli.input,
        cli.lat,
        cli.lon,
        cli.alt
    );

    let config = ReaderConfig {
        mode,
        allow_mode_change: cli.allow_mode_change,
        want_zero_timestamps: cli.want_zero_timestamps,
        want_mlat_messages: cli.want_mlat_messages,
        want_invalid_messages: cli.want_invalid_messages,
        want_events: !cli.no_events,
        track_seen: true,
        filters: FilterTable::default(),
        modeac_filter: None,
    };
    let mut reader = ReaderState::new(config);

    let mut input = match open_input(&cli.input).await {
        Ok(r) => r,
        Err(e) => {
            error!("couldn't open input {:?}: {}", cli.input, e);
            return ExitCode::FAILURE;
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let ctrlc_running = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        ctrlc_running.store(false, Ordering::SeqCst);
    }) {
        warn!("couldn't install Ctrl-C handler: {}", e);
    }

    let start = Instant::now();
    let mut buf: Vec<u8> = Vec::with_capacity(64 * 1024);
    let mut read_chunk = vec![0u8; 16 * 1024];

    while running.load(Ordering::SeqCst) {
        let n = match input.read(&mut read_chunk).await {
            Ok(0) => break, // EOF
            Ok(n) => n,
            Err(e) => {
                error!("read error: {}", e);
                break;
            }
        };
        buf.extend_from_slice(&read_chunk[..n]);

        loop {
            let now_mono_ms = start.elapsed().as_millis() as u64;
            match reader.feed(&buf, now_mono_ms, 1000) {
                Ok((consumed, messages)) => {
                    for message in &messages {
                        emit(message, cli.json);
                    }
                    buf.drain(..consumed);
                    break;
                }
                Err(CoreError::Sync { offset, reason }) => {
                    warn!("lost sync with input stream at offset {}: {}; resynchronizing", offset, reason);
                    // best-effort resync: drop one byte past the point where
                    // we lost sync and try again from there.
                    let skip = (offset + 1).min(buf.len());
                    buf.drain(..skip);
                    if buf.is_empty() {
                        break;
                    }
                }
                Err(CoreError::ClockReset { last_timestamp }) => {
                    warn!("receiver clock reset detected (was {}), dropping synchronization state", last_timestamp);
                    buf.clear();
                    break;
                }
                Err(CoreError::NoDecoderMode) => {
                    error!("no decoder mode selected");
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    info!(
        "shutting down: received={} suppressed={} mlat={}",
        reader.received_messages, reader.suppressed_messages, reader.mlat_messages
    );

    ExitCode::SUCCESS
}

fn emit(message: &modes::modes_message::ModesMessage, as_json: bool) {
    if as_json {
        match serde_json::to_string(message) {
            Ok(line) => println!("{}", line),
            Err(e) => debug!("failed to serialize message as json: {}", e),
        }
    } else {
        println!("{}", message);
    }
}

trait LevelFilterExt {
    fn from_str_lossy(s: &str) -> LevelFilter;
}

impl LevelFilterExt for LevelFilter {
    fn from_str_lossy(s: &str) -> LevelFilter {
        use std::str::FromStr;
        LevelFilter::from_str(s).unwrap_or(LevelFilter::Info)
    }
}
