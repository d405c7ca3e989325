use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use orderbook::clock::format_hms;
use orderbook::{
    DecodeError, FeedError, FrameReader, LedgerPolicy, Message, Session, SessionConfig,
    SessionStats, Timestamp,
};
use serde::Deserialize;
use tracing::{debug, warn};

mod render;

use render::ReportSink;

#[derive(Parser)]
#[command(name = "itchvwap-cli")]
#[command(about = "ITCH VWAP CLI - replay feed files locally or query the VWAP service")]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    server: String,
    /// Log level for session diagnostics.
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a framed ITCH file and print hourly VWAP snapshots.
    Replay {
        file: PathBuf,
        /// JSON session config; flags below override it.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Clear ledgers after each snapshot instead of accumulating.
        #[arg(long)]
        reset_hourly: bool,
        #[arg(long)]
        honor_printable: bool,
        /// Include securities with no executions.
        #[arg(long)]
        show_idle: bool,
        /// Emit one JSON object per row.
        #[arg(long)]
        json: bool,
        /// Restrict output to these symbols.
        #[arg(short = 'S', long = "symbol")]
        symbols: Vec<String>,
    },
    /// Count messages by kind without building snapshots.
    Inspect { file: PathBuf },
    Health,
    Status,
    Symbols,
    /// Latest and hourly VWAP for one symbol from the service.
    Vwap {
        symbol: String,
    },
}

#[derive(Deserialize)]
struct SymbolsResponse {
    symbols: Vec<String>,
}

#[derive(Deserialize)]
struct VwapPoint {
    at: String,
    seq: u64,
    late: bool,
    is_final: bool,
    fills: u64,
    volume: u64,
    vwap: Option<f64>,
}

#[derive(Deserialize)]
struct SymbolVwap {
    symbol: String,
    locate: u16,
    latest: Option<VwapPoint>,
    history: Vec<VwapPoint>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Replay {
            file,
            config,
            reset_hourly,
            honor_printable,
            show_idle,
            json,
            symbols,
        } => {
            let mut cfg = match config {
                Some(path) => load_config(&path)?,
                None => SessionConfig::default(),
            };
            if reset_hourly {
                cfg.ledger_policy = LedgerPolicy::ResetEachSnapshot;
            }
            cfg.honor_printable |= honor_printable;

            let sink = ReportSink::new(io::stdout().lock(), json, show_idle).with_filter(symbols);
            let stats = replay(&file, cfg, sink)?;
            if !json {
                print_summary(&stats);
            }
        }

        Commands::Inspect { file } => {
            let stats = inspect(&file)?;
            print_summary(&stats);
        }

        Commands::Health => {
            let client = reqwest::Client::new();
            let response = client.get(format!("{}/health", cli.server)).send().await?;

            if response.status().is_success() {
                let health: serde_json::Value = response.json().await?;
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                println!("Error: {}", response.status());
            }
        }

        Commands::Status => {
            let client = reqwest::Client::new();
            let response = client.get(format!("{}/status", cli.server)).send().await?;

            if response.status().is_success() {
                let status: serde_json::Value = response.json().await?;
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Error: {}", response.status());
            }
        }

        Commands::Symbols => {
            let client = reqwest::Client::new();
            let response = client.get(format!("{}/symbols", cli.server)).send().await?;

            if response.status().is_success() {
                let symbols: SymbolsResponse = response.json().await?;
                for symbol in symbols.symbols {
                    println!("{}", symbol);
                }
            } else {
                println!("Error: {}", response.status());
            }
        }

        Commands::Vwap { symbol } => {
            let client = reqwest::Client::new();
            let response = client
                .get(format!("{}/symbols/{}/vwap", cli.server, symbol))
                .send()
                .await?;

            if response.status().is_success() {
                let vwap: SymbolVwap = response.json().await?;
                println!("Symbol: {} (locate {})", vwap.symbol, vwap.locate);
                match &vwap.latest {
                    Some(point) => println!("Latest: {}", describe(point)),
                    None => println!("Latest: no snapshot yet"),
                }
                for point in &vwap.history {
                    println!("  {}", describe(point));
                }
            } else {
                println!("Error: {}", response.status());
                println!("{}", response.text().await?);
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<SessionConfig> {
    let file = File::open(path).with_context(|| format!("open config {:?}", path))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parse config {:?}", path))
}

fn open_feed(path: &Path) -> Result<FrameReader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("open feed {:?}", path))?;
    Ok(FrameReader::new(BufReader::with_capacity(1 << 20, file)))
}

fn replay<W: io::Write>(
    path: &Path,
    cfg: SessionConfig,
    mut sink: ReportSink<W>,
) -> Result<SessionStats> {
    let mut frames = open_feed(path)?;
    let mut session = Session::new(cfg);

    loop {
        match frames.next_frame() {
            Ok(Some(frame)) => {
                // faults are counted by the session and reported in the summary
                let _ = session.handle_raw(frame);
                session.poll_snapshots(&mut sink);
            }
            Ok(None) => break,
            Err(FeedError::Io(err)) => {
                return Err(err).with_context(|| format!("read feed {:?}", path));
            }
            Err(err @ FeedError::ZeroLength { .. }) => warn!(%err, "skipping empty frame"),
            Err(err) => {
                warn!(%err, "feed ended early");
                break;
            }
        }
    }

    session.finish(&mut sink);
    debug!(rows = sink.rows(), "report rows written");
    sink.finish().context("write report")?;
    Ok(session.stats().clone())
}

fn inspect(path: &Path) -> Result<SessionStats> {
    let scan = scan(open_feed(path)?).with_context(|| format!("read feed {:?}", path))?;

    println!("Frames: {}", scan.frames);
    println!("Bytes: {}", scan.bytes);
    if let Some((first, last)) = scan.span {
        println!("Feed time: {} - {}", format_hms(first), format_hms(last));
    }
    Ok(scan.stats)
}

struct FeedScan {
    stats: SessionStats,
    frames: u64,
    bytes: u64,
    span: Option<(Timestamp, Timestamp)>,
}

/// Decodes every frame without applying it. Empty frames are skipped and a
/// truncated tail ends the scan, as in `replay`.
fn scan<R: Read>(mut frames: FrameReader<R>) -> Result<FeedScan> {
    let mut stats = SessionStats::default();
    let mut span: Option<(Timestamp, Timestamp)> = None;

    loop {
        match frames.next_frame() {
            Ok(Some(frame)) => match Message::decode_raw(frame) {
                Ok(msg) => {
                    stats.messages += 1;
                    stats.by_kind[msg.kind().index()] += 1;
                    if let Some(ts) = msg.timestamp() {
                        let (_, last) = span.get_or_insert((ts, ts));
                        *last = (*last).max(ts);
                    }
                }
                Err(DecodeError::UnknownMessageType(_)) => stats.unknown_type += 1,
                Err(_) => stats.malformed += 1,
            },
            Ok(None) => break,
            Err(FeedError::Io(err)) => return Err(err.into()),
            Err(err @ FeedError::ZeroLength { .. }) => warn!(%err, "skipping empty frame"),
            Err(err) => {
                warn!(%err, "feed ended early");
                break;
            }
        }
    }

    Ok(FeedScan {
        stats,
        frames: frames.frames(),
        bytes: frames.offset(),
        span,
    })
}

fn print_summary(stats: &SessionStats) {
    println!("\nMessages: {}", stats.messages);
    for (kind, count) in stats.kind_counts() {
        println!("  {:<26} {}", kind.label(), count);
    }
    println!("Malformed: {}", stats.malformed);
    println!("Unknown type: {}", stats.unknown_type);
    if stats.snapshots > 0 {
        println!("Unknown order refs: {}", stats.unknown_order);
        println!("Clamped reductions: {}", stats.clamped);
        println!("Snapshots: {}", stats.snapshots);
    }
}

fn describe(point: &VwapPoint) -> String {
    let vwap = point
        .vwap
        .map(|p| format!("{p:.4}"))
        .unwrap_or_else(|| "-".to_string());
    let mut flags = String::new();
    if point.late {
        flags.push_str(" late");
    }
    if point.is_final {
        flags.push_str(" final");
    }
    format!(
        "#{} {} fills={} volume={} vwap={}{}",
        point.seq, point.at, point.fills, point.volume, vwap, flags
    )
}
