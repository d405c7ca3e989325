use anyhow::{Context, Result};
use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use clap::Parser;
use orderbook::{LedgerPolicy, SessionConfig, Symbol};
use std::{
    fs::File,
    io::BufReader,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

mod board;
mod replay;
mod types;
mod websocket;

use board::SnapshotBoard;
use types::*;

/// Snapshot events buffered per subscriber; one boundary can carry thousands.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 1 << 14;

#[derive(Parser)]
#[command(name = "vwap-service")]
#[command(about = "Replays an ITCH feed and serves hourly VWAP snapshots")]
struct Args {
    /// Framed ITCH 5.0 feed file to replay.
    #[arg(short, long)]
    feed: PathBuf,
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
    /// JSON session config.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    reset_hourly: bool,
    #[arg(long)]
    honor_printable: bool,
}

#[derive(Clone)]
struct AppState {
    board: Arc<SnapshotBoard>,
    snapshot_broadcaster: broadcast::Sender<SnapshotEvent>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("open config {:?}", path))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parse config {:?}", path))?
        }
        None => SessionConfig::default(),
    };
    if args.reset_hourly {
        config.ledger_policy = LedgerPolicy::ResetEachSnapshot;
    }
    config.honor_printable |= args.honor_printable;

    let (snapshot_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
    let board = Arc::new(SnapshotBoard::new(
        args.feed.display().to_string(),
        snapshot_tx.clone(),
    ));

    let replay_board = board.clone();
    let feed = args.feed.clone();
    let replay =
        tokio::task::spawn_blocking(move || replay::run_file(&feed, config, &replay_board));
    tokio::spawn(async move {
        match replay.await {
            Ok(Ok(stats)) => info!(
                messages = stats.messages,
                faults = stats.faults(),
                "feed replay finished"
            ),
            Ok(Err(e)) => error!(error = %format!("{e:#}"), "feed replay failed"),
            Err(e) => error!(error = %e, "replay task panicked"),
        }
    });

    let app = app(AppState {
        board,
        snapshot_broadcaster: snapshot_tx,
    });

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;

    info!("VWAP service starting on http://{}", args.bind);
    info!(" Available endpoints:");
    info!("  GET  /health - Health check");
    info!("  GET  /status - Replay progress and session stats");
    info!("  GET  /symbols - Symbols with snapshots");
    info!("  GET  /symbols/:symbol/vwap - Latest and hourly VWAP");
    info!("  WS   /snapshots/stream - All snapshots");
    info!("  WS   /symbols/:symbol/stream - Snapshots for one symbol");

    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(replay_status))
        .route("/symbols", get(list_symbols))
        .route("/symbols/:symbol/vwap", get(symbol_vwap))
        .route("/symbols/:symbol/stream", get(symbol_stream))
        .route("/snapshots/stream", get(snapshot_stream))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "itchvwap",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
    }))
}

async fn replay_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.board.status().await)
}

async fn list_symbols(State(state): State<AppState>) -> impl IntoResponse {
    Json(SymbolsResponse {
        symbols: state.board.list_symbols(),
    })
}

async fn symbol_vwap(
    Path(symbol): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let symbol = normalize(&symbol)?;
    let vwap = state
        .board
        .symbol_vwap(&symbol)
        .ok_or(AppError::SymbolNotFound)?;
    Ok(Json(vwap))
}

async fn symbol_stream(
    Path(symbol): Path<String>,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let symbol = normalize(&symbol)?;
    Ok(ws.on_upgrade(move |socket| websocket::handle_snapshot_stream(socket, Some(symbol), state)))
}

async fn snapshot_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| websocket::handle_snapshot_stream(socket, None, state))
}

/// Upper-cases and checks the symbol fits the 8-byte feed field.
fn normalize(symbol: &str) -> Result<String, AppError> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() || trimmed.len() > Symbol::LEN || !trimmed.is_ascii() {
        return Err(AppError::InvalidSymbol);
    }
    Ok(trimmed.to_ascii_uppercase())
}

#[derive(Debug)]
enum AppError {
    SymbolNotFound,
    InvalidSymbol,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::SymbolNotFound => (StatusCode::NOT_FOUND, "Symbol not found"),
            AppError::InvalidSymbol => (StatusCode::BAD_REQUEST, "Invalid symbol"),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use orderbook::clock::NANOS_PER_HOUR;
    use orderbook::{Order, SnapshotBoundary, Vwap};
    use tower::ServiceExt;

    fn state() -> AppState {
        let (tx, _) = broadcast::channel(16);
        let board = Arc::new(SnapshotBoard::new("mem".to_string(), tx.clone()));
        let boundary = SnapshotBoundary {
            at: 4 * NANOS_PER_HOUR,
            seq: 1,
            late: false,
            is_final: false,
        };
        let fills = [Order::new(1_000_000, 100, 3), Order::new(1_100_000, 300, 3)];
        board.publish(&boundary, 3, &Symbol::new("AAPL"), &Vwap::from_records(&fills));
        AppState {
            board,
            snapshot_broadcaster: tx,
        }
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app(state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn vwap_for_known_symbol() {
        let (status, body) = get_json("/symbols/aapl/vwap").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "AAPL");
        assert_eq!(body["locate"], 3);
        assert_eq!(body["latest"]["vwap_ticks"], 1_075_000);
        assert_eq!(body["latest"]["at"], "04:00:00");
    }

    #[tokio::test]
    async fn unknown_and_invalid_symbols() {
        let (status, body) = get_json("/symbols/NVDA/vwap").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 404);

        let (status, _) = get_json("/symbols/WAYTOOLONG/vwap").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn symbols_and_status() {
        let (_, body) = get_json("/symbols").await;
        assert_eq!(body["symbols"], serde_json::json!(["AAPL"]));

        let (status, body) = get_json("/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "pending");
        assert_eq!(body["feed"], "mem");
    }

    #[test]
    fn normalize_symbols() {
        assert_eq!(normalize(" msft ").unwrap(), "MSFT");
        assert!(normalize("").is_err());
        assert!(normalize("ABCDEFGHI").is_err());
    }
}
