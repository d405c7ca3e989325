//! API types for REST and WebSocket interfaces.

use orderbook::clock::format_hms;
use orderbook::{LocateId, SessionStats, SnapshotBoundary, Vwap};
use serde::{Deserialize, Serialize};

/// One security's VWAP at one snapshot boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VwapPoint {
    pub at: String,
    pub at_ns: u64,
    pub seq: u64,
    pub late: bool,
    pub is_final: bool,
    pub fills: u64,
    pub volume: u64,
    pub vwap: Option<f64>,
    /// VWAP in price ticks (4 implied decimals).
    pub vwap_ticks: Option<u64>,
}

impl VwapPoint {
    pub fn new(boundary: &SnapshotBoundary, vwap: &Vwap) -> Self {
        Self {
            at: format_hms(boundary.at),
            at_ns: boundary.at,
            seq: boundary.seq,
            late: boundary.late,
            is_final: boundary.is_final,
            fills: vwap.fills,
            volume: vwap.volume,
            vwap: vwap.price(),
            vwap_ticks: vwap.price_ticks(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SymbolsResponse {
    pub symbols: Vec<String>,
}

/// Latest snapshot plus every earlier one for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolVwap {
    pub symbol: String,
    pub locate: LocateId,
    pub latest: Option<VwapPoint>,
    pub history: Vec<VwapPoint>,
}

/// Snapshot event for WebSocket streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEvent {
    pub symbol: String,
    pub locate: LocateId,
    pub point: VwapPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Replay progress reported by `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayStatus {
    pub feed: String,
    pub state: ReplayState,
    pub frames: u64,
    pub bytes: u64,
    pub feed_time: String,
    pub session_ended: bool,
    pub snapshots: u64,
    pub stats: Option<SessionStats>,
    pub error: Option<String>,
}

impl ReplayStatus {
    pub fn pending(feed: String) -> Self {
        Self {
            feed,
            state: ReplayState::Pending,
            frames: 0,
            bytes: 0,
            feed_time: format_hms(0),
            session_ended: false,
            snapshots: 0,
            stats: None,
            error: None,
        }
    }
}

/// WebSocket message types.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebSocketMessage {
    #[serde(rename = "snapshot")]
    Snapshot(SnapshotEvent),
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "ping")]
    Ping { timestamp: u128 },
    #[serde(rename = "pong")]
    Pong { timestamp: u128 },
}
