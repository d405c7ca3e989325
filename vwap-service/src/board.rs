//! Snapshot board: latest and historical VWAP per symbol, shared between the
//! replay thread and request handlers.
//!
//! # Concurrency Model
//! - `DashMap` keyed by symbol; the replay thread writes, handlers read
//! - Replay status sits behind an async `RwLock`; the replay thread takes it
//!   with `blocking_write` since it runs outside the async executor
//! - Every published snapshot is also sent on a broadcast channel for streams

use dashmap::DashMap;
use orderbook::{LocateId, Order, SnapshotBoundary, SnapshotSink, Symbol, Vwap};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::types::{ReplayState, ReplayStatus, SnapshotEvent, SymbolVwap, VwapPoint};

pub struct SnapshotBoard {
    symbols: DashMap<String, SymbolVwap>,
    status: RwLock<ReplayStatus>,
    events: broadcast::Sender<SnapshotEvent>,
}

impl SnapshotBoard {
    pub fn new(feed: String, events: broadcast::Sender<SnapshotEvent>) -> Self {
        Self {
            symbols: DashMap::new(),
            status: RwLock::new(ReplayStatus::pending(feed)),
            events,
        }
    }

    /// Records one security's snapshot and fans it out to subscribers.
    pub fn publish(
        &self,
        boundary: &SnapshotBoundary,
        locate: LocateId,
        symbol: &Symbol,
        vwap: &Vwap,
    ) {
        let point = VwapPoint::new(boundary, vwap);
        let key = symbol.as_str().to_string();

        {
            let mut entry = self.symbols.entry(key.clone()).or_insert_with(|| SymbolVwap {
                symbol: key.clone(),
                locate,
                latest: None,
                history: Vec::new(),
            });
            entry.locate = locate;
            if let Some(prev) = entry.latest.replace(point.clone()) {
                entry.history.push(prev);
            }
        }

        // no receivers is fine; the board keeps the data
        let _ = self.events.send(SnapshotEvent {
            symbol: key,
            locate,
            point,
        });
    }

    /// Symbols seen so far, sorted.
    pub fn list_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.symbols.iter().map(|e| e.key().clone()).collect();
        symbols.sort_unstable();
        symbols
    }

    pub fn symbol_vwap(&self, symbol: &str) -> Option<SymbolVwap> {
        self.symbols.get(symbol).map(|e| e.value().clone())
    }

    pub fn latest(&self, symbol: &str) -> Option<SnapshotEvent> {
        let entry = self.symbols.get(symbol)?;
        let point = entry.latest.clone()?;
        Some(SnapshotEvent {
            symbol: entry.symbol.clone(),
            locate: entry.locate,
            point,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.events.subscribe()
    }

    pub async fn status(&self) -> ReplayStatus {
        self.status.read().await.clone()
    }

    /// Updates replay status from a blocking (non-async) context.
    pub fn update_status(&self, f: impl FnOnce(&mut ReplayStatus)) {
        let mut status = self.status.blocking_write();
        f(&mut status);
        debug!(state = ?status.state, frames = status.frames, "replay status updated");
    }

    pub fn set_state(&self, state: ReplayState) {
        self.update_status(|s| s.state = state);
    }

    #[cfg(test)]
    pub(crate) fn status_blocking(&self) -> ReplayStatus {
        self.status.blocking_read().clone()
    }
}

/// Adapts the board to the session's snapshot callback.
pub struct BoardSink<'a> {
    board: &'a SnapshotBoard,
    published: u64,
}

impl<'a> BoardSink<'a> {
    pub fn new(board: &'a SnapshotBoard) -> Self {
        Self { board, published: 0 }
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

impl SnapshotSink for BoardSink<'_> {
    fn on_hourly_snapshot(
        &mut self,
        boundary: &SnapshotBoundary,
        locate: LocateId,
        symbol: &Symbol,
        records: &[Order],
    ) {
        self.board
            .publish(boundary, locate, symbol, &Vwap::from_records(records));
        self.published += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderbook::clock::NANOS_PER_HOUR;

    fn boundary(seq: u64) -> SnapshotBoundary {
        SnapshotBoundary {
            at: (3 + seq) * NANOS_PER_HOUR,
            seq,
            late: false,
            is_final: false,
        }
    }

    fn board() -> SnapshotBoard {
        let (tx, _) = broadcast::channel(16);
        SnapshotBoard::new("test.itch".to_string(), tx)
    }

    #[test]
    fn history_keeps_previous_snapshots() {
        let board = board();
        let mut sink = BoardSink::new(&board);
        let fills = [Order::new(1_000_000, 100, 1)];

        sink.on_hourly_snapshot(&boundary(1), 1, &Symbol::new("AAPL"), &fills);
        sink.on_hourly_snapshot(&boundary(2), 1, &Symbol::new("AAPL"), &[]);

        let vwap = board.symbol_vwap("AAPL").unwrap();
        assert_eq!(vwap.history.len(), 1);
        assert_eq!(vwap.history[0].vwap, Some(100.0));
        let latest = vwap.latest.unwrap();
        assert_eq!(latest.seq, 2);
        assert_eq!(latest.vwap, None);
        assert_eq!(sink.published(), 2);
    }

    #[test]
    fn symbols_sorted() {
        let board = board();
        let mut sink = BoardSink::new(&board);
        sink.on_hourly_snapshot(&boundary(1), 2, &Symbol::new("MSFT"), &[]);
        sink.on_hourly_snapshot(&boundary(1), 1, &Symbol::new("AAPL"), &[]);
        assert_eq!(board.list_symbols(), vec!["AAPL", "MSFT"]);
        assert!(board.symbol_vwap("NVDA").is_none());
    }

    #[test]
    fn subscribers_receive_events() {
        let board = board();
        let mut rx = board.subscribe();
        board.publish(&boundary(1), 7, &Symbol::new("IBM"), &Vwap::default());

        let event = rx.try_recv().unwrap();
        assert_eq!(event.symbol, "IBM");
        assert_eq!(event.locate, 7);
        assert_eq!(board.latest("IBM").unwrap().point, event.point);
    }

    #[test]
    fn status_updates_outside_runtime() {
        let board = board();
        board.set_state(ReplayState::Running);
        board.update_status(|s| s.frames = 42);
        let status = board.status_blocking();
        assert_eq!(status.state, ReplayState::Running);
        assert_eq!(status.frames, 42);
    }
}
