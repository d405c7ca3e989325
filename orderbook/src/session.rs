//! One trading day of book, ledger, directory and clock state.
//!
//! The session owns everything a message can touch. Drivers call
//! [`Session::handle`] for each message in feed order, then
//! [`Session::poll_snapshots`] to deliver any hour boundaries that elapsed,
//! and [`Session::finish`] once at the end of the stream.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::clock::{
    format_hms, SessionClock, SnapshotBoundary, SnapshotScheduler, NANOS_PER_HOUR,
    SNAPSHOT_ORIGIN_NS, SNAPSHOT_SLACK_NS,
};
use crate::directory::SecurityDirectory;
use crate::ledger::{ExecutionLedger, DEFAULT_RESERVE};
use crate::message::{Message, MessageKind};
use crate::types::{LocateId, Order, OrderId, Price, Qty, Side, Symbol};
use crate::vwap::Vwap;
use crate::wire::DecodeError;
use crate::{AddOutcome, OrderBook, Reduction, TYPICAL_LIVE_ORDERS};

/// What happens to ledgers after a snapshot has been delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerPolicy {
    /// Keep accumulating; each snapshot covers the session so far.
    #[default]
    Cumulative,
    /// Clear after each snapshot; each snapshot covers one interval.
    ResetEachSnapshot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Initial capacity of the live book.
    pub book_capacity: usize,
    /// Per-locate ledger capacity reserved on registration.
    pub ledger_reserve: usize,
    /// Scheduler origin; the first snapshot is one interval later.
    pub snapshot_origin_ns: u64,
    pub snapshot_interval_ns: u64,
    pub snapshot_slack_ns: u64,
    pub ledger_policy: LedgerPolicy,
    /// Leave non-printable executions out of the ledger.
    pub honor_printable: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            book_capacity: TYPICAL_LIVE_ORDERS,
            ledger_reserve: DEFAULT_RESERVE,
            snapshot_origin_ns: SNAPSHOT_ORIGIN_NS,
            snapshot_interval_ns: NANOS_PER_HOUR,
            snapshot_slack_ns: SNAPSHOT_SLACK_NS,
            ledger_policy: LedgerPolicy::Cumulative,
            honor_printable: false,
        }
    }
}

/// Receives snapshot data, once per registered locate per boundary.
pub trait SnapshotSink {
    fn on_hourly_snapshot(
        &mut self,
        boundary: &SnapshotBoundary,
        locate: LocateId,
        symbol: &Symbol,
        records: &[Order],
    );

    /// Called after the last locate of a boundary.
    fn on_boundary_complete(&mut self, _boundary: &SnapshotBoundary) {}
}

/// Owned copy of one locate's ledger at a boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SecuritySnapshot {
    pub boundary: SnapshotBoundary,
    pub locate: LocateId,
    pub symbol: Symbol,
    pub records: Vec<Order>,
}

impl SecuritySnapshot {
    pub fn vwap(&self) -> Vwap {
        Vwap::from_records(&self.records)
    }
}

impl SnapshotSink for Vec<SecuritySnapshot> {
    fn on_hourly_snapshot(
        &mut self,
        boundary: &SnapshotBoundary,
        locate: LocateId,
        symbol: &Symbol,
        records: &[Order],
    ) {
        self.push(SecuritySnapshot {
            boundary: *boundary,
            locate,
            symbol: *symbol,
            records: records.to_vec(),
        });
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Messages decoded and applied.
    pub messages: u64,
    /// Applied messages per kind, indexed by [`MessageKind::index`].
    pub by_kind: [u64; 12],
    pub malformed: u64,
    pub unknown_type: u64,
    pub unknown_order: u64,
    pub untracked_adds: u64,
    pub zero_qty_adds: u64,
    pub duplicate_adds: u64,
    /// Cancels or executions larger than the resting quantity.
    pub clamped: u64,
    pub non_printable_skipped: u64,
    pub trade_reports: u64,
    pub clock_regressions: u64,
    pub snapshots: u64,
}

impl SessionStats {
    pub fn count(&self, kind: MessageKind) -> u64 {
        self.by_kind[kind.index()]
    }

    /// Message kinds seen at least once.
    pub fn kind_counts(&self) -> impl Iterator<Item = (MessageKind, u64)> + '_ {
        MessageKind::ALL
            .into_iter()
            .map(|k| (k, self.count(k)))
            .filter(|(_, n)| *n > 0)
    }

    pub fn faults(&self) -> u64 {
        self.malformed + self.unknown_type
    }
}

pub struct Session {
    config: SessionConfig,
    directory: SecurityDirectory,
    book: OrderBook,
    ledger: ExecutionLedger,
    clock: SessionClock,
    scheduler: SnapshotScheduler,
    stats: SessionStats,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        info!(
            book_capacity = config.book_capacity,
            ledger_policy = ?config.ledger_policy,
            first_snapshot = %format_hms(
                config
                    .snapshot_origin_ns
                    .saturating_add(config.snapshot_interval_ns)
            ),
            "session initialized"
        );

        Self {
            directory: SecurityDirectory::new(),
            book: OrderBook::with_capacity(config.book_capacity),
            ledger: ExecutionLedger::new(config.ledger_reserve),
            clock: SessionClock::new(),
            scheduler: SnapshotScheduler::new(
                config.snapshot_origin_ns,
                config.snapshot_interval_ns,
                config.snapshot_slack_ns,
            ),
            stats: SessionStats::default(),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SessionConfig::default())
    }

    /// Decodes and applies one message; byte 0 of `bytes` is the type byte.
    ///
    /// A message that fails to decode leaves the session untouched.
    pub fn handle(&mut self, kind: MessageKind, bytes: &[u8]) -> Result<(), DecodeError> {
        match Message::decode(kind, bytes) {
            Ok(msg) => {
                self.apply(msg);
                Ok(())
            }
            Err(err) => {
                self.stats.malformed += 1;
                warn!(kind = kind.label(), len = bytes.len(), %err, "skipping malformed message");
                Err(err)
            }
        }
    }

    /// Like [`handle`](Self::handle), taking the kind from byte 0.
    pub fn handle_raw(&mut self, bytes: &[u8]) -> Result<MessageKind, DecodeError> {
        let kind = match bytes.first().map(|&b| MessageKind::try_from(b)) {
            Some(Ok(kind)) => kind,
            Some(Err(err)) => {
                self.stats.unknown_type += 1;
                debug!(%err, "skipping unrecognized message");
                return Err(err);
            }
            None => {
                self.stats.malformed += 1;
                return Err(DecodeError::Empty);
            }
        };
        self.handle(kind, bytes).map(|()| kind)
    }

    /// Applies an already decoded message.
    pub fn apply(&mut self, msg: Message) {
        self.stats.messages += 1;
        self.stats.by_kind[msg.kind().index()] += 1;

        if let Some(ts) = msg.timestamp() {
            if !self.clock.observe(ts) {
                self.stats.clock_regressions += 1;
            }
        }

        match msg {
            Message::SystemEvent { code, .. } => {
                debug!(?code, at = %format_hms(self.clock.now()), "system event");
                self.clock.observe_system_event(code);
            }
            Message::StockDirectory { locate, symbol } => self.register_security(locate, symbol),
            Message::AddOrder {
                locate,
                order_id,
                side,
                qty,
                price,
                ..
            } => self.add_order(locate, order_id, side, qty, price),
            Message::OrderExecuted { order_id, qty, .. } => self.execute(order_id, qty),
            Message::OrderExecutedWithPrice {
                order_id,
                qty,
                price,
                printable,
                ..
            } => self.execute_with_price(order_id, qty, price, printable),
            Message::OrderCancel { order_id, qty } => self.cancel(order_id, qty),
            Message::OrderDelete { order_id } => self.delete(order_id),
            Message::OrderReplace {
                old_order_id,
                new_order_id,
                qty,
                price,
                ..
            } => self.replace(old_order_id, new_order_id, qty, price),
            Message::NonCrossTrade | Message::CrossTrade | Message::BrokenTrade => {
                self.stats.trade_reports += 1;
                trace!(kind = msg.kind().label(), "trade report ignored");
            }
        }
    }

    /// Records the symbol for `locate` and starts its ledger afresh.
    pub fn register_security(&mut self, locate: LocateId, symbol: Symbol) {
        if let Some(prev) = self.directory.register(locate, symbol) {
            debug!(locate, %prev, %symbol, "locate re-registered");
        }
        self.ledger.reset(locate);
    }

    pub fn add_order(
        &mut self,
        locate: LocateId,
        order_id: OrderId,
        side: Side,
        qty: Qty,
        price: Price,
    ) {
        match self.book.add(locate, order_id, side, qty, price) {
            AddOutcome::Inserted => {}
            AddOutcome::Untracked => self.stats.untracked_adds += 1,
            AddOutcome::ZeroQty => {
                self.stats.zero_qty_adds += 1;
                debug!(%order_id, "zero quantity add not booked");
            }
            AddOutcome::Duplicate => {
                self.stats.duplicate_adds += 1;
                warn!(%order_id, "add for an order id already resting");
            }
        }
    }

    /// Execution at the order's resting price.
    pub fn execute(&mut self, order_id: OrderId, qty: Qty) {
        if let Some((price, locate)) = self.fill(order_id, qty) {
            self.record_fill(order_id, locate, price, qty);
        }
    }

    /// Execution at the price carried in the message.
    pub fn execute_with_price(
        &mut self,
        order_id: OrderId,
        qty: Qty,
        price: Price,
        printable: bool,
    ) {
        let Some((_, locate)) = self.fill(order_id, qty) else {
            return;
        };
        if !printable && self.config.honor_printable {
            self.stats.non_printable_skipped += 1;
            trace!(%order_id, "non-printable execution kept out of ledger");
            return;
        }
        self.record_fill(order_id, locate, price, qty);
    }

    pub fn cancel(&mut self, order_id: OrderId, qty: Qty) {
        match self.book.cancel(order_id, qty) {
            Reduction::Unknown => self.stats.unknown_order += 1,
            Reduction::Clamped { resting } => {
                self.stats.clamped += 1;
                warn!(
                    %order_id,
                    resting,
                    cancelled = qty,
                    "cancel exceeds resting quantity; order removed"
                );
            }
            Reduction::Partial { .. } | Reduction::Removed => {}
        }
    }

    pub fn delete(&mut self, order_id: OrderId) {
        if self.book.delete(order_id).is_none() {
            self.stats.unknown_order += 1;
        }
    }

    /// The replacement keeps the locate of the order it replaces.
    pub fn replace(&mut self, old_id: OrderId, new_id: OrderId, qty: Qty, price: Price) {
        if self.book.replace(old_id, new_id, qty, price).is_none() {
            self.stats.unknown_order += 1;
            trace!(%old_id, %new_id, "replace of unknown order dropped");
        }
    }

    /// Delivers every hour boundary that has elapsed. Returns how many fired.
    pub fn poll_snapshots<S: SnapshotSink + ?Sized>(&mut self, sink: &mut S) -> usize {
        if self.clock.is_ended() {
            return 0;
        }
        let now = self.clock.now();
        let mut fired = 0;
        while let Some(boundary) = self.scheduler.next_due(now) {
            self.emit(&boundary, sink);
            fired += 1;
        }
        fired
    }

    /// Final flush at the current feed time; `None` if already flushed.
    pub fn finish<S: SnapshotSink + ?Sized>(&mut self, sink: &mut S) -> Option<SnapshotBoundary> {
        let boundary = self.scheduler.final_flush(self.clock.now())?;
        self.emit(&boundary, sink);
        info!(
            messages = self.stats.messages,
            faults = self.stats.faults(),
            resting = self.book.len(),
            "session finished"
        );
        Some(boundary)
    }

    pub fn vwap(&self, locate: LocateId) -> Vwap {
        Vwap::from_records(self.ledger.records(locate))
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn ledger(&self) -> &ExecutionLedger {
        &self.ledger
    }

    pub fn directory(&self) -> &SecurityDirectory {
        &self.directory
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Book side of an execution; resting price and locate if the order exists.
    fn fill(&mut self, order_id: OrderId, qty: Qty) -> Option<(Price, LocateId)> {
        let Some(fill) = self.book.execute(order_id, qty) else {
            self.stats.unknown_order += 1;
            return None;
        };
        if let Reduction::Clamped { resting } = fill.outcome {
            self.stats.clamped += 1;
            warn!(
                %order_id,
                resting,
                executed = qty,
                "execution exceeds resting quantity; order removed"
            );
        }
        Some((fill.price, fill.locate))
    }

    fn record_fill(&mut self, order_id: OrderId, locate: LocateId, price: Price, qty: Qty) {
        trace!(%order_id, locate, price, qty, "fill recorded");
        self.ledger.append(locate, price, qty);
    }

    fn emit<S: SnapshotSink + ?Sized>(&mut self, boundary: &SnapshotBoundary, sink: &mut S) {
        for (locate, symbol) in self.directory.registered() {
            sink.on_hourly_snapshot(boundary, locate, symbol, self.ledger.records(locate));
        }
        sink.on_boundary_complete(boundary);
        self.stats.snapshots += 1;

        info!(
            seq = boundary.seq,
            at = %format_hms(boundary.at),
            late = boundary.late,
            is_final = boundary.is_final,
            securities = self.directory.len(),
            fills = self.ledger.total_records(),
            "snapshot delivered"
        );

        if self.config.ledger_policy == LedgerPolicy::ResetEachSnapshot {
            self.ledger.clear_all();
        }
    }
}
