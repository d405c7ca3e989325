//! Buy-side order book reconstruction from an ITCH 5.0 message stream.
//!
//! Core features:
//! - Bounds-checked big-endian decoding of fixed-layout messages
//! - Live book of resting buy orders keyed by order id
//! - Per-security execution ledger feeding hourly VWAP snapshots
//! - Session clock with catch-up scheduling of hour boundaries
//!
//! A [`Session`] owns all state for one trading day; feed it messages in
//! arrival order and poll it for snapshots.

pub mod clock;
pub mod directory;
pub mod feed;
pub mod ledger;
pub mod message;
pub mod session;
pub mod types;
pub mod vwap;
pub mod wire;

pub use clock::{SessionClock, SnapshotBoundary, SnapshotScheduler};
pub use directory::SecurityDirectory;
pub use feed::{FeedError, FrameReader, FrameWriter};
pub use ledger::ExecutionLedger;
pub use message::{Message, MessageKind, SystemEventCode};
pub use session::{
    LedgerPolicy, SecuritySnapshot, Session, SessionConfig, SessionStats, SnapshotSink,
};
pub use types::{LocateId, Order, OrderId, Price, Qty, Side, Symbol, Timestamp};
pub use vwap::Vwap;
pub use wire::DecodeError;

use hashbrown::HashMap;

/// Observed live population on a full trading day.
pub const TYPICAL_LIVE_ORDERS: usize = 700_000;

/// Result of adding an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    /// Id was already resting; the new order replaced it.
    Duplicate,
    /// Sell side, not tracked.
    Untracked,
    ZeroQty,
}

/// Result of taking quantity off a resting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduction {
    /// Id not resting; nothing changed.
    Unknown,
    Partial { remaining: Qty },
    /// Reached exactly zero and was removed.
    Removed,
    /// More than the resting quantity was requested; order removed.
    Clamped { resting: Qty },
}

/// Resting price and locate of an executed order, plus what happened to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fill {
    pub price: Price,
    pub locate: LocateId,
    pub outcome: Reduction,
}

/// Live buy orders keyed by order id.
///
/// Every resting entry has a positive quantity; anything reduced to zero is
/// removed. Not thread-safe - one owner applies all mutations.
pub struct OrderBook {
    orders: HashMap<OrderId, Order>,
}

impl OrderBook {
    /// Creates empty order book.
    pub fn new() -> Self {
        Self {
            orders: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            orders: HashMap::with_capacity(capacity),
        }
    }

    /// Inserts a buy order; sell orders and zero quantities are not kept.
    pub fn add(
        &mut self,
        locate: LocateId,
        order_id: OrderId,
        side: Side,
        qty: Qty,
        price: Price,
    ) -> AddOutcome {
        if side != Side::Buy {
            return AddOutcome::Untracked;
        }
        if qty == 0 {
            return AddOutcome::ZeroQty;
        }
        match self.orders.insert(order_id, Order::new(price, qty, locate)) {
            Some(_) => AddOutcome::Duplicate,
            None => AddOutcome::Inserted,
        }
    }

    /// Executes `qty` against a resting order.
    ///
    /// Returns the order's resting price and locate, or `None` if the id is
    /// not on the book.
    pub fn execute(&mut self, order_id: OrderId, qty: Qty) -> Option<Fill> {
        let (resting, outcome) = self.reduce(order_id, qty)?;
        Some(Fill {
            price: resting.price,
            locate: resting.locate,
            outcome,
        })
    }

    /// Cancels `qty` shares of a resting order.
    pub fn cancel(&mut self, order_id: OrderId, qty: Qty) -> Reduction {
        self.reduce(order_id, qty)
            .map(|(_, outcome)| outcome)
            .unwrap_or(Reduction::Unknown)
    }

    /// Removes an order whatever its remaining quantity.
    pub fn delete(&mut self, order_id: OrderId) -> Option<Order> {
        self.orders.remove(&order_id)
    }

    /// Swaps `old_id` for `new_id` at a new price and quantity, keeping the
    /// original locate. Nothing is inserted when `old_id` is not resting.
    pub fn replace(
        &mut self,
        old_id: OrderId,
        new_id: OrderId,
        qty: Qty,
        price: Price,
    ) -> Option<Order> {
        let old = self.orders.remove(&old_id)?;
        if qty > 0 {
            self.orders.insert(new_id, Order::new(price, qty, old.locate));
        }
        Some(old)
    }

    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.orders.contains_key(&order_id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Shared quantity path for execute and cancel.
    #[inline]
    fn reduce(&mut self, order_id: OrderId, by: Qty) -> Option<(Order, Reduction)> {
        let order = self.orders.get_mut(&order_id)?;
        let resting = *order;

        let outcome = match resting.qty.checked_sub(by) {
            Some(0) => Reduction::Removed,
            Some(remaining) => {
                order.qty = remaining;
                Reduction::Partial { remaining }
            }
            None => Reduction::Clamped { resting: resting.qty },
        };

        if !matches!(outcome, Reduction::Partial { .. }) {
            self.orders.remove(&order_id);
        }
        Some((resting, outcome))
    }

    pub fn assert_invariants(&self) {
        assert!(
            self.orders.values().all(|o| o.qty > 0),
            "zero qty order resting"
        );
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}
