//! Per-locate log of realized fills, the input to VWAP.

use crate::directory::LOCATE_SLOTS;
use crate::types::{LocateId, Order, Price, Qty};

/// Default per-locate capacity reserved on registration.
pub const DEFAULT_RESERVE: usize = 1 << 5;

pub struct ExecutionLedger {
    fills: Vec<Vec<Order>>,
    reserve: usize,
    total: u64,
}

impl ExecutionLedger {
    pub fn new(reserve: usize) -> Self {
        Self {
            fills: vec![Vec::new(); LOCATE_SLOTS],
            reserve,
            total: 0,
        }
    }

    /// Empties the locate's log and reserves the configured capacity.
    pub fn reset(&mut self, locate: LocateId) {
        let slot = &mut self.fills[locate as usize];
        self.total -= slot.len() as u64;
        *slot = Vec::with_capacity(self.reserve);
    }

    /// Appends one fill; insertion order is event order.
    #[inline]
    pub fn append(&mut self, locate: LocateId, price: Price, qty: Qty) {
        self.fills[locate as usize].push(Order::new(price, qty, locate));
        self.total += 1;
    }

    pub fn records(&self, locate: LocateId) -> &[Order] {
        &self.fills[locate as usize]
    }

    pub fn len(&self, locate: LocateId) -> usize {
        self.fills[locate as usize].len()
    }

    /// Fills held across all locates.
    pub fn total_records(&self) -> u64 {
        self.total
    }

    pub fn clear_all(&mut self) {
        self.fills.iter_mut().for_each(Vec::clear);
        self.total = 0;
    }
}

impl Default for ExecutionLedger {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut ledger = ExecutionLedger::default();
        ledger.append(3, 100, 10);
        ledger.append(3, 101, 20);
        ledger.append(4, 50, 1);

        let prices: Vec<Price> = ledger.records(3).iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![100, 101]);
        assert_eq!(ledger.records(3)[1], Order::new(101, 20, 3));
        assert_eq!(ledger.len(4), 1);
        assert_eq!(ledger.total_records(), 3);
    }

    #[test]
    fn reset_reserves_and_empties() {
        let mut ledger = ExecutionLedger::new(32);
        ledger.append(1, 1, 1);
        ledger.reset(1);
        assert!(ledger.records(1).is_empty());
        assert!(ledger.fills[1].capacity() >= 32);
        assert_eq!(ledger.total_records(), 0);
    }

    #[test]
    fn clear_all_empties_every_locate() {
        let mut ledger = ExecutionLedger::default();
        ledger.append(2, 10, 5);
        ledger.append(8, 12, 5);
        ledger.clear_all();
        assert!(ledger.records(2).is_empty());
        assert!(ledger.records(8).is_empty());
        assert_eq!(ledger.total_records(), 0);
    }
}
