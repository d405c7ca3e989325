use serde::Serialize;

use crate::types::{Order, Price, Qty};

/// Prices carry four implied decimal places.
pub const PRICE_SCALE: u64 = 10_000;

/// Running Σ(price×qty) and Σ(qty) over a set of fills.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Vwap {
    pub notional: u128,
    pub volume: u64,
    pub fills: u64,
}

impl Vwap {
    pub fn from_records(records: &[Order]) -> Self {
        let mut v = Vwap::default();
        for r in records {
            v.push(r.price, r.qty);
        }
        v
    }

    #[inline]
    pub fn push(&mut self, price: Price, qty: Qty) {
        self.notional += price as u128 * qty as u128;
        self.volume += qty as u64;
        self.fills += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.volume == 0
    }

    /// VWAP in price ticks, rounded half up. `None` without volume.
    pub fn price_ticks(&self) -> Option<u64> {
        if self.volume == 0 {
            return None;
        }
        let volume = self.volume as u128;
        Some(((self.notional + volume / 2) / volume) as u64)
    }

    /// VWAP in currency units.
    pub fn price(&self) -> Option<f64> {
        if self.volume == 0 {
            return None;
        }
        Some(self.notional as f64 / self.volume as f64 / PRICE_SCALE as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_by_quantity() {
        let records = [Order::new(100_0000, 100, 1), Order::new(110_0000, 300, 1)];
        let v = Vwap::from_records(&records);
        assert_eq!(v.volume, 400);
        assert_eq!(v.fills, 2);
        assert_eq!(v.price_ticks(), Some(107_5000));
        assert!((v.price().unwrap() - 107.5).abs() < 1e-9);
    }

    #[test]
    fn empty_has_no_price() {
        let v = Vwap::from_records(&[]);
        assert!(v.is_empty());
        assert_eq!(v.price(), None);
        assert_eq!(v.price_ticks(), None);
    }

    #[test]
    fn large_notional_does_not_overflow() {
        let mut v = Vwap::default();
        for _ in 0..1_000 {
            v.push(u32::MAX, u32::MAX);
        }
        assert_eq!(v.price_ticks(), Some(u32::MAX as u64));
    }
}
