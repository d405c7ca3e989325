use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Feed-assigned security identifier, valid for one session.
pub type LocateId = u16;
/// Price with 4 implied decimal places.
pub type Price = u32;
/// Share quantity.
pub type Qty = u32;
/// Nanoseconds since midnight (48-bit on the wire).
pub type Timestamp = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Buy/sell indicator byte as carried in add-order messages.
    pub fn from_byte(b: u8) -> Option<Side> {
        match b {
            b'B' => Some(Side::Buy),
            b'S' => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Side::Buy => b'B',
            Side::Sell => b'S',
        }
    }
}

/// A resting buy order, or one realized fill once it sits in the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub price: Price,
    pub qty: Qty,      // decremented in place while resting
    pub locate: LocateId,
}

impl Order {
    pub fn new(price: Price, qty: Qty, locate: LocateId) -> Self {
        Self { price, qty, locate }
    }
}

/// Eight-byte ASCII ticker, space padded on the right as the feed sends it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol([u8; Symbol::LEN]);

impl Symbol {
    pub const LEN: usize = 8;

    pub fn from_bytes(raw: [u8; Symbol::LEN]) -> Self {
        Self(raw)
    }

    /// Pads (or truncates) `s` to the eight-byte wire form.
    pub fn new(s: &str) -> Self {
        let mut raw = [b' '; Symbol::LEN];
        for (dst, src) in raw.iter_mut().zip(s.bytes()) {
            *dst = src;
        }
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; Symbol::LEN] {
        &self.0
    }

    /// Ticker with trailing padding removed. Non-UTF-8 bytes yield "".
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0)
            .map(|s| s.trim_end_matches(' '))
            .unwrap_or("")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let s = String::deserialize(de)?;
        if s.len() > Symbol::LEN {
            return Err(serde::de::Error::custom("symbol longer than 8 bytes"));
        }
        Ok(Symbol::new(&s))
    }
}
