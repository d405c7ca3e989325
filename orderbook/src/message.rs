//! Message kinds and typed decoding.
//!
//! Offsets are into the full message, where byte 0 is the type byte. Wire
//! lengths are the TotalView-ITCH 5.0 fixed message sizes; a message shorter
//! than its kind's length is rejected before any field is read.

use serde::Serialize;

use crate::types::{LocateId, OrderId, Price, Qty, Side, Symbol, Timestamp};
use crate::wire::{
    put_u16, put_u32, put_u48, put_u64, read_array, read_u16, read_u32, read_u48, read_u64,
    read_u8, DecodeError,
};

/// Every message type the dispatcher recognizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum MessageKind {
    SystemEvent,
    StockDirectory,
    AddOrder,
    AddOrderAttributed,
    OrderExecuted,
    OrderExecutedWithPrice,
    OrderCancel,
    OrderDelete,
    OrderReplace,
    NonCrossTrade,
    CrossTrade,
    BrokenTrade,
}

impl MessageKind {
    pub const ALL: [MessageKind; 12] = [
        MessageKind::SystemEvent,
        MessageKind::StockDirectory,
        MessageKind::AddOrder,
        MessageKind::AddOrderAttributed,
        MessageKind::OrderExecuted,
        MessageKind::OrderExecutedWithPrice,
        MessageKind::OrderCancel,
        MessageKind::OrderDelete,
        MessageKind::OrderReplace,
        MessageKind::NonCrossTrade,
        MessageKind::CrossTrade,
        MessageKind::BrokenTrade,
    ];

    pub fn type_byte(self) -> u8 {
        match self {
            MessageKind::SystemEvent => b'S',
            MessageKind::StockDirectory => b'R',
            MessageKind::AddOrder => b'A',
            MessageKind::AddOrderAttributed => b'F',
            MessageKind::OrderExecuted => b'E',
            MessageKind::OrderExecutedWithPrice => b'C',
            MessageKind::OrderCancel => b'X',
            MessageKind::OrderDelete => b'D',
            MessageKind::OrderReplace => b'U',
            MessageKind::NonCrossTrade => b'P',
            MessageKind::CrossTrade => b'Q',
            MessageKind::BrokenTrade => b'B',
        }
    }

    /// Fixed wire length, type byte included.
    pub fn wire_len(self) -> usize {
        match self {
            MessageKind::SystemEvent => 12,
            MessageKind::StockDirectory => 39,
            MessageKind::AddOrder => 36,
            MessageKind::AddOrderAttributed => 40,
            MessageKind::OrderExecuted => 31,
            MessageKind::OrderExecutedWithPrice => 36,
            MessageKind::OrderCancel => 23,
            MessageKind::OrderDelete => 19,
            MessageKind::OrderReplace => 35,
            MessageKind::NonCrossTrade => 44,
            MessageKind::CrossTrade => 40,
            MessageKind::BrokenTrade => 19,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            MessageKind::SystemEvent => "system_event",
            MessageKind::StockDirectory => "stock_directory",
            MessageKind::AddOrder => "add_order",
            MessageKind::AddOrderAttributed => "add_order_mpid",
            MessageKind::OrderExecuted => "order_executed",
            MessageKind::OrderExecutedWithPrice => "order_executed_with_price",
            MessageKind::OrderCancel => "order_cancel",
            MessageKind::OrderDelete => "order_delete",
            MessageKind::OrderReplace => "order_replace",
            MessageKind::NonCrossTrade => "trade",
            MessageKind::CrossTrade => "cross_trade",
            MessageKind::BrokenTrade => "broken_trade",
        }
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = DecodeError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        MessageKind::ALL
            .into_iter()
            .find(|k| k.type_byte() == b)
            .ok_or(DecodeError::UnknownMessageType(b))
    }
}

/// System event codes; only end-of-system-hours changes session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SystemEventCode {
    StartOfMessages,
    StartOfSystemHours,
    StartOfMarketHours,
    EndOfMarketHours,
    EndOfSystemHours,
    EndOfMessages,
    Other(u8),
}

impl SystemEventCode {
    pub fn from_byte(b: u8) -> Self {
        match b {
            b'O' => SystemEventCode::StartOfMessages,
            b'S' => SystemEventCode::StartOfSystemHours,
            b'Q' => SystemEventCode::StartOfMarketHours,
            b'M' => SystemEventCode::EndOfMarketHours,
            b'E' => SystemEventCode::EndOfSystemHours,
            b'C' => SystemEventCode::EndOfMessages,
            other => SystemEventCode::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            SystemEventCode::StartOfMessages => b'O',
            SystemEventCode::StartOfSystemHours => b'S',
            SystemEventCode::StartOfMarketHours => b'Q',
            SystemEventCode::EndOfMarketHours => b'M',
            SystemEventCode::EndOfSystemHours => b'E',
            SystemEventCode::EndOfMessages => b'C',
            SystemEventCode::Other(b) => b,
        }
    }

    /// Marks the end of the trading day for snapshot scheduling.
    pub fn ends_session(self) -> bool {
        self == SystemEventCode::EndOfSystemHours
    }
}

/// A decoded message; one variant per [`MessageKind`] (both add kinds share
/// `AddOrder`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Message {
    SystemEvent {
        timestamp: Timestamp,
        code: SystemEventCode,
    },
    StockDirectory {
        locate: LocateId,
        symbol: Symbol,
    },
    AddOrder {
        locate: LocateId,
        timestamp: Timestamp,
        order_id: OrderId,
        side: Side,
        qty: Qty,
        price: Price,
        attributed: bool,
    },
    OrderExecuted {
        locate: LocateId,
        timestamp: Timestamp,
        order_id: OrderId,
        qty: Qty,
    },
    OrderExecutedWithPrice {
        locate: LocateId,
        timestamp: Timestamp,
        order_id: OrderId,
        qty: Qty,
        price: Price,
        printable: bool,
    },
    OrderCancel {
        order_id: OrderId,
        qty: Qty,
    },
    OrderDelete {
        order_id: OrderId,
    },
    OrderReplace {
        locate: LocateId,
        old_order_id: OrderId,
        new_order_id: OrderId,
        qty: Qty,
        price: Price,
    },
    NonCrossTrade,
    CrossTrade,
    BrokenTrade,
}

impl Message {
    /// Decodes `bytes` (type byte at offset 0) as a message of `kind`.
    pub fn decode(kind: MessageKind, bytes: &[u8]) -> Result<Message, DecodeError> {
        let expected = kind.wire_len();
        if bytes.len() < expected {
            return Err(DecodeError::MalformedMessage {
                kind,
                expected,
                actual: bytes.len(),
            });
        }

        let msg = match kind {
            MessageKind::SystemEvent => Message::SystemEvent {
                timestamp: read_u48(bytes, 5)?,
                code: SystemEventCode::from_byte(read_u8(bytes, 11)?),
            },
            MessageKind::StockDirectory => Message::StockDirectory {
                locate: read_u16(bytes, 1)?,
                symbol: Symbol::from_bytes(read_array(bytes, 11)?),
            },
            MessageKind::AddOrder | MessageKind::AddOrderAttributed => {
                let side_byte = read_u8(bytes, 19)?;
                Message::AddOrder {
                    locate: read_u16(bytes, 1)?,
                    timestamp: read_u48(bytes, 5)?,
                    order_id: OrderId(read_u64(bytes, 11)?),
                    side: Side::from_byte(side_byte).ok_or(DecodeError::InvalidSide(side_byte))?,
                    qty: read_u32(bytes, 20)?,
                    price: read_u32(bytes, 32)?,
                    attributed: kind == MessageKind::AddOrderAttributed,
                }
            }
            MessageKind::OrderExecuted => Message::OrderExecuted {
                locate: read_u16(bytes, 1)?,
                timestamp: read_u48(bytes, 5)?,
                order_id: OrderId(read_u64(bytes, 11)?),
                qty: read_u32(bytes, 19)?,
            },
            MessageKind::OrderExecutedWithPrice => Message::OrderExecutedWithPrice {
                locate: read_u16(bytes, 1)?,
                timestamp: read_u48(bytes, 5)?,
                order_id: OrderId(read_u64(bytes, 11)?),
                qty: read_u32(bytes, 19)?,
                printable: read_u8(bytes, 31)? != b'N',
                price: read_u32(bytes, 32)?,
            },
            MessageKind::OrderCancel => Message::OrderCancel {
                order_id: OrderId(read_u64(bytes, 11)?),
                qty: read_u32(bytes, 19)?,
            },
            MessageKind::OrderDelete => Message::OrderDelete {
                order_id: OrderId(read_u64(bytes, 11)?),
            },
            MessageKind::OrderReplace => Message::OrderReplace {
                locate: read_u16(bytes, 1)?,
                old_order_id: OrderId(read_u64(bytes, 11)?),
                new_order_id: OrderId(read_u64(bytes, 19)?),
                qty: read_u32(bytes, 27)?,
                price: read_u32(bytes, 31)?,
            },
            MessageKind::NonCrossTrade => Message::NonCrossTrade,
            MessageKind::CrossTrade => Message::CrossTrade,
            MessageKind::BrokenTrade => Message::BrokenTrade,
        };

        Ok(msg)
    }

    /// Decodes a message whose kind is taken from its first byte.
    pub fn decode_raw(bytes: &[u8]) -> Result<Message, DecodeError> {
        let type_byte = *bytes.first().ok_or(DecodeError::Empty)?;
        Message::decode(MessageKind::try_from(type_byte)?, bytes)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::SystemEvent { .. } => MessageKind::SystemEvent,
            Message::StockDirectory { .. } => MessageKind::StockDirectory,
            Message::AddOrder { attributed: false, .. } => MessageKind::AddOrder,
            Message::AddOrder { attributed: true, .. } => MessageKind::AddOrderAttributed,
            Message::OrderExecuted { .. } => MessageKind::OrderExecuted,
            Message::OrderExecutedWithPrice { .. } => MessageKind::OrderExecutedWithPrice,
            Message::OrderCancel { .. } => MessageKind::OrderCancel,
            Message::OrderDelete { .. } => MessageKind::OrderDelete,
            Message::OrderReplace { .. } => MessageKind::OrderReplace,
            Message::NonCrossTrade => MessageKind::NonCrossTrade,
            Message::CrossTrade => MessageKind::CrossTrade,
            Message::BrokenTrade => MessageKind::BrokenTrade,
        }
    }

    /// Timestamp that advances the session clock, if this kind carries one.
    pub fn timestamp(&self) -> Option<Timestamp> {
        match *self {
            Message::SystemEvent { timestamp, .. }
            | Message::AddOrder { timestamp, .. }
            | Message::OrderExecuted { timestamp, .. }
            | Message::OrderExecutedWithPrice { timestamp, .. } => Some(timestamp),
            _ => None,
        }
    }

    /// Encodes to the full wire length of the kind. Fields the decoder does
    /// not read are zero.
    pub fn encode(&self) -> Vec<u8> {
        let kind = self.kind();
        let mut buf = vec![0u8; kind.wire_len()];
        buf[0] = kind.type_byte();

        match *self {
            Message::SystemEvent { timestamp, code } => {
                put_u48(&mut buf, 5, timestamp);
                buf[11] = code.as_byte();
            }
            Message::StockDirectory { locate, symbol } => {
                put_u16(&mut buf, 1, locate);
                buf[11..19].copy_from_slice(symbol.as_bytes());
            }
            Message::AddOrder {
                locate,
                timestamp,
                order_id,
                side,
                qty,
                price,
                ..
            } => {
                put_u16(&mut buf, 1, locate);
                put_u48(&mut buf, 5, timestamp);
                put_u64(&mut buf, 11, order_id.0);
                buf[19] = side.as_byte();
                put_u32(&mut buf, 20, qty);
                put_u32(&mut buf, 32, price);
            }
            Message::OrderExecuted {
                locate,
                timestamp,
                order_id,
                qty,
            } => {
                put_u16(&mut buf, 1, locate);
                put_u48(&mut buf, 5, timestamp);
                put_u64(&mut buf, 11, order_id.0);
                put_u32(&mut buf, 19, qty);
            }
            Message::OrderExecutedWithPrice {
                locate,
                timestamp,
                order_id,
                qty,
                price,
                printable,
            } => {
                put_u16(&mut buf, 1, locate);
                put_u48(&mut buf, 5, timestamp);
                put_u64(&mut buf, 11, order_id.0);
                put_u32(&mut buf, 19, qty);
                buf[31] = if printable { b'Y' } else { b'N' };
                put_u32(&mut buf, 32, price);
            }
            Message::OrderCancel { order_id, qty } => {
                put_u64(&mut buf, 11, order_id.0);
                put_u32(&mut buf, 19, qty);
            }
            Message::OrderDelete { order_id } => {
                put_u64(&mut buf, 11, order_id.0);
            }
            Message::OrderReplace {
                locate,
                old_order_id,
                new_order_id,
                qty,
                price,
            } => {
                put_u16(&mut buf, 1, locate);
                put_u64(&mut buf, 11, old_order_id.0);
                put_u64(&mut buf, 19, new_order_id.0);
                put_u32(&mut buf, 27, qty);
                put_u32(&mut buf, 31, price);
            }
            Message::NonCrossTrade | Message::CrossTrade | Message::BrokenTrade => {}
        }

        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_order_offsets() {
        // hand-built 'A' message, fields at their documented offsets
        let mut raw = [0u8; 36];
        raw[0] = b'A';
        raw[1..3].copy_from_slice(&5u16.to_be_bytes());
        raw[5..11].copy_from_slice(&[0x00, 0x00, 0x1f, 0x1a, 0x1b, 0x1c]);
        raw[11..19].copy_from_slice(&100u64.to_be_bytes());
        raw[19] = b'B';
        raw[20..24].copy_from_slice(&500u32.to_be_bytes());
        raw[24..32].copy_from_slice(b"AAPL    ");
        raw[32..36].copy_from_slice(&12_300u32.to_be_bytes());

        let msg = Message::decode_raw(&raw).unwrap();
        assert_eq!(
            msg,
            Message::AddOrder {
                locate: 5,
                timestamp: 0x1f1a_1b1c,
                order_id: OrderId(100),
                side: Side::Buy,
                qty: 500,
                price: 12_300,
                attributed: false,
            }
        );
    }

    #[test]
    fn replace_offsets() {
        let mut raw = [0u8; 35];
        raw[0] = b'U';
        raw[1..3].copy_from_slice(&7u16.to_be_bytes());
        raw[11..19].copy_from_slice(&300u64.to_be_bytes());
        raw[19..27].copy_from_slice(&301u64.to_be_bytes());
        raw[27..31].copy_from_slice(&150u32.to_be_bytes());
        raw[31..35].copy_from_slice(&900u32.to_be_bytes());

        assert_eq!(
            Message::decode(MessageKind::OrderReplace, &raw).unwrap(),
            Message::OrderReplace {
                locate: 7,
                old_order_id: OrderId(300),
                new_order_id: OrderId(301),
                qty: 150,
                price: 900,
            }
        );
    }

    #[test]
    fn undersized_message_is_malformed() {
        let full = Message::OrderExecuted {
            locate: 1,
            timestamp: 10,
            order_id: OrderId(9),
            qty: 3,
        }
        .encode();

        let err = Message::decode(MessageKind::OrderExecuted, &full[..20]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MalformedMessage {
                kind: MessageKind::OrderExecuted,
                expected: 31,
                actual: 20,
            }
        );
    }

    #[test]
    fn unknown_and_empty() {
        assert_eq!(Message::decode_raw(&[]), Err(DecodeError::Empty));
        assert_eq!(
            Message::decode_raw(&[b'Z', 0, 0]),
            Err(DecodeError::UnknownMessageType(b'Z'))
        );
    }

    #[test]
    fn bad_side_rejected() {
        let mut raw = Message::AddOrder {
            locate: 1,
            timestamp: 1,
            order_id: OrderId(1),
            side: Side::Buy,
            qty: 1,
            price: 1,
            attributed: false,
        }
        .encode();
        raw[19] = b'?';
        assert_eq!(Message::decode_raw(&raw), Err(DecodeError::InvalidSide(b'?')));
    }

    #[test]
    fn trade_reports_decode_to_no_op_variants() {
        let kinds = [
            MessageKind::NonCrossTrade,
            MessageKind::CrossTrade,
            MessageKind::BrokenTrade,
        ];
        for kind in kinds {
            let mut raw = vec![0u8; kind.wire_len()];
            raw[0] = kind.type_byte();
            let msg = Message::decode_raw(&raw).unwrap();
            assert_eq!(msg.kind(), kind);
            assert_eq!(msg.timestamp(), None);
        }
    }

    #[test]
    fn execute_with_price_printable_flag() {
        let msg = Message::OrderExecutedWithPrice {
            locate: 2,
            timestamp: 77,
            order_id: OrderId(5),
            qty: 10,
            price: 4_200,
            printable: false,
        };
        let raw = msg.encode();
        assert_eq!(raw.len(), 36);
        assert_eq!(raw[31], b'N');
        assert_eq!(Message::decode_raw(&raw).unwrap(), msg);
    }

    #[test]
    fn attributed_add_keeps_kind() {
        let msg = Message::AddOrder {
            locate: 3,
            timestamp: 5,
            order_id: OrderId(11),
            side: Side::Sell,
            qty: 20,
            price: 1_000,
            attributed: true,
        };
        let raw = msg.encode();
        assert_eq!(raw[0], b'F');
        assert_eq!(raw.len(), 40);
        assert_eq!(Message::decode_raw(&raw).unwrap().kind(), MessageKind::AddOrderAttributed);
    }

    #[test]
    fn kind_table_is_consistent() {
        for (i, kind) in MessageKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(MessageKind::try_from(kind.type_byte()).unwrap(), *kind);
        }
    }

    #[test]
    fn system_event_end_of_day() {
        let raw = Message::SystemEvent {
            timestamp: 57_600_000_000_000,
            code: SystemEventCode::EndOfSystemHours,
        }
        .encode();
        assert_eq!(raw[11], b'E');
        match Message::decode_raw(&raw).unwrap() {
            Message::SystemEvent { timestamp, code } => {
                assert_eq!(timestamp, 57_600_000_000_000);
                assert!(code.ends_session());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
