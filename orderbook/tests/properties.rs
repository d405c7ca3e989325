use orderbook::{Message, OrderId, SecuritySnapshot, Session, SessionConfig, Side, Symbol};
use proptest::prelude::*;

proptest! {
    #[test]
    fn book_never_holds_zero_qty(msgs in prop::collection::vec(any_message(), 1..5000)) {
        let mut s = Session::new(SessionConfig { book_capacity: 1024, ..SessionConfig::default() });
        let mut sink: Vec<SecuritySnapshot> = Vec::new();
        s.register_security(1, Symbol::new("AAPL"));
        s.register_security(2, Symbol::new("MSFT"));

        for msg in msgs {
            s.apply(msg);
            s.poll_snapshots(&mut sink);
        }
        s.book().assert_invariants();
    }

    /// Every ledger record traces back to an execution of a buy order.
    #[test]
    fn ledger_only_grows_on_execution(msgs in prop::collection::vec(any_message(), 1..2000)) {
        let mut s = Session::new(SessionConfig { book_capacity: 1024, ..SessionConfig::default() });
        s.register_security(1, Symbol::new("AAPL"));

        let mut expected = 0u64;
        for msg in msgs {
            let before = s.ledger().total_records();
            let executes = matches!(
                msg,
                Message::OrderExecuted { order_id, .. }
                    | Message::OrderExecutedWithPrice { order_id, .. }
                    if s.book().contains(order_id)
            );
            s.apply(msg);
            if executes {
                expected += 1;
            }
            prop_assert!(s.ledger().total_records() >= before);
        }
        prop_assert_eq!(s.ledger().total_records(), expected);
    }
}

fn any_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        (1u16..3, 1u64..200, any_side(), 0u32..500, 1u32..1_000_000, 0u64..1_000)
            .prop_map(|(locate, oid, side, qty, price, ts)| Message::AddOrder {
                locate,
                timestamp: ts,
                order_id: OrderId(oid),
                side,
                qty,
                price,
                attributed: false,
            }),

        (1u64..200, 0u32..600).prop_map(|(oid, qty)| Message::OrderExecuted {
            locate: 0,
            timestamp: 0,
            order_id: OrderId(oid),
            qty,
        }),

        (1u64..200, 0u32..600, 1u32..1_000_000).prop_map(|(oid, qty, price)| {
            Message::OrderExecutedWithPrice {
                locate: 0,
                timestamp: 0,
                order_id: OrderId(oid),
                qty,
                price,
                printable: true,
            }
        }),

        (1u64..200, 0u32..600).prop_map(|(oid, qty)| Message::OrderCancel {
            order_id: OrderId(oid),
            qty,
        }),

        (1u64..200).prop_map(|oid| Message::OrderDelete { order_id: OrderId(oid) }),

        (1u64..200, 1u64..200, 0u32..500, 1u32..1_000_000).prop_map(|(old, new, qty, price)| {
            Message::OrderReplace {
                locate: 1,
                old_order_id: OrderId(old),
                new_order_id: OrderId(new),
                qty,
                price,
            }
        }),
    ]
}

fn any_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}
