//! ITCH VWAP Performance Lab
//!
//! Runs decode and session latency tests over a synthetic ITCH stream,
//! followed by a short replay demo printing one hourly VWAP snapshot.

use orderbook::clock::{format_hms, NANOS_PER_HOUR};
use orderbook::{Message, OrderId, SecuritySnapshot, Session, SessionConfig, Side, Symbol};


fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    println!("=== ITCH VWAP Performance Lab ===");

    latency_test::run_latency_tests();
    latency_test::run_throughput_test(10);

    println!("\n=== 1-Minute Sustained Throughput Test ===");
    latency_test::run_throughput_test(60);

    println!("\n=== Basic Demo ===");
    run_basic_demo();
}

/// Two buy orders on AAPL, three executions, then the 04:00 snapshot.
fn run_basic_demo() {
    let mut session = Session::new(SessionConfig::default());
    let mut snapshots: Vec<SecuritySnapshot> = Vec::new();
    let t0 = 4 * NANOS_PER_HOUR - 1_000;

    let msgs = [
        Message::StockDirectory {
            locate: 1,
            symbol: Symbol::new("AAPL"),
        },
        add(1, 1_500_000, 100, t0),
        add(2, 1_495_000, 50, t0 + 1),
        Message::OrderExecuted {
            locate: 1,
            timestamp: t0 + 2,
            order_id: OrderId(1),
            qty: 60,
        },
        Message::OrderExecutedWithPrice {
            locate: 1,
            timestamp: t0 + 3,
            order_id: OrderId(2),
            qty: 50,
            price: 1_496_000,
            printable: true,
        },
        Message::OrderExecuted {
            locate: 1,
            timestamp: 4 * NANOS_PER_HOUR,
            order_id: OrderId(1),
            qty: 40,
        },
    ];

    for msg in &msgs {
        println!("Handling {:?}", msg.kind());
        if let Err(err) = session.handle_raw(&msg.encode()) {
            println!("  rejected: {err}");
        }
        session.poll_snapshots(&mut snapshots);
    }

    for snap in &snapshots {
        let vwap = snap.vwap();
        println!(
            "{} {} fills={} volume={} vwap={:?}",
            format_hms(snap.boundary.at),
            snap.symbol,
            vwap.fills,
            vwap.volume,
            vwap.price()
        );
    }
    println!("Resting orders: {}", session.book().len());
}

fn add(id: u64, price: u32, qty: u32, ts: u64) -> Message {
    Message::AddOrder {
        locate: 1,
        timestamp: ts,
        order_id: OrderId(id),
        side: Side::Buy,
        qty,
        price,
        attributed: false,
    }
}
