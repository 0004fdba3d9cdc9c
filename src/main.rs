//! limit-book - demo binary
//!
//! Builds a small book, walks it through submit, execute and cancel, and
//! prints the state root. Set `RUST_LOG=limit_book=trace` to see the
//! library's events.

use limit_book::{Book, BookError, Order, Side};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), BookError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("===========================================");
    println!("  limit-book");
    println!("===========================================");
    println!();

    let mut book = Book::with_capacity(64, 16);

    let resting = [
        Order::new(1, Side::Buy, 100, 5746).with_arrival(1_000_000_001),
        Order::new(2, Side::Buy, 30, 5745).with_arrival(1_000_000_002),
        Order::new(3, Side::Buy, 20, 5746).with_arrival(1_000_000_003),
        Order::new(4, Side::Sell, 75, 5748).with_arrival(1_000_000_004),
        Order::new(5, Side::Sell, 40, 5750).with_arrival(1_000_000_005),
    ];
    for order in resting {
        book.submit(order)?;
    }
    print_book(&book);

    // A marketable sell for 110 lots takes from the best bids
    println!("Executing 110 against the bids...");
    for mut execution in book.sweep(Side::Buy, 110) {
        execution.stamp(1_000_000_010);
        println!(
            "  {} @ {}: {} filled, partial: {:?}",
            execution.filled,
            execution.price,
            execution.completed.len(),
            execution.partial.map(|key| key.uid())
        );
        if let Some(key) = execution.partial {
            book.stamp_execution(key, 1_000_000_010)?;
        }
    }
    println!();

    let cancelled = book.cancel_uid(5)?;
    println!("Cancelled order {} ({} @ {})", cancelled.uid, cancelled.size, cancelled.price);
    println!();

    print_book(&book);
    println!("State root: {}", book.state_root_hex());

    Ok(())
}

fn print_book(book: &Book) {
    println!("Asks (best first):");
    for limit in book.depth(Side::Sell) {
        println!("  {:>6} x {:>4} ({} orders)", limit.key(), limit.volume(), limit.size());
    }
    println!("Bids (best first):");
    for limit in book.depth(Side::Buy) {
        println!("  {:>6} x {:>4} ({} orders)", limit.key(), limit.volume(), limit.size());
    }
    println!("Spread: {:?}", book.spread());
    println!();
}
