//! # limit-book
//!
//! The in-memory index behind a limit order book: resting orders kept by
//! price and, within a price, by arrival.
//!
//! ## Architecture
//!
//! - **Types**: [`Order`], [`Side`], handles, [`Execution`], errors
//! - **OrderBook**: order queues, price levels, AVL level trees, the [`Book`]
//!
//! ## Design Principles
//!
//! 1. **Integer units**: prices in ticks, sizes in lots, no floating point
//! 2. **Arena storage**: orders and levels in slabs, links are checked handles
//! 3. **Single writer**: every operation takes `&mut self` and runs to completion
//! 4. **Price-time priority**: best price first, then FIFO within a level
//!
//! ## Example
//!
//! ```
//! use limit_book::{Book, Order, Side};
//!
//! let mut book = Book::new();
//! book.submit(Order::new(1, Side::Buy, 30, 10)).unwrap();
//! book.submit(Order::new(2, Side::Buy, 20, 10)).unwrap();
//!
//! let execution = book.execute_at_best(Side::Buy, 40).unwrap();
//! assert_eq!(execution.summary(), (40, 10));
//! assert_eq!(book.volume_at(Side::Buy, 10), 10);
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types: Order, Side, handles, errors
pub mod types;

/// Order queues, price levels, level trees and the book
pub mod orderbook;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use orderbook::{Book, Limit, LimitTree, OrderQueue, Placement};
pub use types::{
    AuditError, BookError, Count, Execution, LimitKey, Order, OrderKey, Price, Side, Size,
    Timestamp, Uid, Volume,
};
