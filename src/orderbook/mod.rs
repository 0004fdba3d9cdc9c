//! Price-time priority index for resting orders.
//!
//! ## Architecture
//!
//! - **Slab storage**: orders and levels live in arenas, links are handles
//! - **Order queues**: intrusive FIFO per price level
//! - **Limit trees**: AVL trees of price levels, one per side
//!
//! ## Components
//!
//! - [`OrderQueue`]: Doubly-linked list of orders at one price
//! - [`Limit`]: Price level node with aggregate count and volume
//! - [`LimitTree`]: Balanced tree of levels for one side
//! - [`Book`]: Both sides plus the order-level operations
//!
//! ## Performance
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | Submit at a new price | O(log M) |
//! | Submit at an existing price | O(log M) |
//! | Cancel | O(1), O(log M) when the level empties |
//! | Best bid/ask | O(1) |
//! | Execute at best | O(k), plus O(log M) when the level empties |
//!
//! M is the number of price levels on the side, k the orders filled.

pub mod queue;
pub mod limit;
pub mod tree;
pub mod book;

pub use queue::{OrderQueue, QueueIter};
pub use limit::{LevelFill, Limit};
pub use tree::{Levels, LimitTree, Placement};
pub use book::Book;
