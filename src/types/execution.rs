//! Result of consuming volume at one price level.

use super::{Order, OrderKey, Price, Side, Volume};

/// Volume removed from the front of a single price level.
///
/// ## Ownership
///
/// Orders that were filled completely have left the book; they are handed
/// back by value with every link cleared, so the caller can stamp their
/// `execution` time and keep them. An order that was only partially filled
/// stays resident at the head of its queue and is reported by handle.
///
/// ## Example
///
/// ```
/// use limit_book::{Book, Order, Side};
///
/// let mut book = Book::new();
/// book.submit(Order::new(1, Side::Buy, 30, 10)).unwrap();
/// book.submit(Order::new(2, Side::Buy, 20, 10)).unwrap();
///
/// let execution = book.execute_at_best(Side::Buy, 40).unwrap();
/// assert_eq!((execution.filled, execution.price), (40, 10));
/// assert_eq!(execution.completed.len(), 1);
/// assert_eq!(execution.partial.map(|key| key.uid()), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Side of the level that was consumed
    pub side: Side,

    /// Price of the level
    pub price: Price,

    /// Quantity actually executed
    pub filled: Volume,

    /// Fully filled orders, in the order they were consumed
    pub completed: Vec<Order>,

    /// Order left partially filled at the head of the level
    pub partial: Option<OrderKey>,
}

impl Execution {
    /// Create an empty execution at `price`
    pub fn new(side: Side, price: Price) -> Self {
        Self {
            side,
            price,
            filled: 0,
            completed: Vec::new(),
            partial: None,
        }
    }

    /// Nothing was executed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// The `(filled_qty, price)` pair
    #[inline]
    pub fn summary(&self) -> (Volume, Price) {
        (self.filled, self.price)
    }

    /// Record the caller's fill time on every completed order.
    pub fn stamp(&mut self, timestamp: u64) {
        for order in &mut self.completed {
            order.execution = timestamp;
        }
    }
}
