//! Order types for the limit order book.
//!
//! ## Integer Units
//!
//! Prices are integer ticks and sizes integer lots. Nothing in the book
//! touches floating point, so aggregates never drift.
//!
//! ## Links
//!
//! An [`Order`] carries the intrusive links of its price level's queue
//! (`prev`, `next`) and a back-reference to the level itself (`limit`).
//! These are only ever written by the book; callers read them through
//! accessors. A detached order always has all three cleared.

use std::ops::Not;

use super::{LimitKey, OrderKey, Price, Size, Timestamp, Uid};

// ============================================================================
// Side enum
// ============================================================================

/// Order side: Buy or Sell
///
/// Defaults to `Sell` so a default-constructed [`Order`] is never mistaken
/// for a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    /// Buy order (bid)
    Buy,
    /// Sell order (ask)
    #[default]
    Sell,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// `!side` is the side a resting order would match against.
///
/// ```
/// use limit_book::Side;
///
/// assert_eq!(!Side::Buy, Side::Sell);
/// assert_eq!(!Side::Sell, Side::Buy);
/// ```
impl Not for Side {
    type Output = Side;

    #[inline]
    fn not(self) -> Side {
        self.opposite()
    }
}

// ============================================================================
// Order struct
// ============================================================================

/// A resting limit order.
///
/// ## Example
///
/// ```
/// use limit_book::{Order, Side};
///
/// let order = Order::new(5, Side::Buy, 100, 5746).with_arrival(1_000_000_001);
///
/// assert_eq!(order.arrival, 1_000_000_001);
/// assert_eq!(order.execution, 0);
/// assert!(order.limit().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Order {
    /// Caller-assigned identifier, unique among resident orders
    pub uid: Uid,

    /// Buy or Sell
    pub side: Side,

    /// Remaining quantity, reduced as fills occur
    pub size: Size,

    /// Limit price in ticks
    pub price: Price,

    /// Arrival timestamp (supplied by the caller)
    pub arrival: Timestamp,

    /// Timestamp of the last fill, 0 until one occurs
    pub execution: Timestamp,

    pub(crate) prev: Option<OrderKey>,
    pub(crate) next: Option<OrderKey>,
    pub(crate) limit: Option<LimitKey>,
}

impl Order {
    /// Create an unlinked order with no timestamps.
    pub fn new(uid: Uid, side: Side, size: Size, price: Price) -> Self {
        Self {
            uid,
            side,
            size,
            price,
            ..Self::default()
        }
    }

    /// Set the arrival timestamp.
    #[must_use]
    pub fn with_arrival(mut self, arrival: Timestamp) -> Self {
        self.arrival = arrival;
        self
    }

    /// Set the execution timestamp.
    #[must_use]
    pub fn with_execution(mut self, execution: Timestamp) -> Self {
        self.execution = execution;
        self
    }

    /// The order ahead of this one in its queue (older)
    #[inline]
    pub fn prev(&self) -> Option<OrderKey> {
        self.prev
    }

    /// The order behind this one in its queue (newer)
    #[inline]
    pub fn next(&self) -> Option<OrderKey> {
        self.next
    }

    /// The price level holding this order, if resident
    #[inline]
    pub fn limit(&self) -> Option<LimitKey> {
        self.limit
    }

    /// True when the order is linked into a price level
    #[inline]
    pub fn is_resident(&self) -> bool {
        self.limit.is_some()
    }

    /// True when the order has no queue neighbours and no level
    #[inline]
    pub fn is_detached(&self) -> bool {
        self.prev.is_none() && self.next.is_none() && self.limit.is_none()
    }

    /// Consume up to `quantity` of this order's size.
    ///
    /// Returns the amount actually taken.
    #[inline]
    pub(crate) fn fill(&mut self, quantity: Size) -> Size {
        let taken = quantity.min(self.size);
        self.size -= taken;
        taken
    }

    /// Clear every link; the order no longer belongs to any book.
    #[inline]
    pub(crate) fn detach(&mut self) {
        self.prev = None;
        self.next = None;
        self.limit = None;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invert_sell() {
        assert_eq!(Side::Buy, !Side::Sell);
    }

    #[test]
    fn test_invert_buy() {
        assert_eq!(Side::Sell, !Side::Buy);
    }

    #[test]
    fn test_side_default_is_sell() {
        assert_eq!(Side::default(), Side::Sell);
    }

    #[test]
    fn test_default_order() {
        let order = Order::default();

        assert!(order.next().is_none());
        assert!(order.prev().is_none());
        assert_eq!(order.uid, 0);
        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.size, 0);
        assert_eq!(order.price, 0);
        assert_eq!(order.arrival, 0);
        assert_eq!(order.execution, 0);
        assert!(order.limit().is_none());
        assert!(order.is_detached());
    }

    #[test]
    fn test_order_without_optionals() {
        let order = Order::new(5, Side::Buy, 100, 5746);

        assert!(order.is_detached());
        assert_eq!(order.uid, 5);
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.size, 100);
        assert_eq!(order.price, 5746);
        assert_eq!(order.arrival, 0);
        assert_eq!(order.execution, 0);
    }

    #[test]
    fn test_order_with_arrival() {
        let order = Order::new(5, Side::Buy, 100, 5746).with_arrival(1_000_000_001);

        assert_eq!(order.arrival, 1_000_000_001);
        assert_eq!(order.execution, 0);
        assert!(order.is_detached());
    }

    #[test]
    fn test_order_with_execution() {
        let order = Order::new(5, Side::Buy, 100, 5746)
            .with_arrival(1_000_000_001)
            .with_execution(1_000_000_002);

        assert_eq!(order.uid, 5);
        assert_eq!(order.size, 100);
        assert_eq!(order.price, 5746);
        assert_eq!(order.arrival, 1_000_000_001);
        assert_eq!(order.execution, 1_000_000_002);
        assert!(order.is_detached());
    }

    #[test]
    fn test_order_fill() {
        let mut order = Order::new(1, Side::Sell, 100, 10);

        assert_eq!(order.fill(30), 30);
        assert_eq!(order.size, 70);

        // Over-fill only takes what is left
        assert_eq!(order.fill(200), 70);
        assert_eq!(order.size, 0);
    }

    #[test]
    fn test_order_detach() {
        let mut order = Order::new(1, Side::Sell, 100, 10);
        order.prev = Some(OrderKey::new(0, 9));
        order.next = Some(OrderKey::new(2, 11));
        order.limit = Some(LimitKey(0));
        assert!(order.is_resident());

        order.detach();
        assert!(order.is_detached());
        assert!(!order.is_resident());
    }
}
