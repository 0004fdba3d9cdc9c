//! FIFO queue of the orders resting at one price level.
//!
//! ## Design
//!
//! The queue is intrusive: the links live on the [`Order`]s themselves
//! (`prev`, `next`), the queue only holds the two ends. Orders are stored
//! in the book's slab and linked by [`OrderKey`], which gives
//!
//! - O(1) append at the tail
//! - O(1) removal of any order whose handle the caller holds
//! - O(1) peek/pop of the head
//!
//! ```text
//! head (oldest) <-> order2 <-> order3 <-> tail (newest)
//! ```
//!
//! The queue is purely mechanical. Counts and volume are kept by the
//! owning [`Limit`](super::Limit).

use slab::Slab;

use crate::types::{Order, OrderKey};

/// Head and tail of an intrusive doubly-linked order list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderQueue {
    head: Option<OrderKey>,
    tail: Option<OrderKey>,
}

impl OrderQueue {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    /// A queue holding exactly one, already unlinked, order.
    pub(crate) const fn single(key: OrderKey) -> Self {
        Self {
            head: Some(key),
            tail: Some(key),
        }
    }

    /// Oldest order (first to match)
    #[inline]
    pub fn head(&self) -> Option<OrderKey> {
        self.head
    }

    /// Newest order
    #[inline]
    pub fn tail(&self) -> Option<OrderKey> {
        self.tail
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Same as [`head`](Self::head); reads better at match sites.
    #[inline]
    pub fn peek(&self) -> Option<OrderKey> {
        self.head
    }

    /// Link `key` in at the tail.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not in `orders`.
    pub fn append(&mut self, orders: &mut Slab<Order>, key: OrderKey) {
        let node = &mut orders[key.slot];
        node.prev = self.tail;
        node.next = None;

        match self.tail {
            Some(tail) => orders[tail.slot].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
    }

    /// Unlink `key` from wherever it sits in the queue.
    ///
    /// No search is performed: the order's own links locate its
    /// neighbours. The caller guarantees `key` belongs to this queue.
    pub fn remove(&mut self, orders: &mut Slab<Order>, key: OrderKey) {
        let node = &mut orders[key.slot];
        let prev = node.prev.take();
        let next = node.next.take();

        match prev {
            Some(p) => orders[p.slot].next = next,
            None => {
                debug_assert_eq!(self.head, Some(key), "unlinked order is not the head");
                self.head = next;
            }
        }
        match next {
            Some(n) => orders[n.slot].prev = prev,
            None => {
                debug_assert_eq!(self.tail, Some(key), "unlinked order is not the tail");
                self.tail = prev;
            }
        }
    }

    /// Unlink and return the head.
    pub fn pop_front(&mut self, orders: &mut Slab<Order>) -> Option<OrderKey> {
        let head = self.head?;
        self.remove(orders, head);
        Some(head)
    }

    /// Walk the queue in arrival order.
    pub fn iter<'a>(&self, orders: &'a Slab<Order>) -> QueueIter<'a> {
        QueueIter {
            orders,
            cursor: self.head,
        }
    }
}

/// Iterator over a queue, oldest first.
pub struct QueueIter<'a> {
    orders: &'a Slab<Order>,
    cursor: Option<OrderKey>,
}

impl<'a> Iterator for QueueIter<'a> {
    type Item = (OrderKey, &'a Order);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        let order = &self.orders[key.slot];
        self.cursor = order.next;
        Some((key, order))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    fn insert(orders: &mut Slab<Order>, uid: u64) -> OrderKey {
        let slot = orders.insert(Order::new(uid, Side::Buy, 100, 10));
        OrderKey::new(slot, uid)
    }

    fn filled_queue(orders: &mut Slab<Order>, count: u64) -> (OrderQueue, Vec<OrderKey>) {
        let mut queue = OrderQueue::new();
        let keys: Vec<_> = (1..=count).map(|uid| insert(orders, uid)).collect();
        for &key in &keys {
            queue.append(orders, key);
        }
        (queue, keys)
    }

    fn uids(queue: &OrderQueue, orders: &Slab<Order>) -> Vec<u64> {
        queue.iter(orders).map(|(_, order)| order.uid).collect()
    }

    #[test]
    fn test_empty_queue() {
        let queue = OrderQueue::new();

        assert!(queue.is_empty());
        assert!(queue.head().is_none());
        assert!(queue.tail().is_none());
        assert_eq!(queue, OrderQueue::default());
    }

    #[test]
    fn test_append_single() {
        let mut orders = Slab::new();
        let mut queue = OrderQueue::new();
        let key = insert(&mut orders, 1);

        queue.append(&mut orders, key);

        assert_eq!(queue.head(), Some(key));
        assert_eq!(queue.tail(), Some(key));
        assert!(orders[key.slot].prev.is_none());
        assert!(orders[key.slot].next.is_none());
    }

    #[test]
    fn test_append_links_fifo() {
        let mut orders = Slab::new();
        let (queue, keys) = filled_queue(&mut orders, 3);

        assert_eq!(queue.head(), Some(keys[0]));
        assert_eq!(queue.tail(), Some(keys[2]));
        assert_eq!(orders[keys[0].slot].next, Some(keys[1]));
        assert_eq!(orders[keys[1].slot].prev, Some(keys[0]));
        assert_eq!(orders[keys[1].slot].next, Some(keys[2]));
        assert_eq!(orders[keys[2].slot].prev, Some(keys[1]));
        assert_eq!(uids(&queue, &orders), vec![1, 2, 3]);
    }

    #[test]
    fn test_pop_front_in_arrival_order() {
        let mut orders = Slab::new();
        let (mut queue, keys) = filled_queue(&mut orders, 3);

        assert_eq!(queue.pop_front(&mut orders), Some(keys[0]));
        assert!(orders[keys[1].slot].prev.is_none());
        assert_eq!(queue.pop_front(&mut orders), Some(keys[1]));
        assert_eq!(queue.pop_front(&mut orders), Some(keys[2]));
        assert!(queue.is_empty());
        assert!(queue.tail().is_none());
        assert!(queue.pop_front(&mut orders).is_none());

        for key in keys {
            assert!(orders[key.slot].is_detached());
        }
    }

    #[test]
    fn test_remove_only() {
        let mut orders = Slab::new();
        let (mut queue, keys) = filled_queue(&mut orders, 1);

        queue.remove(&mut orders, keys[0]);

        assert!(queue.is_empty());
        assert!(queue.tail().is_none());
    }

    #[test]
    fn test_remove_head() {
        let mut orders = Slab::new();
        let (mut queue, keys) = filled_queue(&mut orders, 3);

        queue.remove(&mut orders, keys[0]);

        assert_eq!(queue.head(), Some(keys[1]));
        assert!(orders[keys[1].slot].prev.is_none());
        assert_eq!(uids(&queue, &orders), vec![2, 3]);
    }

    #[test]
    fn test_remove_tail() {
        let mut orders = Slab::new();
        let (mut queue, keys) = filled_queue(&mut orders, 3);

        queue.remove(&mut orders, keys[2]);

        assert_eq!(queue.tail(), Some(keys[1]));
        assert!(orders[keys[1].slot].next.is_none());
        assert_eq!(uids(&queue, &orders), vec![1, 2]);
    }

    #[test]
    fn test_remove_middle() {
        let mut orders = Slab::new();
        let (mut queue, keys) = filled_queue(&mut orders, 3);

        queue.remove(&mut orders, keys[1]);

        assert_eq!(orders[keys[0].slot].next, Some(keys[2]));
        assert_eq!(orders[keys[2].slot].prev, Some(keys[0]));
        assert!(orders[keys[1].slot].prev.is_none());
        assert!(orders[keys[1].slot].next.is_none());
        assert_eq!(uids(&queue, &orders), vec![1, 3]);
    }

    #[test]
    fn test_append_after_drain() {
        let mut orders = Slab::new();
        let (mut queue, keys) = filled_queue(&mut orders, 2);
        queue.remove(&mut orders, keys[0]);
        queue.remove(&mut orders, keys[1]);

        let key = insert(&mut orders, 9);
        queue.append(&mut orders, key);

        assert_eq!(queue.head(), Some(key));
        assert_eq!(queue.tail(), Some(key));
        assert_eq!(uids(&queue, &orders), vec![9]);
    }
}
