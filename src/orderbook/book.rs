//! The book: one [`LimitTree`] per side over a shared order arena.
//!
//! ## Architecture
//!
//! - **Slab**: every resident [`Order`] lives in one `Slab<Order>`
//! - **LimitTree** ×2: AVL trees of price levels, bids and asks
//! - **HashMap**: uid to [`OrderKey`], for cancel by uid
//!
//! Orders move into the book on [`submit`](Book::submit) and move back out,
//! by value and fully detached, on [`cancel`](Book::cancel) or when an
//! execution fills them completely. The book never keeps a reference to an
//! order it no longer holds.
//!
//! ## Matching
//!
//! The book does not match. [`execute_at_best`](Book::execute_at_best)
//! removes volume from the front of one side's best level; deciding when an
//! incoming order crosses `best(!side)` belongs to the caller.
//!
//! ## Example
//!
//! ```
//! use limit_book::{Book, Order, Side};
//!
//! let mut book = Book::with_capacity(1_000, 64);
//!
//! let bid = book.submit(Order::new(1, Side::Buy, 100, 5_000)).unwrap();
//! book.submit(Order::new(2, Side::Sell, 50, 5_010)).unwrap();
//!
//! assert_eq!(book.best_price(Side::Buy), Some(5_000));
//! assert_eq!(book.best_price(Side::Sell), Some(5_010));
//! assert_eq!(book.spread(), Some(10));
//!
//! let order = book.cancel(bid).unwrap();
//! assert!(order.is_detached());
//! assert!(book.best(Side::Buy).is_none());
//! ```

use std::collections::HashMap;
use std::fmt;

use sha2::{Digest, Sha256};
use slab::Slab;
use tracing::{debug, trace};

use crate::orderbook::{Levels, Limit, LimitTree, Placement};
use crate::types::{
    AuditError, BookError, Count, Execution, Order, OrderKey, Price, Side, Timestamp, Uid, Volume,
};

/// Limit order book index.
pub struct Book {
    /// Resident orders
    orders: Slab<Order>,

    /// uid -> handle, for every resident order
    index: HashMap<Uid, OrderKey>,

    /// Buy levels; best = highest price
    bids: LimitTree,

    /// Sell levels; best = lowest price
    asks: LimitTree,
}

impl Default for Book {
    fn default() -> Self {
        Self::new()
    }
}

impl Book {
    /// Create an empty book
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    /// Create a book with pre-allocated room.
    ///
    /// # Arguments
    ///
    /// * `orders` - Resident orders to reserve slots for
    /// * `levels` - Price levels to reserve per side
    pub fn with_capacity(orders: usize, levels: usize) -> Self {
        Self {
            orders: Slab::with_capacity(orders),
            index: HashMap::with_capacity(orders),
            bids: LimitTree::with_capacity(Side::Buy, levels),
            asks: LimitTree::with_capacity(Side::Sell, levels),
        }
    }

    // ========================================================================
    // Order Management
    // ========================================================================

    /// Rest an order on its side at its price.
    ///
    /// Creates the price level if this is the first order at that price.
    /// Does not match against the other side.
    ///
    /// # Errors
    ///
    /// - [`BookError::EmptyOrder`] for a zero size
    /// - [`BookError::DuplicateOrder`] if the uid is already resident
    pub fn submit(&mut self, mut order: Order) -> Result<OrderKey, BookError> {
        let uid = order.uid;
        if order.size == 0 {
            return Err(BookError::EmptyOrder { uid });
        }
        if self.index.contains_key(&uid) {
            return Err(BookError::DuplicateOrder { uid });
        }

        order.detach();
        let (side, price, size) = (order.side, order.price, order.size);
        let key = OrderKey::new(self.orders.insert(order), uid);

        let (tree, orders) = self.side_mut(side);
        if let Placement::Existing(level) = tree.find_or_create(orders, key) {
            tree.limit_mut(level).add_order(level, orders, key);
        }
        tree.count += 1;
        tree.volume += Volume::from(size);

        self.index.insert(uid, key);
        trace!(uid, ?side, price, size, "order submitted");

        Ok(key)
    }

    /// Take a resident order out of the book.
    ///
    /// The price level is dropped when this was its last order. The order
    /// comes back with its links cleared.
    ///
    /// # Errors
    ///
    /// [`BookError::NotResident`] if the handle does not name a resident
    /// order, including a handle whose order was already cancelled or filled.
    pub fn cancel(&mut self, key: OrderKey) -> Result<Order, BookError> {
        let Some((side, level)) = self
            .resolve(key)
            .and_then(|order| order.limit.map(|level| (order.side, level)))
        else {
            return Err(BookError::NotResident { uid: key.uid });
        };

        let (tree, orders) = self.side_mut(side);
        let emptied = tree.limit_mut(level).remove_order(level, orders, key);
        let size = orders[key.slot].size;
        tree.count -= 1;
        tree.volume -= Volume::from(size);
        if emptied {
            tree.remove(level);
        }

        self.index.remove(&key.uid);
        let order = self.orders.remove(key.slot);
        debug!(uid = order.uid, ?side, price = order.price, size, "order cancelled");

        Ok(order)
    }

    /// [`cancel`](Self::cancel) by uid.
    ///
    /// # Errors
    ///
    /// [`BookError::UnknownOrder`] if no resident order has this uid.
    pub fn cancel_uid(&mut self, uid: Uid) -> Result<Order, BookError> {
        let key = self.key_of(uid).ok_or(BookError::UnknownOrder { uid })?;
        self.cancel(key)
    }

    /// Remove up to `quantity` from the front of `side`'s best level.
    ///
    /// Orders are consumed oldest first. A partially filled order keeps its
    /// place at the head; fully filled orders leave the book and are
    /// returned in the [`Execution`]. The level is dropped if it empties.
    /// Only one level is touched, see [`sweep`](Self::sweep) for more.
    ///
    /// # Errors
    ///
    /// [`BookError::EmptySide`] if `side` holds no orders.
    pub fn execute_at_best(&mut self, side: Side, quantity: Volume) -> Result<Execution, BookError> {
        let (tree, orders) = self.side_mut(side);
        let level = tree.best_key().ok_or(BookError::EmptySide(side))?;

        let limit = tree.limit_mut(level);
        let price = limit.key();
        let fill = limit.fill(orders, quantity);
        let emptied = limit.is_empty();

        tree.count -= fill.completed.len() as Count;
        tree.volume -= fill.filled;
        if emptied {
            tree.remove(level);
        }

        let mut execution = Execution::new(side, price);
        execution.filled = fill.filled;
        execution.partial = fill.partial;
        for key in fill.completed {
            self.index.remove(&key.uid);
            execution.completed.push(self.orders.remove(key.slot));
        }
        trace!(
            ?side,
            price,
            filled = execution.filled,
            completed = execution.completed.len(),
            "executed at best"
        );

        Ok(execution)
    }

    /// Execute against successive best levels of `side` until `quantity`
    /// is exhausted or the side runs dry.
    ///
    /// Returns one [`Execution`] per level touched, best first. An empty
    /// side yields an empty vector.
    pub fn sweep(&mut self, side: Side, quantity: Volume) -> Vec<Execution> {
        let mut executions = Vec::new();
        let mut remaining = quantity;

        while remaining > 0 {
            let Ok(execution) = self.execute_at_best(side, remaining) else {
                break;
            };
            remaining -= execution.filled;
            executions.push(execution);
        }

        executions
    }

    /// Record a fill time on a resident order (typically the one an
    /// [`Execution`] reports as partially filled).
    ///
    /// # Errors
    ///
    /// [`BookError::NotResident`] if the handle is stale.
    pub fn stamp_execution(&mut self, key: OrderKey, timestamp: Timestamp) -> Result<(), BookError> {
        match self.orders.get_mut(key.slot) {
            Some(order) if order.uid == key.uid && order.is_resident() => {
                order.execution = timestamp;
                Ok(())
            }
            _ => Err(BookError::NotResident { uid: key.uid }),
        }
    }

    /// Remove every order and level.
    pub fn clear(&mut self) {
        self.orders.clear();
        self.index.clear();
        self.bids.clear();
        self.asks.clear();
    }

    // ========================================================================
    // Order Lookup
    // ========================================================================

    /// The resident order behind a handle
    #[inline]
    pub fn order(&self, key: OrderKey) -> Option<&Order> {
        self.resolve(key)
    }

    /// The resident order with this uid
    #[inline]
    pub fn get(&self, uid: Uid) -> Option<&Order> {
        self.key_of(uid).and_then(|key| self.resolve(key))
    }

    /// Handle of the resident order with this uid
    #[inline]
    pub fn key_of(&self, uid: Uid) -> Option<OrderKey> {
        self.index.get(&uid).copied()
    }

    #[inline]
    pub fn contains(&self, uid: Uid) -> bool {
        self.index.contains_key(&uid)
    }

    /// Total resident orders
    #[inline]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    // ========================================================================
    // Levels
    // ========================================================================

    /// The levels of one side
    #[inline]
    pub fn tree(&self, side: Side) -> &LimitTree {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Best level of `side`: highest bid or lowest ask
    #[inline]
    pub fn best(&self, side: Side) -> Option<&Limit> {
        self.tree(side).best()
    }

    #[inline]
    pub fn best_price(&self, side: Side) -> Option<Price> {
        self.best(side).map(Limit::key)
    }

    /// The level at exactly `price`
    pub fn find(&self, side: Side, price: Price) -> Option<&Limit> {
        let tree = self.tree(side);
        tree.find(price).and_then(|key| tree.get(key))
    }

    /// Lowest ask minus highest bid, when both exist and the book is not crossed
    pub fn spread(&self) -> Option<Price> {
        match (self.best_price(Side::Buy), self.best_price(Side::Sell)) {
            (Some(bid), Some(ask)) if ask >= bid => Some(ask - bid),
            _ => None,
        }
    }

    /// Number of price levels on `side`
    #[inline]
    pub fn levels(&self, side: Side) -> usize {
        self.tree(side).len()
    }

    /// Resident orders on `side`
    #[inline]
    pub fn count(&self, side: Side) -> Count {
        self.tree(side).count()
    }

    /// Resident volume on `side`
    #[inline]
    pub fn volume(&self, side: Side) -> Volume {
        self.tree(side).volume()
    }

    /// Orders resting at `price` on `side`, 0 if there is no such level
    pub fn count_at(&self, side: Side, price: Price) -> Count {
        self.find(side, price).map_or(0, Limit::size)
    }

    /// Volume resting at `price` on `side`, 0 if there is no such level
    pub fn volume_at(&self, side: Side, price: Price) -> Volume {
        self.find(side, price).map_or(0, Limit::volume)
    }

    /// Levels of `side`, best first
    pub fn depth(&self, side: Side) -> Levels<'_> {
        self.tree(side).iter_best_first()
    }

    /// Orders resting at `price` on `side`, in time priority
    pub fn orders_at(&self, side: Side, price: Price) -> impl Iterator<Item = &Order> + '_ {
        self.find(side, price)
            .into_iter()
            .flat_map(move |limit| limit.orders(&self.orders).map(|(_, order)| order))
    }

    // ========================================================================
    // Verification
    // ========================================================================

    /// Check every structural invariant of the book.
    ///
    /// Walks both trees and every queue: O(N + M). Meant for tests and
    /// offline verification, not for the hot path.
    pub fn audit(&self) -> Result<(), AuditError> {
        let resident = self.bids.audit(&self.orders)? + self.asks.audit(&self.orders)?;

        if resident != self.orders.len() {
            return Err(AuditError::Book {
                detail: format!(
                    "{} orders stored but {} reachable from levels",
                    self.orders.len(),
                    resident
                ),
            });
        }
        for (&uid, &key) in &self.index {
            if self.resolve(key).map(|order| order.uid) != Some(uid) {
                return Err(AuditError::Order {
                    uid,
                    detail: "uid index points at another slot".into(),
                });
            }
        }
        if self.index.len() != self.orders.len() {
            return Err(AuditError::Book {
                detail: format!(
                    "uid index holds {} entries for {} orders",
                    self.index.len(),
                    self.orders.len()
                ),
            });
        }

        Ok(())
    }

    /// SHA-256 over both sides in price order and every queue in time order.
    ///
    /// Two books that went through the same operations have the same root.
    /// Arena slot numbers do not enter the hash.
    pub fn state_root(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();

        for (tag, tree) in [(0u8, &self.bids), (1u8, &self.asks)] {
            hasher.update([tag]);
            for limit in tree.iter() {
                hasher.update(limit.key().to_le_bytes());
                hasher.update(limit.size().to_le_bytes());
                hasher.update(limit.volume().to_le_bytes());
                for (_, order) in limit.orders(&self.orders) {
                    hasher.update(order.uid.to_le_bytes());
                    hasher.update(order.size.to_le_bytes());
                    hasher.update(order.arrival.to_le_bytes());
                    hasher.update(order.execution.to_le_bytes());
                }
            }
        }

        hasher.finalize().into()
    }

    /// [`state_root`](Self::state_root) as lowercase hex
    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// The order behind `key`, if the slot still holds the same uid
    #[inline]
    fn resolve(&self, key: OrderKey) -> Option<&Order> {
        self.orders.get(key.slot).filter(|order| order.uid == key.uid)
    }

    /// One side's tree together with the order arena
    #[inline]
    fn side_mut(&mut self, side: Side) -> (&mut LimitTree, &mut Slab<Order>) {
        match side {
            Side::Buy => (&mut self.bids, &mut self.orders),
            Side::Sell => (&mut self.asks, &mut self.orders),
        }
    }
}

impl fmt::Debug for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Book")
            .field("best_bid", &self.best_price(Side::Buy))
            .field("best_ask", &self.best_price(Side::Sell))
            .field("bid_levels", &self.bids.len())
            .field("ask_levels", &self.asks.len())
            .field("orders", &self.orders.len())
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn buy(uid: u64, size: u32, price: u64) -> Order {
        Order::new(uid, Side::Buy, size, price)
    }

    fn sell(uid: u64, size: u32, price: u64) -> Order {
        Order::new(uid, Side::Sell, size, price)
    }

    #[test]
    fn test_empty_book() {
        let book = Book::new();

        assert!(book.is_empty());
        assert!(book.best(Side::Buy).is_none());
        assert!(book.best(Side::Sell).is_none());
        assert!(book.spread().is_none());
        book.audit().unwrap();
    }

    #[test]
    fn test_submit_creates_level() {
        let mut book = Book::new();

        let key = book.submit(buy(5, 100, 5746)).unwrap();

        let limit = book.find(Side::Buy, 5746).unwrap();
        assert_eq!(limit.key(), 5746);
        assert_eq!(limit.size(), 1);
        assert_eq!(limit.volume(), 100);
        assert_eq!(limit.order_head(), Some(key));
        assert_eq!(book.best_price(Side::Buy), Some(5746));
        assert!(book.best(Side::Sell).is_none());

        let order = book.order(key).unwrap();
        assert!(order.is_resident());
        assert!(order.prev().is_none());
        assert!(order.next().is_none());
        book.audit().unwrap();
    }

    #[test]
    fn test_submit_joins_existing_level() {
        let mut book = Book::new();

        let first = book.submit(sell(1, 100, 10)).unwrap();
        let second = book.submit(sell(2, 250, 10)).unwrap();

        assert_eq!(book.levels(Side::Sell), 1);
        assert_eq!(book.count_at(Side::Sell, 10), 2);
        assert_eq!(book.volume_at(Side::Sell, 10), 350);
        assert_eq!(book.order(first).unwrap().next(), Some(second));
        assert_eq!(book.order(second).unwrap().prev(), Some(first));
        book.audit().unwrap();
    }

    #[test]
    fn test_submit_rejects_duplicate_and_empty() {
        let mut book = Book::new();
        book.submit(buy(1, 100, 10)).unwrap();

        assert_eq!(
            book.submit(buy(1, 50, 11)),
            Err(BookError::DuplicateOrder { uid: 1 })
        );
        assert_eq!(book.submit(buy(2, 0, 10)), Err(BookError::EmptyOrder { uid: 2 }));
        assert_eq!(book.len(), 1);
        assert_eq!(book.levels(Side::Buy), 1);
        book.audit().unwrap();
    }

    #[test]
    fn test_cancel_last_order_removes_level() {
        let mut book = Book::new();
        let key = book.submit(sell(1, 100, 42)).unwrap();

        let order = book.cancel(key).unwrap();

        assert_eq!(order.uid, 1);
        assert_eq!(order.size, 100);
        assert!(order.is_detached());
        assert!(book.find(Side::Sell, 42).is_none());
        assert!(book.best(Side::Sell).is_none());
        assert!(book.is_empty());
        book.audit().unwrap();
    }

    #[test]
    fn test_cancel_twice_is_not_resident() {
        let mut book = Book::new();
        let key = book.submit(sell(1, 100, 42)).unwrap();
        book.cancel(key).unwrap();

        assert_eq!(book.cancel(key), Err(BookError::NotResident { uid: 1 }));
        book.audit().unwrap();
    }

    #[test]
    fn test_stale_key_does_not_hit_reused_slot() {
        let mut book = Book::new();
        let stale = book.submit(sell(1, 100, 42)).unwrap();
        book.cancel(stale).unwrap();

        // Slab reuses the freed slot for the next order
        let fresh = book.submit(sell(2, 100, 42)).unwrap();
        assert_eq!(fresh.slot, stale.slot);

        assert_eq!(book.cancel(stale), Err(BookError::NotResident { uid: 1 }));
        assert!(book.contains(2));
        book.audit().unwrap();
    }

    #[test]
    fn test_cancel_middle_keeps_level() {
        let mut book = Book::new();
        book.submit(buy(1, 100, 10)).unwrap();
        let middle = book.submit(buy(2, 200, 10)).unwrap();
        book.submit(buy(3, 300, 10)).unwrap();

        book.cancel(middle).unwrap();

        let uids: Vec<_> = book.orders_at(Side::Buy, 10).map(|o| o.uid).collect();
        assert_eq!(uids, vec![1, 3]);
        assert_eq!(book.volume_at(Side::Buy, 10), 400);
        assert_eq!(book.best_price(Side::Buy), Some(10));
        book.audit().unwrap();
    }

    #[test]
    fn test_cancel_uid() {
        let mut book = Book::new();
        book.submit(buy(7, 100, 10)).unwrap();

        assert_eq!(book.cancel_uid(7).unwrap().uid, 7);
        assert_eq!(book.cancel_uid(7), Err(BookError::UnknownOrder { uid: 7 }));
    }

    #[test]
    fn test_cancel_best_moves_best() {
        let mut book = Book::new();
        book.submit(buy(1, 100, 100)).unwrap();
        book.submit(buy(2, 100, 99)).unwrap();
        book.submit(buy(3, 100, 98)).unwrap();

        book.cancel_uid(1).unwrap();
        assert_eq!(book.best_price(Side::Buy), Some(99));
        book.cancel_uid(2).unwrap();
        assert_eq!(book.best_price(Side::Buy), Some(98));
        book.cancel_uid(3).unwrap();
        assert!(book.best(Side::Buy).is_none());
    }

    #[test]
    fn test_execute_at_best_partial() {
        let mut book = Book::new();
        let first = book.submit(buy(1, 30, 10)).unwrap();
        let second = book.submit(buy(2, 20, 10)).unwrap();

        let execution = book.execute_at_best(Side::Buy, 40).unwrap();

        assert_eq!(execution.summary(), (40, 10));
        assert_eq!(execution.completed.len(), 1);
        assert_eq!(execution.completed[0].uid, 1);
        assert_eq!(execution.completed[0].size, 0);
        assert!(execution.completed[0].is_detached());
        assert_eq!(execution.partial, Some(second));

        assert!(book.order(first).is_none());
        assert_eq!(book.order(second).unwrap().size, 10);
        assert_eq!(book.volume_at(Side::Buy, 10), 10);
        assert_eq!(book.count_at(Side::Buy, 10), 1);
        assert_eq!(book.volume(Side::Buy), 10);
        book.audit().unwrap();
    }

    #[test]
    fn test_execute_at_best_clears_level() {
        let mut book = Book::new();
        book.submit(sell(1, 30, 101)).unwrap();
        book.submit(sell(2, 30, 102)).unwrap();

        let execution = book.execute_at_best(Side::Sell, 100).unwrap();

        assert_eq!(execution.summary(), (30, 101));
        assert!(execution.partial.is_none());
        assert!(book.find(Side::Sell, 101).is_none());
        assert_eq!(book.best_price(Side::Sell), Some(102));
        book.audit().unwrap();
    }

    #[test]
    fn test_execute_empty_side() {
        let mut book = Book::new();
        book.submit(sell(1, 30, 101)).unwrap();

        assert_eq!(
            book.execute_at_best(Side::Buy, 10),
            Err(BookError::EmptySide(Side::Buy))
        );
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_sweep_walks_levels() {
        let mut book = Book::new();
        book.submit(sell(1, 10, 101)).unwrap();
        book.submit(sell(2, 10, 102)).unwrap();
        book.submit(sell(3, 10, 103)).unwrap();

        let executions = book.sweep(Side::Sell, 25);

        let summary: Vec<_> = executions.iter().map(Execution::summary).collect();
        assert_eq!(summary, vec![(10, 101), (10, 102), (5, 103)]);
        assert_eq!(book.volume(Side::Sell), 5);
        assert!(book.sweep(Side::Buy, 10).is_empty());
        book.audit().unwrap();
    }

    #[test]
    fn test_stamp_execution() {
        let mut book = Book::new();
        book.submit(buy(1, 30, 10)).unwrap();

        let execution = book.execute_at_best(Side::Buy, 10).unwrap();
        let partial = execution.partial.unwrap();
        book.stamp_execution(partial, 1_000_000_002).unwrap();

        assert_eq!(book.get(1).unwrap().execution, 1_000_000_002);

        book.cancel(partial).unwrap();
        assert_eq!(
            book.stamp_execution(partial, 1),
            Err(BookError::NotResident { uid: 1 })
        );
    }

    #[test]
    fn test_depth_best_first() {
        let mut book = Book::new();
        for (uid, price) in [(1, 10), (2, 12), (3, 11)] {
            book.submit(buy(uid, 5, price)).unwrap();
            book.submit(sell(uid + 10, 5, price + 10)).unwrap();
        }

        let bids: Vec<_> = book.depth(Side::Buy).map(Limit::key).collect();
        let asks: Vec<_> = book.depth(Side::Sell).map(Limit::key).collect();
        assert_eq!(bids, vec![12, 11, 10]);
        assert_eq!(asks, vec![20, 21, 22]);
        assert_eq!(book.spread(), Some(8));
    }

    #[test]
    fn test_state_root_tracks_contents() {
        let mut a = Book::new();
        let mut b = Book::new();
        for book in [&mut a, &mut b] {
            book.submit(buy(1, 10, 100)).unwrap();
            book.submit(sell(2, 10, 101)).unwrap();
        }
        assert_eq!(a.state_root(), b.state_root());
        assert_eq!(a.state_root_hex().len(), 64);

        b.cancel_uid(2).unwrap();
        assert_ne!(a.state_root(), b.state_root());
    }

    #[test]
    fn test_clear() {
        let mut book = Book::new();
        book.submit(buy(1, 10, 100)).unwrap();
        book.submit(sell(2, 10, 101)).unwrap();

        book.clear();

        assert!(book.is_empty());
        assert!(!book.contains(1));
        assert_eq!(book.levels(Side::Buy), 0);
        assert_eq!(book.volume(Side::Sell), 0);
        book.audit().unwrap();
    }
}
