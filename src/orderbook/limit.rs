//! Price level: every resting order at one price on one side.
//!
//! ## Design
//!
//! A [`Limit`] plays two roles at once:
//!
//! - it is the owner of an [`OrderQueue`] and keeps the aggregates of that
//!   queue (`size` = number of orders, `volume` = sum of their sizes);
//! - it is a node of its side's [`LimitTree`](super::LimitTree), carrying
//!   `parent`/`left`/`right` links and an AVL height.
//!
//! Order data lives in the book's slab, so every operation that touches
//! the queue borrows that slab.
//!
//! ## Invariants
//!
//! - `volume == Σ order.size` and `size == queue length`
//! - every queued order has `price == key` and `limit == this level`
//! - `order_head` and `order_tail` are both `None` iff `size == 0`

use slab::Slab;

use crate::orderbook::queue::{OrderQueue, QueueIter};
use crate::types::{Count, LimitKey, Order, OrderKey, Price, Size, Volume};

/// A price level node.
///
/// The default level is inert: key 0, no orders, no tree links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Limit {
    pub(crate) key: Price,
    pub(crate) size: Count,
    pub(crate) volume: Volume,
    pub(crate) queue: OrderQueue,

    pub(crate) parent: Option<LimitKey>,
    pub(crate) left: Option<LimitKey>,
    pub(crate) right: Option<LimitKey>,
    /// AVL height, 1 for a leaf; 0 while not attached to a tree
    pub(crate) height: u8,
}

/// What [`Limit::fill`] consumed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LevelFill {
    /// Quantity taken from the level
    pub filled: Volume,
    /// Orders filled to zero, detached but still in the slab
    pub completed: Vec<OrderKey>,
    /// Head order that was reduced but not exhausted
    pub partial: Option<OrderKey>,
}

impl Limit {
    /// An empty level at `price`, not yet attached anywhere.
    pub fn new(price: Price) -> Self {
        Self {
            key: price,
            ..Self::default()
        }
    }

    /// A level holding exactly `seed`.
    ///
    /// Takes the seed's price as key. The seed's back-reference is set by
    /// the tree once the level has a handle.
    ///
    /// # Panics
    ///
    /// Panics if the seed is already linked somewhere.
    pub fn seeded(orders: &Slab<Order>, seed: OrderKey) -> Self {
        let order = &orders[seed.slot];
        assert!(
            order.is_detached(),
            "seed order {} is already linked into a level",
            order.uid
        );
        Self {
            key: order.price,
            size: 1,
            volume: Volume::from(order.size),
            queue: OrderQueue::single(seed),
            ..Self::default()
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Price of this level
    #[inline]
    pub fn key(&self) -> Price {
        self.key
    }

    /// Number of resident orders
    #[inline]
    pub fn size(&self) -> Count {
        self.size
    }

    /// Total resting quantity
    #[inline]
    pub fn volume(&self) -> Volume {
        self.volume
    }

    #[inline]
    pub fn order_head(&self) -> Option<OrderKey> {
        self.queue.head()
    }

    #[inline]
    pub fn order_tail(&self) -> Option<OrderKey> {
        self.queue.tail()
    }

    #[inline]
    pub fn parent(&self) -> Option<LimitKey> {
        self.parent
    }

    #[inline]
    pub fn left(&self) -> Option<LimitKey> {
        self.left
    }

    #[inline]
    pub fn right(&self) -> Option<LimitKey> {
        self.right
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Orders at this level, oldest first.
    pub fn orders<'a>(&self, orders: &'a Slab<Order>) -> QueueIter<'a> {
        self.queue.iter(orders)
    }

    // ========================================================================
    // Order Management
    // ========================================================================

    /// Append an order to this level.
    ///
    /// # Panics
    ///
    /// Panics if the order's price differs from the level's key or the
    /// order already belongs to a level. Both are caller bugs.
    pub fn add_order(&mut self, me: LimitKey, orders: &mut Slab<Order>, key: OrderKey) {
        let order = &orders[key.slot];
        assert_eq!(
            order.price, self.key,
            "order {} priced {} added to level {}",
            order.uid, order.price, self.key
        );
        assert!(
            order.limit.is_none(),
            "order {} is already resident",
            order.uid
        );
        let size = order.size;

        self.queue.append(orders, key);
        orders[key.slot].limit = Some(me);
        self.size += 1;
        self.volume += Volume::from(size);
    }

    /// Remove an order from this level.
    ///
    /// Returns `true` when the level is left empty and should be dropped
    /// from its tree.
    ///
    /// # Panics
    ///
    /// Panics if the order does not belong to this level.
    pub fn remove_order(&mut self, me: LimitKey, orders: &mut Slab<Order>, key: OrderKey) -> bool {
        let order = &orders[key.slot];
        assert_eq!(
            order.limit,
            Some(me),
            "order {} removed from level {} that does not hold it",
            order.uid,
            self.key
        );
        let size = order.size;

        self.queue.remove(orders, key);
        orders[key.slot].limit = None;
        self.size -= 1;
        self.volume -= Volume::from(size);

        self.is_empty()
    }

    /// Take up to `quantity` from the front of the queue.
    ///
    /// Orders are consumed in arrival order. An order reduced to zero is
    /// popped and detached; an order that keeps some size stays at the
    /// head with its place in line. The amount filled never exceeds the
    /// level's volume.
    pub fn fill(&mut self, orders: &mut Slab<Order>, quantity: Volume) -> LevelFill {
        let mut result = LevelFill::default();

        while result.filled < quantity {
            let Some(head) = self.queue.peek() else {
                break;
            };
            let wanted = Size::try_from(quantity - result.filled).unwrap_or(Size::MAX);
            let taken = orders[head.slot].fill(wanted);
            self.volume -= Volume::from(taken);
            result.filled += Volume::from(taken);

            if orders[head.slot].size > 0 {
                result.partial = Some(head);
                break;
            }

            self.queue.pop_front(orders);
            orders[head.slot].limit = None;
            self.size -= 1;
            result.completed.push(head);
        }

        result
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
