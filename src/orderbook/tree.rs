//! Price-ordered index of the levels on one side of the book.
//!
//! ## Design
//!
//! An AVL tree keyed by price. Nodes are [`Limit`]s stored in a
//! `slab::Slab`; `parent`/`left`/`right` are [`LimitKey`]s into that slab.
//! Rotations relink nodes and never move a level to another slot, so a
//! `LimitKey` stays valid until its level is removed.
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | `find` | O(log M) |
//! | `find_or_create` | O(log M) |
//! | `remove` | O(log M) |
//! | `best` | O(1), cached |
//!
//! M is the number of distinct prices on the side.
//!
//! ## Best Level
//!
//! The bid tree's best is its maximum key, the ask tree's its minimum.
//! The handle is cached: an insert replaces it when the new key is
//! better, removing the cached level recomputes it from the root.

use std::cmp::Ordering;

use slab::Slab;
use tracing::debug;

use crate::orderbook::Limit;
use crate::types::{AuditError, Count, LimitKey, Order, OrderKey, Price, Side, Volume};

/// Outcome of [`LimitTree::find_or_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// A level at the price already existed; the seed was not touched
    Existing(LimitKey),
    /// A new level was created holding only the seed
    Created(LimitKey),
}

impl Placement {
    /// The level handle, whichever way it was obtained
    #[inline]
    pub fn key(self) -> LimitKey {
        match self {
            Placement::Existing(key) | Placement::Created(key) => key,
        }
    }
}

/// AVL tree of price levels for one side.
#[derive(Debug)]
pub struct LimitTree {
    side: Side,
    limits: Slab<Limit>,
    root: Option<LimitKey>,
    best: Option<LimitKey>,
    /// Resident orders across all levels
    pub(crate) count: Count,
    /// Resident volume across all levels
    pub(crate) volume: Volume,
}

impl LimitTree {
    /// Create an empty tree for `side`
    pub fn new(side: Side) -> Self {
        Self::with_capacity(side, 0)
    }

    /// Create an empty tree with room for `levels` price levels
    pub fn with_capacity(side: Side, levels: usize) -> Self {
        Self {
            side,
            limits: Slab::with_capacity(levels),
            root: None,
            best: None,
            count: 0,
            volume: 0,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Number of price levels
    #[inline]
    pub fn len(&self) -> usize {
        self.limits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of resident orders on this side
    #[inline]
    pub fn count(&self) -> Count {
        self.count
    }

    /// Resident volume on this side
    #[inline]
    pub fn volume(&self) -> Volume {
        self.volume
    }

    #[inline]
    pub fn root(&self) -> Option<LimitKey> {
        self.root
    }

    /// Height of the tree, 0 when empty
    #[inline]
    pub fn height(&self) -> usize {
        self.height_of(self.root) as usize
    }

    #[inline]
    pub fn get(&self, key: LimitKey) -> Option<&Limit> {
        self.limits.get(key.0)
    }

    /// # Panics
    ///
    /// Panics if the key does not name a level of this tree.
    #[inline]
    pub(crate) fn limit_mut(&mut self, key: LimitKey) -> &mut Limit {
        &mut self.limits[key.0]
    }

    /// Handle of the best level
    #[inline]
    pub fn best_key(&self) -> Option<LimitKey> {
        self.best
    }

    /// The best level: highest bid or lowest ask
    #[inline]
    pub fn best(&self) -> Option<&Limit> {
        self.best.map(|key| &self.limits[key.0])
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Exact lookup by price
    pub fn find(&self, price: Price) -> Option<LimitKey> {
        let mut cursor = self.root;
        while let Some(key) = cursor {
            let node = &self.limits[key.0];
            cursor = match price.cmp(&node.key) {
                Ordering::Equal => return Some(key),
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
        }
        None
    }

    /// Find the level at `seed`'s price, or create one holding `seed`.
    ///
    /// When a level exists the seed is left alone and the caller adds it
    /// with [`Limit::add_order`]. A created level already contains the seed
    /// and the seed's back-reference points at it.
    pub fn find_or_create(&mut self, orders: &mut Slab<Order>, seed: OrderKey) -> Placement {
        let price = orders[seed.slot].price;
        let mut parent = None;
        let mut left_of_parent = false;
        let mut cursor = self.root;

        while let Some(key) = cursor {
            let node = &self.limits[key.0];
            parent = Some(key);
            cursor = match price.cmp(&node.key) {
                Ordering::Equal => return Placement::Existing(key),
                Ordering::Less => {
                    left_of_parent = true;
                    node.left
                }
                Ordering::Greater => {
                    left_of_parent = false;
                    node.right
                }
            };
        }

        let mut limit = Limit::seeded(orders, seed);
        limit.parent = parent;
        limit.height = 1;
        let key = LimitKey(self.limits.insert(limit));
        orders[seed.slot].limit = Some(key);

        match parent {
            None => self.root = Some(key),
            Some(p) if left_of_parent => self.limits[p.0].left = Some(key),
            Some(p) => self.limits[p.0].right = Some(key),
        }
        self.rebalance_from(parent);

        if self.improves_best(price) {
            self.best = Some(key);
        }
        debug!(side = ?self.side, price, levels = self.limits.len(), "price level created");

        Placement::Created(key)
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Detach an empty level and hand it back.
    ///
    /// # Panics
    ///
    /// Panics if the level still holds orders or the key is unknown.
    pub fn remove(&mut self, key: LimitKey) -> Limit {
        let node = &self.limits[key.0];
        assert!(
            node.is_empty(),
            "level {} removed while holding {} orders",
            node.key,
            node.size
        );
        let (parent, left, right) = (node.parent, node.left, node.right);

        let rebalance_at = match (left, right) {
            (Some(left), Some(right)) => {
                // Splice in the in-order successor: leftmost node of the right subtree
                let mut successor = right;
                let mut successor_parent = key;
                while let Some(next) = self.limits[successor.0].left {
                    successor_parent = successor;
                    successor = next;
                }

                let start = if successor_parent == key {
                    successor
                } else {
                    let orphan = self.limits[successor.0].right;
                    self.limits[successor_parent.0].left = orphan;
                    if let Some(orphan) = orphan {
                        self.limits[orphan.0].parent = Some(successor_parent);
                    }
                    self.limits[successor.0].right = Some(right);
                    self.limits[right.0].parent = Some(successor);
                    successor_parent
                };

                self.limits[successor.0].left = Some(left);
                self.limits[left.0].parent = Some(successor);
                self.limits[successor.0].parent = parent;
                self.replace_child(parent, key, Some(successor));
                Some(start)
            }
            (child, None) | (None, child) => {
                if let Some(child) = child {
                    self.limits[child.0].parent = parent;
                }
                self.replace_child(parent, key, child);
                parent
            }
        };

        let mut limit = self.limits.remove(key.0);
        limit.parent = None;
        limit.left = None;
        limit.right = None;
        limit.height = 0;

        self.rebalance_from(rebalance_at);

        if self.best == Some(key) {
            self.best = self.extreme();
        }
        debug!(side = ?self.side, price = limit.key, levels = self.limits.len(), "price level removed");

        limit
    }

    /// Drop every level. Orders are the caller's to clean up.
    pub fn clear(&mut self) {
        self.limits.clear();
        self.root = None;
        self.best = None;
        self.count = 0;
        self.volume = 0;
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Levels in ascending price order
    pub fn iter(&self) -> Levels<'_> {
        Levels {
            tree: self,
            cursor: self.leftmost(self.root),
            ascending: true,
        }
    }

    /// Levels best first: descending for bids, ascending for asks
    pub fn iter_best_first(&self) -> Levels<'_> {
        match self.side {
            Side::Sell => self.iter(),
            Side::Buy => Levels {
                tree: self,
                cursor: self.rightmost(self.root),
                ascending: false,
            },
        }
    }

    fn leftmost(&self, mut cursor: Option<LimitKey>) -> Option<LimitKey> {
        while let Some(next) = cursor.and_then(|key| self.limits[key.0].left) {
            cursor = Some(next);
        }
        cursor
    }

    fn rightmost(&self, mut cursor: Option<LimitKey>) -> Option<LimitKey> {
        while let Some(next) = cursor.and_then(|key| self.limits[key.0].right) {
            cursor = Some(next);
        }
        cursor
    }

    fn successor(&self, key: LimitKey) -> Option<LimitKey> {
        if let Some(right) = self.limits[key.0].right {
            return self.leftmost(Some(right));
        }
        let mut child = key;
        let mut parent = self.limits[key.0].parent;
        while let Some(p) = parent {
            if self.limits[p.0].left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.limits[p.0].parent;
        }
        None
    }

    fn predecessor(&self, key: LimitKey) -> Option<LimitKey> {
        if let Some(left) = self.limits[key.0].left {
            return self.rightmost(Some(left));
        }
        let mut child = key;
        let mut parent = self.limits[key.0].parent;
        while let Some(p) = parent {
            if self.limits[p.0].right == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.limits[p.0].parent;
        }
        None
    }

    /// The best level found by walking from the root
    fn extreme(&self) -> Option<LimitKey> {
        match self.side {
            Side::Buy => self.rightmost(self.root),
            Side::Sell => self.leftmost(self.root),
        }
    }

    fn improves_best(&self, price: Price) -> bool {
        match self.best {
            None => true,
            Some(best) => {
                let best = self.limits[best.0].key;
                match self.side {
                    Side::Buy => price > best,
                    Side::Sell => price < best,
                }
            }
        }
    }

    // ========================================================================
    // Balancing
    // ========================================================================

    fn height_of(&self, key: Option<LimitKey>) -> i32 {
        key.map_or(0, |key| i32::from(self.limits[key.0].height))
    }

    fn update_height(&mut self, key: LimitKey) {
        let node = &self.limits[key.0];
        let height = 1 + self.height_of(node.left).max(self.height_of(node.right));
        self.limits[key.0].height = height as u8;
    }

    /// Left height minus right height
    fn balance(&self, key: LimitKey) -> i32 {
        let node = &self.limits[key.0];
        self.height_of(node.left) - self.height_of(node.right)
    }

    /// Point `parent`'s link that referenced `old` at `new` (or the root).
    fn replace_child(&mut self, parent: Option<LimitKey>, old: LimitKey, new: Option<LimitKey>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let node = &mut self.limits[p.0];
                if node.left == Some(old) {
                    node.left = new;
                } else {
                    debug_assert_eq!(node.right, Some(old));
                    node.right = new;
                }
            }
        }
    }

    /// ```text
    ///     x                y
    ///    / \              / \
    ///   a   y     =>     x   c
    ///      / \          / \
    ///     b   c        a   b
    /// ```
    fn rotate_left(&mut self, x: LimitKey) -> LimitKey {
        let Some(y) = self.limits[x.0].right else {
            return x;
        };
        let inner = self.limits[y.0].left;
        let parent = self.limits[x.0].parent;

        self.limits[x.0].right = inner;
        if let Some(inner) = inner {
            self.limits[inner.0].parent = Some(x);
        }
        self.limits[y.0].left = Some(x);
        self.limits[x.0].parent = Some(y);
        self.limits[y.0].parent = parent;
        self.replace_child(parent, x, Some(y));

        self.update_height(x);
        self.update_height(y);
        y
    }

    /// Mirror of [`rotate_left`](Self::rotate_left)
    fn rotate_right(&mut self, x: LimitKey) -> LimitKey {
        let Some(y) = self.limits[x.0].left else {
            return x;
        };
        let inner = self.limits[y.0].right;
        let parent = self.limits[x.0].parent;

        self.limits[x.0].left = inner;
        if let Some(inner) = inner {
            self.limits[inner.0].parent = Some(x);
        }
        self.limits[y.0].right = Some(x);
        self.limits[x.0].parent = Some(y);
        self.limits[y.0].parent = parent;
        self.replace_child(parent, x, Some(y));

        self.update_height(x);
        self.update_height(y);
        y
    }

    /// Restore heights and balance on the path from `cursor` to the root.
    fn rebalance_from(&mut self, mut cursor: Option<LimitKey>) {
        while let Some(key) = cursor {
            self.update_height(key);
            let balance = self.balance(key);

            let top = if balance > 1 {
                if let Some(left) = self.limits[key.0].left {
                    if self.balance(left) < 0 {
                        self.rotate_left(left);
                    }
                }
                self.rotate_right(key)
            } else if balance < -1 {
                if let Some(right) = self.limits[key.0].right {
                    if self.balance(right) > 0 {
                        self.rotate_right(right);
                    }
                }
                self.rotate_left(key)
            } else {
                key
            };

            cursor = self.limits[top.0].parent;
        }
    }

    // ========================================================================
    // Audit
    // ========================================================================

    /// Check every structural invariant of this side against `orders`.
    ///
    /// Returns the number of resident orders found.
    pub fn audit(&self, orders: &Slab<Order>) -> Result<usize, AuditError> {
        let tree_err = |detail: String| AuditError::Tree {
            side: self.side,
            detail,
        };

        if let Some(root) = self.root {
            if self.limits[root.0].parent.is_some() {
                return Err(tree_err("root has a parent".into()));
            }
        }

        let mut visited = 0usize;
        let mut resident = 0usize;
        let mut volume: Volume = 0;
        let mut stack = vec![(self.root, None::<Price>, None::<Price>)];

        while let Some((cursor, low, high)) = stack.pop() {
            let Some(key) = cursor else {
                continue;
            };
            let limit = self.limits.get(key.0).ok_or_else(|| tree_err(format!("dangling {key:?}")))?;
            visited += 1;

            if low.is_some_and(|low| limit.key <= low) || high.is_some_and(|high| limit.key >= high) {
                return Err(tree_err(format!("key {} out of order", limit.key)));
            }
            for child in [limit.left, limit.right].into_iter().flatten() {
                if self.limits.get(child.0).map(|c| c.parent) != Some(Some(key)) {
                    return Err(tree_err(format!("child of {} has a stale parent link", limit.key)));
                }
            }
            let expected = 1 + self.height_of(limit.left).max(self.height_of(limit.right));
            if i32::from(limit.height) != expected || self.balance(key).abs() > 1 {
                return Err(tree_err(format!("level {} is out of balance", limit.key)));
            }

            let (count, level_volume) = self.audit_level(key, limit, orders)?;
            resident += count;
            volume += level_volume;

            stack.push((limit.left, low, Some(limit.key)));
            stack.push((limit.right, Some(limit.key), high));
        }

        if visited != self.limits.len() {
            return Err(tree_err(format!(
                "{} levels reachable, {} stored",
                visited,
                self.limits.len()
            )));
        }
        if self.best != self.extreme() {
            return Err(tree_err("cached best is not the extreme level".into()));
        }
        if resident != self.count as usize || volume != self.volume {
            return Err(tree_err(format!(
                "side totals {}/{} but levels hold {}/{}",
                self.count, self.volume, resident, volume
            )));
        }

        Ok(resident)
    }

    fn audit_level(
        &self,
        key: LimitKey,
        limit: &Limit,
        orders: &Slab<Order>,
    ) -> Result<(usize, Volume), AuditError> {
        let level_err = |detail: String| AuditError::Level {
            side: self.side,
            price: limit.key,
            detail,
        };

        let mut count = 0usize;
        let mut volume: Volume = 0;
        let mut expected_prev = None;
        let mut cursor = limit.queue.head();

        while let Some(order_key) = cursor {
            let order = orders
                .get(order_key.slot)
                .filter(|order| order.uid == order_key.uid)
                .ok_or_else(|| level_err(format!("dangling {order_key:?}")))?;
            let order_err = |detail: &str| AuditError::Order {
                uid: order.uid,
                detail: detail.to_string(),
            };

            if order.limit != Some(key) {
                return Err(order_err("back-reference does not point at its level"));
            }
            if order.price != limit.key {
                return Err(order_err("price differs from its level"));
            }
            if order.side != self.side {
                return Err(order_err("rests on the wrong side"));
            }
            if order.prev != expected_prev {
                return Err(order_err("prev link is not the preceding order"));
            }
            if order.size == 0 {
                return Err(order_err("resident with zero size"));
            }

            count += 1;
            if count > orders.len() {
                return Err(level_err("queue links form a cycle".into()));
            }
            volume += Volume::from(order.size);
            expected_prev = Some(order_key);
            cursor = order.next;
        }

        if limit.queue.tail() != expected_prev {
            return Err(level_err("tail is not the last order".into()));
        }
        if count != limit.size as usize || volume != limit.volume {
            return Err(level_err(format!(
                "aggregates {}/{} but queue holds {}/{}",
                limit.size, limit.volume, count, volume
            )));
        }
        if count == 0 {
            return Err(level_err("empty level left in the tree".into()));
        }

        Ok((count, volume))
    }
}

/// In-order walk over a [`LimitTree`].
pub struct Levels<'a> {
    tree: &'a LimitTree,
    cursor: Option<LimitKey>,
    ascending: bool,
}

impl<'a> Iterator for Levels<'a> {
    type Item = &'a Limit;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        self.cursor = if self.ascending {
            self.tree.successor(key)
        } else {
            self.tree.predecessor(key)
        };
        Some(&self.tree.limits[key.0])
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
