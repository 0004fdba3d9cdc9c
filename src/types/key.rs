//! Typed handles into the book's arenas.
//!
//! Orders and price levels live in `slab::Slab` storage. Every reference
//! edge of the intrusive structure (queue links, tree links, the order's
//! back-reference to its level) is one of these handles rather than a
//! pointer, so a link is checked at use instead of dereferenced blindly.

use std::fmt;

use super::Uid;

/// Handle to a resident order.
///
/// The slot is the slab key; the uid doubles as a generation check. Slab
/// keys are reused after removal, so a handle kept past cancellation could
/// otherwise resolve to an unrelated order that landed in the same slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub(crate) slot: usize,
    pub(crate) uid: Uid,
}

impl OrderKey {
    #[inline]
    pub(crate) const fn new(slot: usize, uid: Uid) -> Self {
        Self { slot, uid }
    }

    /// The uid of the order this handle was issued for.
    #[inline]
    pub const fn uid(self) -> Uid {
        self.uid
    }
}

impl fmt::Debug for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderKey({}#{})", self.slot, self.uid)
    }
}

/// Handle to a price level inside one side's [`LimitTree`](crate::orderbook::LimitTree).
///
/// Only meaningful together with the tree that issued it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LimitKey(pub(crate) usize);

impl fmt::Debug for LimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LimitKey({})", self.0)
    }
}
