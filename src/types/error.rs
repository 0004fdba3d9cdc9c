//! Error types for book operations.
//!
//! Only recoverable business conditions are errors. Contract violations
//! by the caller (adding an order to a level with a different price,
//! removing an order from a level that does not hold it) panic instead.

use thiserror::Error;

use super::{Price, Side, Uid};

/// Recoverable failures of [`Book`](crate::Book) operations.
///
/// When one of these is returned the book is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookError {
    /// The handle does not refer to an order currently in the book
    #[error("order {uid} is not resident in the book")]
    NotResident { uid: Uid },

    /// No resident order carries this uid
    #[error("no resident order with uid {uid}")]
    UnknownOrder { uid: Uid },

    /// The side holds no orders
    #[error("no resting orders on the {0:?} side")]
    EmptySide(Side),

    /// A resident order already uses this uid
    #[error("uid {uid} is already resident")]
    DuplicateOrder { uid: Uid },

    /// Orders must rest with a positive size
    #[error("order {uid} has zero size")]
    EmptyOrder { uid: Uid },
}

/// Structural inconsistencies reported by [`Book::audit`](crate::Book::audit).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    #[error("{side:?} level {price}: {detail}")]
    Level {
        side: Side,
        price: Price,
        detail: String,
    },

    #[error("{side:?} tree: {detail}")]
    Tree { side: Side, detail: String },

    #[error("order {uid}: {detail}")]
    Order { uid: Uid, detail: String },

    #[error("book: {detail}")]
    Book { detail: String },
}
