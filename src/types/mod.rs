//! Core data types for the limit order book.
//!
//! All numeric values are integers: prices in ticks, sizes in lots.
//!
//! ## Types
//!
//! - [`Order`]: A resting limit order with its intrusive links
//! - [`Side`]: Buy or Sell
//! - [`OrderKey`] / [`LimitKey`]: Typed arena handles
//! - [`Execution`]: Volume consumed at one price level
//! - [`BookError`] / [`AuditError`]: Failure reporting

mod error;
mod execution;
mod key;
mod order;

pub use error::{AuditError, BookError};
pub use execution::Execution;
pub use key::{LimitKey, OrderKey};
pub use order::{Order, Side};

/// Caller-assigned order identifier
pub type Uid = u64;

/// Remaining quantity of a single order, in lots
pub type Size = u32;

/// Price in ticks
pub type Price = u64;

/// Sum of order sizes at a level or side
pub type Volume = u64;

/// Number of orders at a level or side
pub type Count = u32;

/// Caller-supplied timestamp
pub type Timestamp = u64;
