//! Order book module
//!
//! Value types for the best bid/offer snapshots delivered to consumers.

mod book;

pub use book::{BestOrderBook, Order};
