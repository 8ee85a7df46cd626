//! Property collection: one-shot retrieval over traversal specs, live
//! filters and incremental update delivery.

mod collector;
mod filter;
mod queue;
mod resolve;
mod retrieve;
mod traversal;
pub use collector::*;
pub use filter::PropertyFilter;

#[cfg(test)]
mod traversal_test;
